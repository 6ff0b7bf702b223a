use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::domain::detection_result::DetectionResult;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::infrastructure::haar_cascade::CascadeError;
use crate::detection::infrastructure::haar_cascade_detector::HaarCascadeDetector;
use crate::detection::infrastructure::model_resolver::{self, ModelResolveError, ProgressFn};
use crate::pipeline::upload_staging::StagingArea;
use crate::shared::names::{Label, NameError, PersonName};
use crate::shared::upload::Upload;
use crate::storage::domain::image_reader::ImageReader;
use crate::storage::domain::photo_library::{CategorizedFolder, LibraryError, PhotoLibrary};
use crate::storage::infrastructure::image_file_reader::ImageFileReader;

#[derive(Error, Debug)]
pub enum CategorizerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error("failed to stage upload: {0}")]
    Staging(#[source] std::io::Error),
    #[error(transparent)]
    Model(#[from] ModelResolveError),
    #[error(transparent)]
    Cascade(#[from] CascadeError),
    #[error("face detector unavailable: {0}")]
    DetectorUnavailable(String),
}

impl From<NameError> for CategorizerError {
    fn from(e: NameError) -> Self {
        CategorizerError::InvalidInput(e.to_string())
    }
}

/// Result record of one categorization, as handed back to the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CategorizeOutcome {
    #[serde(rename_all = "camelCase")]
    Success {
        label: String,
        face_count: usize,
        destination_path: PathBuf,
    },
    #[serde(rename_all = "camelCase")]
    NoFaces {
        destination_path: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        diagnostic: Option<String>,
    },
}

impl CategorizeOutcome {
    pub fn destination_path(&self) -> &Path {
        match self {
            CategorizeOutcome::Success {
                destination_path, ..
            }
            | CategorizeOutcome::NoFaces {
                destination_path, ..
            } => destination_path,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CategorizeOutcome::Success { .. })
    }
}

/// Builds the face detector the first time one is needed.
pub type DetectorFactory =
    Box<dyn FnOnce() -> Result<Box<dyn FaceDetector>, CategorizerError> + Send>;

enum DetectorSlot {
    Ready(Box<dyn FaceDetector>),
    Pending(DetectorFactory),
    Failed(String),
}

/// Registers people and files photos by whether a face was found.
///
/// Detection only decides *whether* a photo has a face; the caller's label
/// decides *where* it goes. Photos without faces always land in `unknown`.
pub struct Categorizer {
    reader: Box<dyn ImageReader>,
    detector: DetectorSlot,
    library: Arc<dyn PhotoLibrary>,
}

impl Categorizer {
    pub fn new(
        reader: Box<dyn ImageReader>,
        detector: Box<dyn FaceDetector>,
        library: Arc<dyn PhotoLibrary>,
    ) -> Result<Self, CategorizerError> {
        Self::with_slot(reader, DetectorSlot::Ready(detector), library)
    }

    /// Like [`new`](Self::new), but defers building the detector until the
    /// first photo is categorized. Registration and listings never call it.
    pub fn with_detector_factory(
        reader: Box<dyn ImageReader>,
        factory: DetectorFactory,
        library: Arc<dyn PhotoLibrary>,
    ) -> Result<Self, CategorizerError> {
        Self::with_slot(reader, DetectorSlot::Pending(factory), library)
    }

    fn with_slot(
        reader: Box<dyn ImageReader>,
        detector: DetectorSlot,
        library: Arc<dyn PhotoLibrary>,
    ) -> Result<Self, CategorizerError> {
        library.ensure_layout()?;
        Ok(Self {
            reader,
            detector,
            library,
        })
    }

    /// Wires the stock pieces: file decoding plus the frontal-face Haar
    /// cascade, resolved from `cascade_path` or the model cache on first use.
    pub fn with_stock_detector(
        library: Arc<dyn PhotoLibrary>,
        cascade_path: Option<&Path>,
        bundled_dir: Option<&Path>,
        progress: Option<ProgressFn>,
    ) -> Result<Self, CategorizerError> {
        let cascade_path = cascade_path.map(Path::to_path_buf);
        let bundled_dir = bundled_dir.map(Path::to_path_buf);
        let factory: DetectorFactory = Box::new(move || {
            let model = model_resolver::resolve_cascade(
                cascade_path.as_deref(),
                bundled_dir.as_deref(),
                progress,
            )?;
            let detector = HaarCascadeDetector::from_file(&model)?;
            Ok(Box::new(detector) as Box<dyn FaceDetector>)
        });
        Self::with_detector_factory(Box::new(ImageFileReader::new()), factory, library)
    }

    /// Counts faces in the image at `image_path`.
    ///
    /// Decode and detection failures are not fatal: they count as zero
    /// faces and the reason is returned as a diagnostic. Only a detector
    /// that cannot be built is an error.
    pub fn detect_faces(&mut self, image_path: &Path) -> Result<DetectionResult, CategorizerError> {
        self.load_detector()?;
        let frame = match self.reader.read(image_path) {
            Ok(frame) => frame,
            Err(e) => {
                let message = format!("could not decode {}: {e}", image_path.display());
                log::warn!("{message}");
                return Ok(DetectionResult::failed(message));
            }
        };
        let DetectorSlot::Ready(detector) = &mut self.detector else {
            return Err(CategorizerError::DetectorUnavailable(
                "face detector not loaded".into(),
            ));
        };
        match detector.detect(&frame) {
            Ok(regions) => Ok(DetectionResult::with_count(regions.len())),
            Err(e) => {
                let message = format!("face detection failed for {}: {e}", image_path.display());
                log::warn!("{message}");
                Ok(DetectionResult::failed(message))
            }
        }
    }

    fn load_detector(&mut self) -> Result<(), CategorizerError> {
        let loading = DetectorSlot::Failed("face detector is still loading".into());
        match mem::replace(&mut self.detector, loading) {
            DetectorSlot::Pending(factory) => match factory() {
                Ok(detector) => {
                    self.detector = DetectorSlot::Ready(detector);
                    Ok(())
                }
                Err(e) => {
                    self.detector = DetectorSlot::Failed(e.to_string());
                    Err(e)
                }
            },
            DetectorSlot::Failed(reason) => {
                self.detector = DetectorSlot::Failed(reason.clone());
                Err(CategorizerError::DetectorUnavailable(reason))
            }
            ready => {
                self.detector = ready;
                Ok(())
            }
        }
    }

    /// Stores `samples` as `sample_1..=N` of `name`.
    ///
    /// Indexes already present from an earlier registration are replaced;
    /// higher indexes are left alone.
    pub fn register_person(
        &self,
        name: &PersonName,
        samples: &[PathBuf],
    ) -> Result<bool, CategorizerError> {
        if samples.is_empty() {
            return Err(CategorizerError::InvalidInput(
                "at least one sample photo is required".into(),
            ));
        }
        for (i, sample) in samples.iter().enumerate() {
            self.library.store_sample(name, i + 1, sample)?;
        }
        log::info!("Registered '{name}' with {} sample(s)", samples.len());
        Ok(true)
    }

    /// Detects faces in `image_path` and copies it, under its own file name,
    /// to `label` (faces found) or `unknown` (none found).
    pub fn categorize_photo(
        &mut self,
        image_path: &Path,
        label: &Label,
    ) -> Result<CategorizeOutcome, CategorizerError> {
        self.check_label(label)?;
        self.detect_and_file(image_path, label)
    }

    fn detect_and_file(
        &mut self,
        image_path: &Path,
        label: &Label,
    ) -> Result<CategorizeOutcome, CategorizerError> {
        let detection = self.detect_faces(image_path)?;
        self.file_photo(image_path, label, detection)
    }

    /// Copies `image_path` under its own file name according to an earlier
    /// detection: to `label` when faces were found, else to `unknown`.
    pub fn file_photo(
        &self,
        image_path: &Path,
        label: &Label,
        detection: DetectionResult,
    ) -> Result<CategorizeOutcome, CategorizerError> {
        let file_name = image_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                CategorizerError::InvalidInput(format!(
                    "{} has no usable file name",
                    image_path.display()
                ))
            })?;

        if detection.has_faces() {
            let destination_path = self.library.file_photo(label, image_path, file_name)?;
            Ok(CategorizeOutcome::Success {
                label: label.folder_name().to_string(),
                face_count: detection.face_count,
                destination_path,
            })
        } else {
            let destination_path =
                self.library
                    .file_photo(&Label::Unknown, image_path, file_name)?;
            Ok(CategorizeOutcome::NoFaces {
                destination_path,
                diagnostic: detection.diagnostic,
            })
        }
    }

    /// Upload-level [`register_person`](Self::register_person).
    pub fn register(&self, name: &str, samples: &[Upload]) -> Result<bool, CategorizerError> {
        let name = PersonName::parse(name)?;
        let staging = StagingArea::new().map_err(CategorizerError::Staging)?;
        let paths = samples
            .iter()
            .enumerate()
            .map(|(slot, upload)| staging.stage(slot, upload))
            .collect::<Result<Vec<_>, _>>()
            .map_err(CategorizerError::Staging)?;
        self.register_person(&name, &paths)
    }

    /// Upload-level [`categorize_photo`](Self::categorize_photo).
    pub fn categorize(
        &mut self,
        upload: &Upload,
        label: &str,
    ) -> Result<CategorizeOutcome, CategorizerError> {
        let label = Label::parse(label)?;
        self.check_label(&label)?;
        let staging = StagingArea::new().map_err(CategorizerError::Staging)?;
        let path = staging
            .stage(0, upload)
            .map_err(CategorizerError::Staging)?;
        self.detect_and_file(&path, &label)
    }

    pub fn list_registered_persons(&self) -> Result<Vec<String>, CategorizerError> {
        Ok(self.library.registered_persons()?)
    }

    pub fn list_categorized_persons(&self) -> Result<Vec<CategorizedFolder>, CategorizerError> {
        Ok(self.library.categorized_persons()?)
    }

    /// A person label must name someone already registered.
    pub fn check_label(&self, label: &Label) -> Result<(), CategorizerError> {
        match label {
            Label::Unknown => Ok(()),
            Label::Person(name) if self.library.is_registered(name)? => Ok(()),
            Label::Person(name) => Err(CategorizerError::InvalidInput(format!(
                "'{name}' is not a registered person"
            ))),
        }
    }
}
