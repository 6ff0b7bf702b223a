//! Boosted Haar-feature cascade in OpenCV's `opencv-cascade-classifier`
//! XML layout.
//!
//! Only upright (BASIC/CORE) features and ordinal trees are supported, which
//! covers the stock frontal-face cascades.

use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// Subtracted from every stage threshold on load, as OpenCV does, so sums
/// landing exactly on a threshold still pass.
pub const STAGE_THRESHOLD_EPS: f64 = 1e-5;

#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("failed to read cascade {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed cascade XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("unsupported cascade: {0}")]
    Unsupported(String),
    #[error("invalid cascade: {0}")]
    Invalid(String),
}

/// One weighted rectangle of a Haar feature, in window coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct HaarRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HaarFeature {
    pub rects: Vec<HaarRect>,
}

/// Split node of a weak classifier tree.
///
/// Children greater than zero index another node; zero or negative children
/// index a leaf as `-child`.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub left: i32,
    pub right: i32,
    pub feature: usize,
    pub threshold: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeakClassifier {
    pub nodes: Vec<TreeNode>,
    pub leaves: Vec<f64>,
}

impl WeakClassifier {
    /// Walks the tree using `feature_value` for each split and returns the
    /// reached leaf value.
    pub fn evaluate(&self, mut feature_value: impl FnMut(usize) -> f64) -> f64 {
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            let next = if feature_value(node.feature) < node.threshold {
                node.left
            } else {
                node.right
            };
            if next <= 0 {
                return self.leaves[(-next) as usize];
            }
            idx = next as usize;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stage {
    pub threshold: f64,
    pub classifiers: Vec<WeakClassifier>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HaarCascade {
    window: (u32, u32),
    stages: Vec<Stage>,
    features: Vec<HaarFeature>,
}

impl HaarCascade {
    pub fn load(path: &Path) -> Result<Self, CascadeError> {
        let xml = fs::read_to_string(path).map_err(|e| CascadeError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let cascade = Self::from_xml(&xml)?;
        log::info!(
            "Loaded cascade {} ({} stages, {} features, {}x{} window)",
            path.display(),
            cascade.stages.len(),
            cascade.features.len(),
            cascade.window.0,
            cascade.window.1
        );
        Ok(cascade)
    }

    pub fn from_xml(xml: &str) -> Result<Self, CascadeError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut builder = CascadeBuilder::default();
        let mut path: Vec<String> = Vec::new();
        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    path.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                    builder.open(&path)?;
                }
                Event::End(_) => {
                    path.pop();
                }
                Event::Text(t) => {
                    let text = t.unescape()?;
                    builder.text(&path, &text)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }
        builder.finish()
    }

    /// Training window `(width, height)`.
    pub fn window_size(&self) -> (u32, u32) {
        self.window
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn features(&self) -> &[HaarFeature] {
        &self.features
    }
}

fn at(path: &[String], tail: &[&str]) -> bool {
    path.len() >= tail.len()
        && path[path.len() - tail.len()..]
            .iter()
            .zip(tail)
            .all(|(a, b)| a == b)
}

fn numbers(text: &str) -> Result<Vec<f64>, CascadeError> {
    text.split_whitespace()
        .map(|tok| {
            tok.parse::<f64>()
                .map_err(|_| CascadeError::Invalid(format!("expected a number, got '{tok}'")))
        })
        .collect()
}

#[derive(Default)]
struct CascadeBuilder {
    width: u32,
    height: u32,
    stages: Vec<Stage>,
    features: Vec<HaarFeature>,
}

impl CascadeBuilder {
    fn open(&mut self, path: &[String]) -> Result<(), CascadeError> {
        if at(path, &["trees"]) {
            return Err(CascadeError::Unsupported(
                "legacy <trees> layout; convert with opencv_traincascade".into(),
            ));
        }
        if at(path, &["stages", "_"]) {
            self.stages.push(Stage::default());
        } else if at(path, &["weakClassifiers", "_"]) {
            self.current_stage()?
                .classifiers
                .push(WeakClassifier::default());
        } else if at(path, &["features", "_"]) {
            self.features.push(HaarFeature::default());
        }
        Ok(())
    }

    fn text(&mut self, path: &[String], text: &str) -> Result<(), CascadeError> {
        if at(path, &["cascade", "stageType"]) && text != "BOOST" {
            return Err(CascadeError::Unsupported(format!("stage type {text}")));
        }
        if at(path, &["cascade", "featureType"]) && text != "HAAR" {
            return Err(CascadeError::Unsupported(format!("feature type {text}")));
        }
        if at(path, &["cascade", "width"]) {
            self.width = parse_dimension(text)?;
        } else if at(path, &["cascade", "height"]) {
            self.height = parse_dimension(text)?;
        } else if at(path, &["stages", "_", "stageThreshold"]) {
            self.current_stage()?.threshold = single(text)? - STAGE_THRESHOLD_EPS;
        } else if at(path, &["weakClassifiers", "_", "internalNodes"]) {
            let values = numbers(text)?;
            if values.len() % 4 != 0 {
                return Err(CascadeError::Unsupported(
                    "categorical splits (internalNodes not in groups of 4)".into(),
                ));
            }
            self.current_classifier()?.nodes = values
                .chunks_exact(4)
                .map(|v| TreeNode {
                    left: v[0] as i32,
                    right: v[1] as i32,
                    feature: v[2] as usize,
                    threshold: v[3],
                })
                .collect();
        } else if at(path, &["weakClassifiers", "_", "leafValues"]) {
            self.current_classifier()?.leaves = numbers(text)?;
        } else if at(path, &["features", "_", "rects", "_"]) {
            let v = numbers(text)?;
            if v.len() != 5 {
                return Err(CascadeError::Invalid(format!(
                    "feature rect needs 5 values, got {}",
                    v.len()
                )));
            }
            let feature = self
                .features
                .last_mut()
                .ok_or_else(|| CascadeError::Invalid("rect outside of a feature".into()))?;
            feature.rects.push(HaarRect {
                x: v[0] as u32,
                y: v[1] as u32,
                width: v[2] as u32,
                height: v[3] as u32,
                weight: v[4],
            });
        } else if at(path, &["features", "_", "tilted"]) && text.trim() != "0" {
            return Err(CascadeError::Unsupported("tilted Haar features".into()));
        }
        Ok(())
    }

    fn current_stage(&mut self) -> Result<&mut Stage, CascadeError> {
        self.stages
            .last_mut()
            .ok_or_else(|| CascadeError::Invalid("classifier outside of a stage".into()))
    }

    fn current_classifier(&mut self) -> Result<&mut WeakClassifier, CascadeError> {
        self.current_stage()?
            .classifiers
            .last_mut()
            .ok_or_else(|| CascadeError::Invalid("tree data outside of a classifier".into()))
    }

    fn finish(self) -> Result<HaarCascade, CascadeError> {
        if self.width < 3 || self.height < 3 {
            return Err(CascadeError::Invalid(format!(
                "missing or degenerate window size {}x{}",
                self.width, self.height
            )));
        }
        if self.stages.is_empty() {
            return Err(CascadeError::Invalid("no stages".into()));
        }
        for feature in &self.features {
            if feature.rects.is_empty() {
                return Err(CascadeError::Invalid("feature without rects".into()));
            }
            for r in &feature.rects {
                if r.x + r.width > self.width || r.y + r.height > self.height {
                    return Err(CascadeError::Invalid(format!(
                        "feature rect {r:?} exceeds {}x{} window",
                        self.width, self.height
                    )));
                }
            }
        }
        for (si, stage) in self.stages.iter().enumerate() {
            if stage.classifiers.is_empty() {
                return Err(CascadeError::Invalid(format!("stage {si} is empty")));
            }
            for classifier in &stage.classifiers {
                validate_tree(classifier, self.features.len())
                    .map_err(|msg| CascadeError::Invalid(format!("stage {si}: {msg}")))?;
            }
        }
        Ok(HaarCascade {
            window: (self.width, self.height),
            stages: self.stages,
            features: self.features,
        })
    }
}

fn validate_tree(classifier: &WeakClassifier, feature_count: usize) -> Result<(), String> {
    if classifier.nodes.is_empty() {
        return Err("classifier without nodes".into());
    }
    for node in &classifier.nodes {
        if node.feature >= feature_count {
            return Err(format!("feature index {} out of range", node.feature));
        }
        for child in [node.left, node.right] {
            let ok = if child > 0 {
                (child as usize) < classifier.nodes.len()
            } else {
                ((-child) as usize) < classifier.leaves.len()
            };
            if !ok {
                return Err(format!("dangling tree child {child}"));
            }
        }
    }
    Ok(())
}

fn single(text: &str) -> Result<f64, CascadeError> {
    match numbers(text)?.as_slice() {
        [v] => Ok(*v),
        _ => Err(CascadeError::Invalid(format!("expected one number, got '{text}'"))),
    }
}

fn parse_dimension(text: &str) -> Result<u32, CascadeError> {
    text.trim()
        .parse()
        .map_err(|_| CascadeError::Invalid(format!("bad window dimension '{text}'")))
}
