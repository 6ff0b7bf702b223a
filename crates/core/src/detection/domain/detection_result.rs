/// Outcome of running the detector over one image.
///
/// Only the count leaves the detection context; region geometry is not
/// needed to file a photo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionResult {
    pub face_count: usize,
    /// Why detection did not run to completion (undecodable image or a
    /// detector error). The photo is then treated as faceless.
    pub diagnostic: Option<String>,
}

impl DetectionResult {
    pub fn with_count(face_count: usize) -> Self {
        Self {
            face_count,
            diagnostic: None,
        }
    }

    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            face_count: 0,
            diagnostic: Some(diagnostic.into()),
        }
    }

    pub fn has_faces(&self) -> bool {
        self.face_count > 0
    }
}
