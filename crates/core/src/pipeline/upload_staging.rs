use std::fs;
use std::io;
use std::path::PathBuf;

use tempfile::TempDir;

use crate::shared::upload::Upload;

/// Scratch directory holding uploaded bytes as real files for the
/// duration of one request. Removed on drop.
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: tempfile::Builder::new().prefix("facesort-").tempdir()?,
        })
    }

    /// Writes `upload` to `<slot>/<file name>` and returns the path.
    ///
    /// Slots keep uploads with identical names apart.
    pub fn stage(&self, slot: usize, upload: &Upload) -> io::Result<PathBuf> {
        let slot_dir = self.dir.path().join(slot.to_string());
        fs::create_dir_all(&slot_dir)?;
        let path = slot_dir.join(upload.file_name());
        fs::write(&path, upload.bytes())?;
        Ok(path)
    }
}
