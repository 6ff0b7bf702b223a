use std::path::Path;

use crate::shared::frame::Frame;

/// Decodes an image file into a frame.
pub trait ImageReader: Send {
    fn read(&self, path: &Path) -> Result<Frame, Box<dyn std::error::Error>>;
}
