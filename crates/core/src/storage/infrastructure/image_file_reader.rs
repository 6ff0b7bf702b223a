use std::fs;
use std::path::Path;

use crate::shared::frame::Frame;
use crate::storage::domain::image_reader::ImageReader;

/// Decodes image files with the `image` crate.
///
/// The format is sniffed from the file contents, not the extension, so an
/// upload saved under a misleading name still decodes.
pub struct ImageFileReader;

impl ImageFileReader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageReader for ImageFileReader {
    fn read(&self, path: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
        let bytes = fs::read(path)?;
        let rgb = image::load_from_memory(&bytes)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(Frame::new(rgb.into_raw(), width, height, 3))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_test_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        let mut img = image::RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([50, 100, 200]);
        }
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_reads_rgb_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), "test.png", 100, 80);
        let frame = ImageFileReader::new().read(&path).unwrap();
        assert_eq!(frame.width(), 100);
        assert_eq!(frame.height(), 80);
        assert_eq!(frame.channels(), 3);
        assert_eq!(&frame.data()[..3], &[50, 100, 200]);
    }

    #[test]
    fn test_format_is_sniffed_from_contents() {
        let dir = tempfile::tempdir().unwrap();
        let png = write_test_image(dir.path(), "test.png", 10, 10);
        let misnamed = dir.path().join("upload.jpg");
        fs::copy(&png, &misnamed).unwrap();
        let frame = ImageFileReader::new().read(&misnamed).unwrap();
        assert_eq!(frame.width(), 10);
    }

    #[test]
    fn test_nonexistent_file_is_an_error() {
        assert!(ImageFileReader::new()
            .read(Path::new("/nonexistent/test.png"))
            .is_err());
    }

    #[test]
    fn test_garbage_bytes_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        fs::write(&path, b"definitely not an image").unwrap();
        assert!(ImageFileReader::new().read(&path).is_err());
    }
}
