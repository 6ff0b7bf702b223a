pub const CASCADE_MODEL_NAME: &str = "haarcascade_frontalface_default.xml";
pub const CASCADE_MODEL_URL: &str =
    "https://raw.githubusercontent.com/opencv/opencv/4.x/data/haarcascades/haarcascade_frontalface_default.xml";

/// Pyramid step between consecutive detection scales.
pub const SCALE_FACTOR: f64 = 1.1;
/// A candidate cluster needs strictly more hits than this to count as a face.
pub const MIN_NEIGHBORS: usize = 5;
/// Smallest face, in source pixels, the detector reports.
pub const MIN_FACE_SIZE: (u32, u32) = (30, 30);
/// Relative tolerance used when clustering overlapping hits.
pub const GROUP_EPS: f64 = 0.2;

pub const REGISTERED_DIR: &str = "registered";
pub const CATEGORIZED_DIR: &str = "categorized";
pub const UNKNOWN_LABEL: &str = "unknown";
pub const SAMPLE_PREFIX: &str = "sample_";
pub const SAMPLE_EXTENSION: &str = "jpg";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
