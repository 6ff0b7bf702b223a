pub mod image_reader;
pub mod photo_library;
