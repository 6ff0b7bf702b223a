pub mod fs_photo_library;
pub mod image_file_reader;
