pub mod constants;
pub mod frame;
pub mod names;
pub mod region;
pub mod settings;
pub mod upload;
