pub mod haar_cascade;
pub mod haar_cascade_detector;
pub mod integral_image;
pub mod math;
pub mod model_resolver;
pub mod rectangle_grouper;
