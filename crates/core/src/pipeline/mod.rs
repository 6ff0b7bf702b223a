pub mod categorize_batch_use_case;
pub mod categorizer;
pub mod pipeline_logger;
pub mod upload_staging;
