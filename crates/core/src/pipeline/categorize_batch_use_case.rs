use std::time::Instant;

use serde::Serialize;

use crate::pipeline::categorizer::{CategorizeOutcome, Categorizer, CategorizerError};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::upload_staging::StagingArea;
use crate::shared::names::Label;
use crate::shared::upload::Upload;

/// Ordered results of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub results: Vec<CategorizeOutcome>,
}

impl BatchReport {
    pub fn with_faces(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn without_faces(&self) -> usize {
        self.results.len() - self.with_faces()
    }
}

/// Batch pipeline: stage → detect → file, one photo at a time, all under
/// one label.
///
/// A failing photo aborts the batch. Photos filed before it stay where
/// they are.
pub struct CategorizeBatchUseCase<'a> {
    categorizer: &'a mut Categorizer,
    logger: Box<dyn PipelineLogger>,
}

impl<'a> CategorizeBatchUseCase<'a> {
    pub fn new(categorizer: &'a mut Categorizer, logger: Box<dyn PipelineLogger>) -> Self {
        Self {
            categorizer,
            logger,
        }
    }

    pub fn execute(
        &mut self,
        uploads: &[Upload],
        label: &str,
    ) -> Result<BatchReport, CategorizerError> {
        if uploads.is_empty() {
            return Err(CategorizerError::InvalidInput(
                "select at least one photo to categorize".into(),
            ));
        }
        if self.categorizer.list_registered_persons()?.is_empty() {
            return Err(CategorizerError::InvalidInput(
                "register at least one person first".into(),
            ));
        }
        let label = Label::parse(label)?;
        self.categorizer.check_label(&label)?;

        let staging = StagingArea::new().map_err(CategorizerError::Staging)?;
        let total = uploads.len();
        let mut results = Vec::with_capacity(total);

        for (i, upload) in uploads.iter().enumerate() {
            let t0 = Instant::now();
            let path = staging
                .stage(i, upload)
                .map_err(CategorizerError::Staging)?;
            self.logger.timing("stage", elapsed_ms(t0));

            let t1 = Instant::now();
            let detection = self.categorizer.detect_faces(&path)?;
            self.logger.timing("detect", elapsed_ms(t1));
            self.logger.metric("faces", detection.face_count as f64);

            let t2 = Instant::now();
            let outcome = self.categorizer.file_photo(&path, &label, detection)?;
            self.logger.timing("file", elapsed_ms(t2));

            self.logger.progress(i + 1, total);
            results.push(outcome);
        }

        let report = BatchReport { results };
        self.logger.info(&format!(
            "Categorized {total} photo(s): {} with faces, {} without",
            report.with_faces(),
            report.without_faces()
        ));
        self.logger.summary();
        Ok(report)
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
