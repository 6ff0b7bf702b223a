use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for batch categorization events.
///
/// Keeps the batch use case free of any particular output mechanism; the
/// CLI logs through `log`, tests discard everything.
pub trait PipelineLogger: Send {
    /// Called after each photo is filed.
    fn progress(&mut self, current: usize, total: usize);

    /// How long a named stage took for one photo.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// A per-photo measurement, e.g. face count.
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// End-of-batch report. Default: no-op.
    fn summary(&self) {}
}

pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running count and sum of one timing or metric.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Tally {
    count: usize,
    total: f64,
}

impl Tally {
    fn add(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Forwards batch events to the `log` facade and keeps per-stage tallies
/// for a closing summary.
pub struct LogPipelineLogger {
    started: Instant,
    photos: usize,
    stages: BTreeMap<String, Tally>,
    metrics: BTreeMap<String, Tally>,
}

impl LogPipelineLogger {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            photos: 0,
            stages: BTreeMap::new(),
            metrics: BTreeMap::new(),
        }
    }

    /// Summary text, or `None` before anything was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.stages.is_empty() && self.metrics.is_empty() {
            return None;
        }
        let secs = self.started.elapsed().as_secs_f64();
        let mut out = format!("Batch summary ({} photos, {secs:.1}s):", self.photos);
        for (stage, tally) in &self.stages {
            out.push_str(&format!(
                "\n  {stage:8} avg {:6.1}ms  total {:7.0}ms",
                tally.mean(),
                tally.total
            ));
        }
        for (name, tally) in &self.metrics {
            out.push_str(&format!(
                "\n  {name}: avg {:.1}  total {:.0}",
                tally.mean(),
                tally.total
            ));
        }
        if self.photos > 0 && secs > 0.0 {
            out.push_str(&format!(
                "\n  Throughput: {:.1} photos/s",
                self.photos as f64 / secs
            ));
        }
        Some(out)
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.photos = current;
        log::info!("Categorized {current}/{total}");
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.stages.entry(stage.to_string()).or_default().add(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().add(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("{text}");
        }
    }
}
