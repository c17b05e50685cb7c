use serde::Serialize;

/// Completion of a submission job after one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub completed_chunks: usize,
    pub total_chunks: usize,
    pub percent: f64,
}

impl Progress {
    pub fn new(completed_chunks: usize, total_chunks: usize) -> Self {
        let percent = if total_chunks == 0 {
            100.0
        } else {
            (completed_chunks as f64 * 10_000.0 / total_chunks as f64).round() / 100.0
        };
        Self {
            completed_chunks,
            total_chunks,
            percent,
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: Progress);
}

/// Emits progress as `tracing` events under the `submission` target.
#[derive(Debug, Clone, Default)]
pub struct TracingProgress {
    pub label: String,
}

impl TracingProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl ProgressSink for TracingProgress {
    fn report(&self, progress: Progress) {
        tracing::info!(
            target: "submission",
            label = %self.label,
            completed = progress.completed_chunks,
            total = progress.total_chunks,
            percent = progress.percent,
            "submission progress"
        );
    }
}
