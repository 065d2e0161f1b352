use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// Statistics for one end-to-end pipeline run. The sole user-visible
/// summary of recoverable failures.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub run_id: Uuid,
    pub total_files: usize,
    pub files_processed: usize,
    pub successful_records: usize,
    pub failed_records: usize,
    pub validation_errors: usize,
    pub clean_records: usize,
    pub messy_records: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

impl RunStats {
    pub fn begin() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            total_files: 0,
            files_processed: 0,
            successful_records: 0,
            failed_records: 0,
            validation_errors: 0,
            clean_records: 0,
            messy_records: 0,
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: None,
        }
    }

    pub fn finish(&mut self) {
        let now = Utc::now();
        self.duration_ms = Some((now - self.started_at).num_milliseconds());
        self.finished_at = Some(now);
    }
}

/// Receives the final statistics of a run. Injected into the orchestrator
/// and scoped to a single run rather than living as a process-wide global.
pub trait StatsSink: Send + Sync {
    fn record_run(&self, stats: &RunStats);
}

/// Default sink that reports through the tracing subscriber.
pub struct LogStatsSink;

impl StatsSink for LogStatsSink {
    fn record_run(&self, stats: &RunStats) {
        info!(
            run_id = %stats.run_id,
            total_files = stats.total_files,
            files_processed = stats.files_processed,
            successful = stats.successful_records,
            failed = stats.failed_records,
            validation_errors = stats.validation_errors,
            clean = stats.clean_records,
            messy = stats.messy_records,
            duration_ms = stats.duration_ms,
            "pipeline run finished"
        );
    }
}
