use crate::config::RunConfig;
use crate::domain::User;
use crate::error::Result;
use crate::idgen::IdGenerator;
use crate::loader::{LoadOptions, Loader};
use crate::pipeline::dedupe::dedupe_batch;
use crate::pipeline::extract::Extractor;
use crate::pipeline::transform::Transformer;
use crate::pipeline::validate::validate;
use crate::stats::{RunStats, StatsSink};
use crate::storage::Storage;
use metrics::{counter, histogram};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Pipeline run phases. `Failed` is terminal and reachable from any state
/// on an unrecoverable error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Connecting,
    Cleaning,
    Streaming,
    Flushing,
    Aggregating,
    Done,
    Failed,
}

fn enter(state: RunState) {
    debug!(state = ?state, "pipeline state");
}

/// Single-pass batch orchestrator: extract -> validate -> transform ->
/// buffer -> dedupe -> load, with one aggregate recompute at the end.
/// Collaborators are injected and scoped to the runner, not process-wide.
pub struct PipelineRunner {
    storage: Arc<dyn Storage>,
    loader: Loader,
    transformer: Transformer,
    stats_sink: Arc<dyn StatsSink>,
}

impl PipelineRunner {
    pub fn new(
        storage: Arc<dyn Storage>,
        idgen: Arc<dyn IdGenerator>,
        stats_sink: Arc<dyn StatsSink>,
    ) -> Self {
        Self {
            loader: Loader::new(storage.clone()),
            transformer: Transformer::new(idgen),
            storage,
            stats_sink,
        }
    }

    /// Runs the pipeline over one directory snapshot. Only fatal errors
    /// (missing data directory, storage connection failure) propagate; all
    /// recoverable failures land in the returned statistics.
    pub async fn run(&self, config: &RunConfig) -> Result<RunStats> {
        let mut stats = RunStats::begin();
        enter(RunState::Idle);
        info!("🚀 Starting pipeline run {}", stats.run_id);
        counter!("etl_runs_total").increment(1);
        let t_run = std::time::Instant::now();

        let outcome = self.run_inner(config, &mut stats).await;

        // Connection teardown runs on every exit path, thrown errors included.
        if let Err(e) = self.storage.close().await {
            warn!("Failed to release storage connection: {}", e);
        }

        histogram!("etl_run_duration_seconds").record(t_run.elapsed().as_secs_f64());
        stats.finish();

        match outcome {
            Ok(()) => {
                enter(RunState::Done);
                info!(
                    "✅ Run {} finished: {} loaded, {} failed across {} files",
                    stats.run_id,
                    stats.successful_records,
                    stats.failed_records,
                    stats.files_processed
                );
                self.stats_sink.record_run(&stats);
                Ok(stats)
            }
            Err(e) => {
                enter(RunState::Failed);
                error!("❌ Run {} failed: {}", stats.run_id, e);
                Err(e)
            }
        }
    }

    async fn run_inner(&self, config: &RunConfig, stats: &mut RunStats) -> Result<()> {
        enter(RunState::Connecting);
        self.storage.ping().await?;

        if config.clean_before_run {
            enter(RunState::Cleaning);
            info!("🧹 Cleaning database before run");
            self.loader.clean_database().await?;
        }

        enter(RunState::Streaming);
        let stream = Extractor::new(config.data_dir.clone())
            .with_pattern(config.file_pattern.clone())
            .with_max_files(config.max_files)
            .scan()?;
        stats.total_files = stream.total_matched();
        info!(
            "📂 Matched {} files in {}",
            stats.total_files,
            config.data_dir.display()
        );

        let load_options = LoadOptions {
            batch_size: config.batch_size,
            upsert: true,
        };
        let flush_at = config.batch_size.max(1);
        let mut batch: Vec<User> = Vec::new();
        // Run-scoped: discarded with the runner call, never carried between runs.
        let mut processed_ids: HashSet<String> = HashSet::new();

        for source in stream {
            stats.files_processed += 1;
            counter!("etl_records_seen_total").increment(1);

            let outcome = validate(&source.payload);
            if !outcome.accepted {
                stats.validation_errors += 1;
                stats.failed_records += 1;
                counter!("etl_validation_errors_total").increment(1);
                warn!(
                    "Validation failed for {}: {}",
                    source.file_name,
                    outcome.errors.join("; ")
                );
                continue;
            }
            if outcome.is_clean {
                stats.clean_records += 1;
            } else {
                stats.messy_records += 1;
            }

            let Some(record) = outcome.record else {
                continue;
            };
            batch.push(self.transformer.transform(&record));

            if batch.len() >= flush_at {
                let drained = std::mem::take(&mut batch);
                self.flush_batch(drained, &mut processed_ids, &load_options, stats)
                    .await;
            }
        }

        enter(RunState::Flushing);
        if !batch.is_empty() {
            self.flush_batch(batch, &mut processed_ids, &load_options, stats)
                .await;
        }

        enter(RunState::Aggregating);
        info!("📊 Recomputing program aggregates");
        self.loader.update_program_stats().await?;

        Ok(())
    }

    /// Dedupes the batch, drops identifiers already loaded by an earlier
    /// batch of this run (first batch wins, no cross-batch merge), and hands
    /// the rest to the loader. Load failures are recoverable: they are
    /// folded into the statistics, never raised.
    async fn flush_batch(
        &self,
        batch: Vec<User>,
        processed_ids: &mut HashSet<String>,
        options: &LoadOptions,
        stats: &mut RunStats,
    ) {
        let deduped = dedupe_batch(batch);
        let fresh: Vec<User> = deduped
            .into_iter()
            .filter(|user| processed_ids.insert(user.id.clone()))
            .collect();
        if fresh.is_empty() {
            return;
        }

        debug!("Flushing batch of {}", fresh.len());
        let outcome = self.loader.load_batch(&fresh, options).await;
        stats.successful_records += outcome.inserted + outcome.updated;
        stats.failed_records += outcome.failed;
        counter!("etl_batches_flushed_total").increment(1);
        counter!("etl_records_loaded_total").increment((outcome.inserted + outcome.updated) as u64);
        counter!("etl_records_failed_total").increment(outcome.failed as u64);
        for load_error in &outcome.errors {
            warn!(
                "Load failed for {}: {}",
                load_error.user_id, load_error.message
            );
        }
    }
}
