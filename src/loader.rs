use crate::domain::{ProgramStats, User};
use crate::error::Result;
use crate::storage::Storage;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Options for one bulk load call.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub batch_size: usize,
    pub upsert: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            upsert: true,
        }
    }
}

/// Failure record for a single entity within a load call.
#[derive(Debug, Clone)]
pub struct LoadError {
    pub user_id: String,
    pub message: String,
}

/// Outcome of one `load_batch` call across all of its chunks.
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
    pub errors: Vec<LoadError>,
}

/// Persists deduplicated batches and maintains the derived program
/// aggregates. Owns nothing but the storage handle.
pub struct Loader {
    storage: Arc<dyn Storage>,
}

impl Loader {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Upserts `users` in chunks of `options.batch_size`. A failing chunk is
    /// attributed record-by-record and never aborts subsequent chunks.
    pub async fn load_batch(&self, users: &[User], options: &LoadOptions) -> LoadOutcome {
        let mut outcome = LoadOutcome::default();
        if users.is_empty() {
            return outcome;
        }

        let chunk_size = options.batch_size.max(1);
        for chunk in users.chunks(chunk_size) {
            match self.storage.bulk_upsert_users(chunk, options.upsert).await {
                Ok(written) => {
                    outcome.inserted += written.inserted;
                    outcome.updated += written.updated;
                    for user_id in written.unmatched {
                        outcome.failed += 1;
                        outcome.errors.push(LoadError {
                            user_id,
                            message: "no existing row matched non-upsert write".to_string(),
                        });
                    }
                }
                Err(e) => {
                    // Best-effort attribution: one error entry per record in
                    // the failed chunk rather than one opaque chunk error.
                    warn!("Bulk write failed for chunk of {}: {}", chunk.len(), e);
                    for user in chunk {
                        outcome.failed += 1;
                        outcome.errors.push(LoadError {
                            user_id: user.id.clone(),
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        debug!(
            "Loaded batch: {} inserted, {} updated, {} failed",
            outcome.inserted, outcome.updated, outcome.failed
        );
        outcome
    }

    /// Rebuilds the program aggregates wholesale from every persisted user.
    /// Returns the number of aggregate rows written.
    pub async fn update_program_stats(&self) -> Result<usize> {
        let users = self.storage.fetch_all_users().await?;
        let mut aggregates: BTreeMap<String, ProgramStats> = BTreeMap::new();

        for user in &users {
            for membership in &user.programs {
                let entry = aggregates
                    .entry(membership.program_id.clone())
                    .or_insert_with(|| ProgramStats {
                        program_id: membership.program_id.clone(),
                        program_name: membership.program_name.clone(),
                        user_count: 0,
                        total_engagement: 0,
                        total_sales: 0.0,
                    });
                entry.user_count += 1;
                entry.total_engagement += user.total_engagement;
                entry.total_sales += user
                    .sales_attributions
                    .iter()
                    .filter(|s| s.program_id == membership.program_id)
                    .map(|s| s.amount)
                    .sum::<f64>();
            }
        }

        let rows: Vec<ProgramStats> = aggregates.into_values().collect();
        self.storage.replace_program_stats(&rows).await?;
        info!("Recomputed {} program aggregates", rows.len());
        Ok(rows.len())
    }

    /// Removes all persisted users and aggregates. Used only as an explicit
    /// pre-run reset.
    pub async fn clean_database(&self) -> Result<()> {
        self.storage.clear_all().await
    }
}
