use crate::domain::{ProgramStats, User};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Outcome of one bulk write round trip.
#[derive(Debug, Clone, Default)]
pub struct BulkWriteOutcome {
    pub inserted: usize,
    pub updated: usize,
    /// Ids that matched nothing on a non-upsert write.
    pub unmatched: Vec<String>,
}

/// Persistence collaborator for canonical users and program aggregates.
/// The write contract is upsert-by-identifier, unordered/best-effort bulk.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Connection check. Failure is fatal to a run.
    async fn ping(&self) -> Result<()>;

    /// Unordered bulk write keyed by `User::id`. With `upsert` set, missing
    /// rows are inserted; without it they are reported in `unmatched`.
    async fn bulk_upsert_users(&self, users: &[User], upsert: bool) -> Result<BulkWriteOutcome>;

    async fn fetch_all_users(&self) -> Result<Vec<User>>;

    /// Replaces the program aggregate rows wholesale.
    async fn replace_program_stats(&self, stats: &[ProgramStats]) -> Result<()>;

    async fn fetch_program_stats(&self) -> Result<Vec<ProgramStats>>;

    /// Removes all users and program aggregates. Explicit resets only.
    async fn clear_all(&self) -> Result<()>;

    /// Releases the connection. Must be called on every exit path.
    async fn close(&self) -> Result<()>;
}

/// In-memory storage implementation for development/testing
pub struct InMemoryStorage {
    users: Arc<Mutex<HashMap<String, User>>>,
    program_stats: Arc<Mutex<HashMap<String, ProgramStats>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            users: Arc::new(Mutex::new(HashMap::new())),
            program_stats: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn bulk_upsert_users(&self, users: &[User], upsert: bool) -> Result<BulkWriteOutcome> {
        let mut map = self.users.lock().unwrap();
        let mut outcome = BulkWriteOutcome::default();
        for user in users {
            if map.contains_key(&user.id) {
                map.insert(user.id.clone(), user.clone());
                outcome.updated += 1;
            } else if upsert {
                map.insert(user.id.clone(), user.clone());
                outcome.inserted += 1;
            } else {
                outcome.unmatched.push(user.id.clone());
            }
        }
        debug!(
            "Bulk wrote {} users ({} inserted, {} updated)",
            users.len(),
            outcome.inserted,
            outcome.updated
        );
        Ok(outcome)
    }

    async fn fetch_all_users(&self) -> Result<Vec<User>> {
        let map = self.users.lock().unwrap();
        Ok(map.values().cloned().collect())
    }

    async fn replace_program_stats(&self, stats: &[ProgramStats]) -> Result<()> {
        let mut map = self.program_stats.lock().unwrap();
        map.clear();
        for entry in stats {
            map.insert(entry.program_id.clone(), entry.clone());
        }
        debug!("Replaced program stats with {} rows", stats.len());
        Ok(())
    }

    async fn fetch_program_stats(&self) -> Result<Vec<ProgramStats>> {
        let map = self.program_stats.lock().unwrap();
        Ok(map.values().cloned().collect())
    }

    async fn clear_all(&self) -> Result<()> {
        self.users.lock().unwrap().clear();
        self.program_stats.lock().unwrap().clear();
        debug!("Cleared all users and program stats");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
