use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Generates collision-resistant synthetic identifiers for records that
/// arrive without one. Injected so tests can pin the output without
/// depending on wall clock or randomness.
pub trait IdGenerator: Send + Sync {
    fn user_id(&self) -> String;
    fn program_id(&self) -> String;
    fn post_id(&self) -> String;
}

/// Production generator: `<prefix>_<epoch-millis>_<random-suffix>`.
pub struct ClockIdGenerator;

impl ClockIdGenerator {
    fn generate(&self, prefix: &str) -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(9)
            .map(|c| (c as char).to_ascii_lowercase())
            .collect();
        format!("{}_{}_{}", prefix, Utc::now().timestamp_millis(), suffix)
    }
}

impl IdGenerator for ClockIdGenerator {
    fn user_id(&self) -> String {
        self.generate("user")
    }

    fn program_id(&self) -> String {
        self.generate("program")
    }

    fn post_id(&self) -> String {
        self.generate("task")
    }
}

/// Deterministic generator for tests: `<prefix>_gen_<n>` with a shared
/// monotonic counter.
pub struct SequenceIdGenerator {
    counter: AtomicU64,
}

impl SequenceIdGenerator {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    fn generate(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}_gen_{}", prefix, n)
    }
}

impl Default for SequenceIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequenceIdGenerator {
    fn user_id(&self) -> String {
        self.generate("user")
    }

    fn program_id(&self) -> String {
        self.generate("program")
    }

    fn post_id(&self) -> String {
        self.generate("task")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn clock_ids_match_synthetic_pattern() {
        let idgen = ClockIdGenerator;
        let pattern = Regex::new(r"^user_\d+_[a-z0-9]{9}$").unwrap();
        assert!(pattern.is_match(&idgen.user_id()));

        let pattern = Regex::new(r"^program_\d+_[a-z0-9]{9}$").unwrap();
        assert!(pattern.is_match(&idgen.program_id()));

        let pattern = Regex::new(r"^task_\d+_[a-z0-9]{9}$").unwrap();
        assert!(pattern.is_match(&idgen.post_id()));
    }

    #[test]
    fn sequence_ids_are_deterministic() {
        let idgen = SequenceIdGenerator::new();
        assert_eq!(idgen.user_id(), "user_gen_0");
        assert_eq!(idgen.program_id(), "program_gen_1");
        assert_eq!(idgen.post_id(), "task_gen_2");
    }
}
