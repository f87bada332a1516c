//! Worker pool configuration

use serde::{Deserialize, Serialize};

/// Configuration for [`super::AsyncTaskManager`] and the tasks it drives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of worker threads (0 = one per CPU)
    pub worker_threads: usize,
    /// Prefix for worker thread names
    pub thread_name_prefix: String,
    /// Log every Nth skipped frame after the first one
    pub skip_warn_every: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            thread_name_prefix: "soda-worker".to_string(),
            skip_warn_every: 100,
        }
    }
}

impl PipelineConfig {
    /// Single worker thread, handy for deterministic tests
    pub fn single_threaded() -> Self {
        Self {
            worker_threads: 1,
            ..Default::default()
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: &str) -> Self {
        self.thread_name_prefix = prefix.to_string();
        self
    }

    /// Thread count with the "0 = per CPU" rule applied
    pub fn resolved_threads(&self) -> usize {
        if self.worker_threads == 0 {
            num_cpus::get().max(1)
        } else {
            self.worker_threads
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_threads() {
        assert!(PipelineConfig::default().resolved_threads() >= 1);
        assert_eq!(PipelineConfig::single_threaded().resolved_threads(), 1);
        assert_eq!(PipelineConfig::default().with_threads(3).resolved_threads(), 3);
    }

    #[test]
    fn test_partial_deserialize() {
        let cfg: PipelineConfig = serde_json::from_str(r#"{"worker_threads": 2}"#).unwrap();
        assert_eq!(cfg.worker_threads, 2);
        assert_eq!(cfg.skip_warn_every, 100);
    }
}
