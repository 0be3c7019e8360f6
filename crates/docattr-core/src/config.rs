use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Tuning for the compaction pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Debounce window measured from when a work item was enqueued.
    pub min_cache_time_ms: u64,
    /// Number of concurrent compaction loops.
    pub workers: usize,
    /// How long an idle worker waits before polling the queue again.
    pub idle_poll_interval_ms: u64,
    #[serde(flatten)]
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_cache_time_ms: 5_000,
            workers: 3,
            idle_poll_interval_ms: 1_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn min_cache_time(&self) -> Duration {
        Duration::from_millis(self.min_cache_time_ms)
    }

    pub fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Backoff;

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.min_cache_time(), Duration::from_secs(5));
        assert_eq!(c.workers, 3);
        assert_eq!(c.idle_poll_interval(), Duration::from_secs(1));
        assert_eq!(c.retry, RetryPolicy::unbounded());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c: PipelineConfig = toml::from_str(
            r#"
            workers = 8
            max_attempts = 10
            backoff = { kind = "fixed", delay_ms = 200 }
            "#,
        )
        .unwrap();
        assert_eq!(c.workers, 8);
        assert_eq!(c.min_cache_time_ms, 5_000);
        assert_eq!(c.retry.max_attempts, Some(10));
        assert_eq!(c.retry.backoff, Backoff::Fixed { delay_ms: 200 });
    }

    #[test]
    fn toml_roundtrip() {
        let c = PipelineConfig {
            retry: RetryPolicy::bounded(3),
            ..Default::default()
        };
        let text = toml::to_string(&c).unwrap();
        let back: PipelineConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, c);
    }
}
