//! Harness configuration
//!
//! Plain serde structs with defaults matching the documented run shape
//! (10 sinks, 10 poll workers, 10s publish phase, 10s stall threshold).
//! Environment overrides are loaded through the `config` crate with the
//! `ROUNDTRIP` prefix; the CLI layers its own flag overrides on top.

use crate::{HarnessError, Result};
use config::{Config, Environment};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Core run parameters. Validation happens once, before any phase starts;
/// the core enforces nothing else at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Number of producer-side sinks (> 0).
    pub sink_count: usize,
    /// Number of consumer-side poll worker threads (> 0).
    pub poll_worker_count: usize,
    /// Wall-clock length of the publish phase.
    pub publish_duration_ms: u64,
    /// Drain exits with a failed verdict once no message has been observed
    /// for this long.
    pub stall_timeout_ms: u64,
    /// Interval between progress observations during the publish phase.
    pub progress_interval_ms: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            sink_count: 10,
            poll_worker_count: 10,
            publish_duration_ms: 10_000,
            stall_timeout_ms: 10_000,
            progress_interval_ms: 1_000,
        }
    }
}

impl HarnessConfig {
    /// Loads defaults overlaid with `ROUNDTRIP_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let settings = Config::builder()
            .add_source(
                Config::try_from(&Self::default())
                    .map_err(|e| HarnessError::Config(e.to_string()))?,
            )
            .add_source(Environment::with_prefix("ROUNDTRIP").try_parsing(true))
            .build()
            .map_err(|e| HarnessError::Config(e.to_string()))?;

        settings
            .try_deserialize::<Self>()
            .map_err(|e| HarnessError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.sink_count == 0 {
            return Err(HarnessError::Config(
                "sink_count must be greater than zero".to_string(),
            ));
        }
        if self.poll_worker_count == 0 {
            return Err(HarnessError::Config(
                "poll_worker_count must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn publish_duration(&self) -> Duration {
        Duration::from_millis(self.publish_duration_ms)
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

/// Connection parameters for the Kafka transport binding.
///
/// `topic` and `group_id` are usually left unset so every run gets a fresh,
/// uniquely named topic and consumer group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    pub brokers: String,
    pub topic: Option<String>,
    pub group_id: Option<String>,
    /// Partition count for the run topic created at setup.
    pub partitions: i32,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            topic: None,
            group_id: None,
            partitions: 10,
        }
    }
}

impl KafkaConfig {
    pub fn from_env() -> Self {
        Self {
            brokers: std::env::var("KAFKA_BROKERS")
                .unwrap_or_else(|_| "localhost:9092".to_string()),
            topic: std::env::var("KAFKA_TOPIC").ok(),
            group_id: std::env::var("KAFKA_GROUP_ID").ok(),
            partitions: std::env::var("KAFKA_PARTITIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(HarnessConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_counts_are_rejected() {
        let config = HarnessConfig {
            sink_count: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(HarnessError::Config(_))));

        let config = HarnessConfig {
            poll_worker_count: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(HarnessError::Config(_))));
    }

    #[test]
    fn durations_come_from_millis() {
        let config = HarnessConfig {
            publish_duration_ms: 250,
            stall_timeout_ms: 500,
            ..Default::default()
        };
        assert_eq!(config.publish_duration(), Duration::from_millis(250));
        assert_eq!(config.stall_timeout(), Duration::from_millis(500));
    }
}
