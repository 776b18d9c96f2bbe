use std::time::Duration;

use serde::Deserialize;

use herald_core::config::Config;

/// Outbound service configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct OutboundConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// NATS server URL the outbox relay publishes to.
    pub nats_url: String,
    /// TCP port to listen on (default 3120). Env var: `OUTBOUND_PORT`.
    #[serde(default = "default_port")]
    pub outbound_port: u16,
    /// Bus subject prefix; the channel name is appended.
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
    #[serde(default = "default_relay_interval_ms")]
    pub relay_interval_ms: u64,
    #[serde(default = "default_batch_size")]
    pub relay_batch_size: u64,
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    #[serde(default = "default_batch_size")]
    pub retry_batch_size: u64,
}

impl Config for OutboundConfig {}

impl OutboundConfig {
    pub fn relay_interval(&self) -> Duration {
        Duration::from_millis(self.relay_interval_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

fn default_port() -> u16 {
    3120
}

fn default_subject_prefix() -> String {
    "outbound.delivery".to_owned()
}

fn default_relay_interval_ms() -> u64 {
    1_000
}

fn default_retry_interval_ms() -> u64 {
    30_000
}

fn default_batch_size() -> u64 {
    100
}
