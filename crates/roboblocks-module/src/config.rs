use std::time::Duration;

use roboblocks_frame::ExchangeConfig;
use serde::{Deserialize, Serialize};

/// Timing for companion module exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// How long an operation waits for the serial exchange token.
    pub token_timeout_ms: u64,
    /// How long an operation waits for its response frame.
    pub read_timeout_ms: u64,
    /// Sleep between checks in every bounded wait.
    pub poll_interval_ms: u64,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            token_timeout_ms: 30_000,
            read_timeout_ms: 60_000,
            poll_interval_ms: 1,
        }
    }
}

impl ModuleConfig {
    pub fn token_timeout(&self) -> Duration {
        Duration::from_millis(self.token_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Exchange channel settings derived from this configuration.
    pub fn exchange_config(&self) -> ExchangeConfig {
        ExchangeConfig {
            read_timeout: self.read_timeout(),
            poll_interval: self.poll_interval(),
        }
    }
}
