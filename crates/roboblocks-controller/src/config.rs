use std::time::Duration;

use roboblocks_module::{ModuleConfig, SECURITY_INSECURE};
use roboblocks_relay::CorrelatorConfig;
use serde::{Deserialize, Serialize};

/// Relay endpoint the controller logs in to.
pub const DEFAULT_RELAY_URL: &str = "wss://blocks.softbankrobotics.com/ws";

/// Device type announced at login and on telemetry.
pub const DEFAULT_DEVICE_TYPE: &str = "microbit";

/// Controller configuration.
///
/// Every field has a default, so a partial JSON document overrides only the
/// fields it names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub relay_url: String,
    /// Mode passed to `ws_security` before opening the relay connection.
    pub relay_security: String,
    pub device_type: String,
    /// How long WiFiConnecting waits for the association.
    pub wifi_connect_timeout_ms: u64,
    /// Relay response timeout for login and logout.
    pub message_timeout_ms: u64,
    /// How long a correlation sequence waits for the relay receive token.
    pub relay_token_timeout_ms: u64,
    /// Minimum spacing between telemetry sends.
    pub min_send_interval_ms: u64,
    /// Background driver tick interval.
    pub driver_interval_ms: u64,
    pub module: ModuleConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            relay_security: SECURITY_INSECURE.to_string(),
            device_type: DEFAULT_DEVICE_TYPE.to_string(),
            wifi_connect_timeout_ms: 30_000,
            message_timeout_ms: 5_000,
            relay_token_timeout_ms: 30_000,
            min_send_interval_ms: 1_000,
            driver_interval_ms: 500,
            module: ModuleConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn wifi_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.wifi_connect_timeout_ms)
    }

    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }

    pub fn relay_token_timeout(&self) -> Duration {
        Duration::from_millis(self.relay_token_timeout_ms)
    }

    pub fn min_send_interval(&self) -> Duration {
        Duration::from_millis(self.min_send_interval_ms)
    }

    pub fn driver_interval(&self) -> Duration {
        Duration::from_millis(self.driver_interval_ms)
    }

    pub(crate) fn correlator_config(&self) -> CorrelatorConfig {
        CorrelatorConfig {
            token_timeout: self.relay_token_timeout(),
            poll_interval: self.module.poll_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_constants() {
        let config = ControllerConfig::default();
        assert_eq!(config.relay_url, "wss://blocks.softbankrobotics.com/ws");
        assert_eq!(config.relay_security, "insecure");
        assert_eq!(config.wifi_connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.message_timeout(), Duration::from_secs(5));
        assert_eq!(config.min_send_interval(), Duration::from_secs(1));
        assert_eq!(config.driver_interval(), Duration::from_millis(500));
    }

    #[test]
    fn nested_partial_json() {
        let config: ControllerConfig = serde_json::from_str(
            r#"{ "device_type": "bench", "module": { "read_timeout_ms": 100 } }"#,
        )
        .unwrap();
        assert_eq!(config.device_type, "bench");
        assert_eq!(config.module.read_timeout(), Duration::from_millis(100));
        assert_eq!(config.module.token_timeout(), Duration::from_secs(30));
        assert_eq!(config.relay_url, DEFAULT_RELAY_URL);
    }

    #[test]
    fn correlator_config_uses_relay_token_timeout() {
        let config = ControllerConfig {
            relay_token_timeout_ms: 7,
            ..ControllerConfig::default()
        };
        let correlator = config.correlator_config();
        assert_eq!(correlator.token_timeout, Duration::from_millis(7));
        assert_eq!(correlator.poll_interval, Duration::from_millis(1));
    }
}
