use std::fmt;

use serde::Serialize;

/// Connection state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Initial state; nothing happens in the background.
    WifiDisconnected,
    /// Waiting for the wireless association, bounded by the connect timeout.
    WifiConnecting,
    /// Associated; the relay connection is closed.
    WifiConnected,
    /// Logged in to the relay.
    ServerConnected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::WifiDisconnected => "wifi_disconnected",
            ConnectionState::WifiConnecting => "wifi_connecting",
            ConnectionState::WifiConnected => "wifi_connected",
            ConnectionState::ServerConnected => "server_connected",
        }
    }

    /// Whether relay login and logout are accepted in this state.
    pub fn accepts_relay_commands(&self) -> bool {
        matches!(
            self,
            ConnectionState::WifiConnected | ConnectionState::ServerConnected
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
