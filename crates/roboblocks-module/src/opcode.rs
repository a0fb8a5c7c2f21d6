use std::fmt;

/// Response outcome marker: the operation succeeded.
pub const OUTCOME_OK: &str = "ok";
/// Response outcome marker: `ws_connect` could not open the relay connection.
pub const OUTCOME_CONNECT_ERROR: &str = "connect_error";
/// Response outcome marker: `ws_receive` has no buffered payload.
pub const OUTCOME_NOT_RECEIVED: &str = "not_received";

/// Relay transport security mode that skips certificate validation.
pub const SECURITY_INSECURE: &str = "insecure";

/// Request opcodes understood by the companion module.
///
/// The discriminant orders the per-operation failure identifiers: an
/// unexpected field count reports `2 * index`, an unexpected outcome marker
/// reports `2 * index + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    WifiStatus = 0,
    WifiConnect = 1,
    WifiDisconnect = 2,
    WifiIsConnected = 3,
    WsSecurity = 4,
    WsConnect = 5,
    WsClose = 6,
    WsSend = 7,
    WsReceivedCount = 8,
    WsReceive = 9,
}

impl Opcode {
    pub const ALL: [Opcode; 10] = [
        Opcode::WifiStatus,
        Opcode::WifiConnect,
        Opcode::WifiDisconnect,
        Opcode::WifiIsConnected,
        Opcode::WsSecurity,
        Opcode::WsConnect,
        Opcode::WsClose,
        Opcode::WsSend,
        Opcode::WsReceivedCount,
        Opcode::WsReceive,
    ];

    /// Wire name sent as the first request field.
    pub fn as_str(self) -> &'static str {
        match self {
            Opcode::WifiStatus => "wifi_status",
            Opcode::WifiConnect => "wifi_connect",
            Opcode::WifiDisconnect => "wifi_disconnect",
            Opcode::WifiIsConnected => "wifi_isconnected",
            Opcode::WsSecurity => "ws_security",
            Opcode::WsConnect => "ws_connect",
            Opcode::WsClose => "ws_close",
            Opcode::WsSend => "ws_send",
            Opcode::WsReceivedCount => "ws_receivedcount",
            Opcode::WsReceive => "ws_receive",
        }
    }

    /// Look up an opcode by its wire name.
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }

    /// Identifier reported when a response has the wrong number of fields.
    pub fn field_count_code(self) -> u16 {
        self as u16 * 2
    }

    /// Identifier reported when a response carries an unexpected outcome.
    pub fn outcome_code(self) -> u16 {
        self as u16 * 2 + 1
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_roundtrip() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_wire(op.as_str()), Some(op));
        }
        assert_eq!(Opcode::from_wire("wifi_scan"), None);
    }

    #[test]
    fn failure_codes_are_stable() {
        assert_eq!(Opcode::WifiStatus.field_count_code(), 0);
        assert_eq!(Opcode::WifiStatus.outcome_code(), 1);
        assert_eq!(Opcode::WsConnect.field_count_code(), 10);
        assert_eq!(Opcode::WsConnect.outcome_code(), 11);
        assert_eq!(Opcode::WsReceive.field_count_code(), 18);
        assert_eq!(Opcode::WsReceive.outcome_code(), 19);
    }
}
