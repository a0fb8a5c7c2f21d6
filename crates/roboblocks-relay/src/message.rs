use std::collections::HashMap;

/// Key carrying the message type in every relay message.
pub const MESSAGE_TYPE: &str = "message_type";

/// Key carrying the outcome of a login request.
pub const RESULT: &str = "result";

/// Successful login result code.
pub const RESULT_OK: &str = "000";

pub const LOGIN: &str = "login";
pub const LOGOUT: &str = "logout";
pub const ACTION: &str = "action";
pub const ACK: &str = "ACK";

/// A remote peer paired with this device.
pub const PAIR_DEVICE: &str = "pairDevice";

/// The remote peer unpaired (sent by either side).
pub const UNPAIR_DEVICE: &str = "unpairDevice";

/// Event name of telemetry action messages.
pub const EVENT_SENSOR: &str = "SENSOR";

const LINE_SEPARATOR: char = '\n';
const KEY_VALUE_SEPARATOR: char = '\t';

/// An inbound relay message: newline-separated `key\tvalue` lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayMessage {
    fields: HashMap<String, String>,
}

impl RelayMessage {
    /// Parse a relay payload.
    ///
    /// Lines that do not split into exactly one key and one value are
    /// dropped. A repeated key keeps its last value.
    pub fn parse(payload: &str) -> Self {
        let fields = payload
            .split(LINE_SEPARATOR)
            .filter_map(|line| {
                let mut parts = line.split(KEY_VALUE_SEPARATOR);
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(key), Some(value), None) => Some((key.to_string(), value.to_string())),
                    _ => None,
                }
            })
            .collect();
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn message_type(&self) -> Option<&str> {
        self.get(MESSAGE_TYPE)
    }

    pub fn result(&self) -> Option<&str> {
        self.get(RESULT)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builds an outbound relay message with fields in insertion order.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    fields: Vec<(String, String)>,
}

impl MessageBuilder {
    /// Start a message of the given type.
    pub fn new(message_type: &str) -> Self {
        Self {
            fields: vec![(MESSAGE_TYPE.to_string(), message_type.to_string())],
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.push((key.to_string(), value.into()));
        self
    }

    /// Append every pair from `fields`.
    pub fn fields<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.fields
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Encode as `key\tvalue` lines joined by newlines, without a trailing
    /// newline.
    pub fn encode(&self) -> String {
        self.fields
            .iter()
            .map(|(key, value)| format!("{key}{KEY_VALUE_SEPARATOR}{value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Login request for a relay room.
pub fn login(device_type: &str, room: &str, room_pass: &str, user: &str) -> String {
    MessageBuilder::new(LOGIN)
        .field("device_type", device_type)
        .field("room_name", room)
        .field("room_pass", room_pass)
        .field("user_name", user)
        .encode()
}

pub fn logout() -> String {
    MessageBuilder::new(LOGOUT).encode()
}

/// Notification that this device is leaving its pairing.
pub fn unpair_device() -> String {
    MessageBuilder::new(UNPAIR_DEVICE).encode()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_drops_malformed_lines() {
        let message = RelayMessage::parse("a\tb\nc\n d\te\tf");
        assert_eq!(message.len(), 1);
        assert_eq!(message.get("a"), Some("b"));
        assert_eq!(message.get("c"), None);
        assert_eq!(message.get(" d"), None);
    }

    #[test]
    fn parse_login_response() {
        let message = RelayMessage::parse("message_type\tlogin\nresult\t001\n");
        assert_eq!(message.message_type(), Some(LOGIN));
        assert_eq!(message.result(), Some("001"));
    }

    #[test]
    fn parse_keeps_empty_values() {
        let message = RelayMessage::parse("message_type\tACK\nnote\t");
        assert_eq!(message.message_type(), Some(ACK));
        assert_eq!(message.get("note"), Some(""));
    }

    #[test]
    fn parse_empty_payload() {
        assert!(RelayMessage::parse("").is_empty());
    }

    #[test]
    fn login_wire_shape() {
        assert_eq!(
            login("microbit", "lab", "secret", "alice"),
            "message_type\tlogin\ndevice_type\tmicrobit\nroom_name\tlab\nroom_pass\tsecret\nuser_name\talice"
        );
    }

    #[test]
    fn control_messages() {
        assert_eq!(logout(), "message_type\tlogout");
        assert_eq!(unpair_device(), "message_type\tunpairDevice");
    }

    #[test]
    fn builder_preserves_order() {
        let encoded = MessageBuilder::new(ACTION)
            .field("event", EVENT_SENSOR)
            .fields([("b", "2"), ("a", "1")])
            .encode();
        assert_eq!(encoded, "message_type\taction\nevent\tSENSOR\nb\t2\na\t1");
    }
}
