use std::sync::Arc;

use roboblocks_frame::{ExchangeChannel, Frame};
use roboblocks_transport::{Clock, LineTransport};
use tracing::debug;

use crate::config::ModuleConfig;
use crate::error::{ModuleError, Result};
use crate::opcode::{Opcode, OUTCOME_CONNECT_ERROR, OUTCOME_NOT_RECEIVED, OUTCOME_OK};
use crate::token::ExchangeToken;

/// Client for the companion module's request/response catalogue.
///
/// Each operation is one full round trip under the serial exchange token:
/// acquire → pre-read → write request → read response → release, followed
/// by validation of the response shape and outcome marker.
pub struct ModuleClient {
    channel: ExchangeChannel,
    token: ExchangeToken,
    config: ModuleConfig,
}

impl ModuleClient {
    /// Create a client with default timing.
    pub fn new(transport: Arc<dyn LineTransport>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(transport, clock, ModuleConfig::default())
    }

    /// Create a client with explicit timing.
    pub fn with_config(
        transport: Arc<dyn LineTransport>,
        clock: Arc<dyn Clock>,
        config: ModuleConfig,
    ) -> Self {
        let channel =
            ExchangeChannel::with_config(transport, Arc::clone(&clock), config.exchange_config());
        let token = ExchangeToken::new("companion module", clock, config.poll_interval());
        Self {
            channel,
            token,
            config,
        }
    }

    /// Query the Wi-Fi status code.
    pub fn wifi_status(&self) -> Result<i32> {
        let op = Opcode::WifiStatus;
        let res = self.exchange(op, &[])?;
        expect_ok(op, &res, 2)?;
        parse_number(op, &res[1])
    }

    /// Start associating with a wireless network.
    pub fn wifi_connect(&self, ssid: &str, password: &str) -> Result<()> {
        let op = Opcode::WifiConnect;
        let res = self.exchange(op, &[ssid, password])?;
        expect_ok(op, &res, 1)
    }

    /// Drop the wireless association.
    pub fn wifi_disconnect(&self) -> Result<()> {
        let op = Opcode::WifiDisconnect;
        let res = self.exchange(op, &[])?;
        expect_ok(op, &res, 1)
    }

    /// Whether the module is associated with a wireless network.
    pub fn wifi_is_connected(&self) -> Result<bool> {
        let op = Opcode::WifiIsConnected;
        let res = self.exchange(op, &[])?;
        expect_ok(op, &res, 2)?;
        Ok(&res[1] != "0")
    }

    /// Set the relay transport security mode.
    pub fn ws_security(&self, mode: &str) -> Result<()> {
        let op = Opcode::WsSecurity;
        let res = self.exchange(op, &[mode])?;
        expect_ok(op, &res, 1)
    }

    /// Open the relay connection. Returns `false` when the module reports
    /// that the connection could not be established.
    pub fn ws_connect(&self, url: &str) -> Result<bool> {
        let op = Opcode::WsConnect;
        let res = self.exchange(op, &[url])?;
        expect_len(op, &res, 1)?;
        match &res[0] {
            OUTCOME_OK => Ok(true),
            OUTCOME_CONNECT_ERROR => Ok(false),
            other => Err(ModuleError::Outcome {
                op,
                outcome: other.to_string(),
            }),
        }
    }

    /// Close the relay connection.
    pub fn ws_close(&self) -> Result<()> {
        let op = Opcode::WsClose;
        let res = self.exchange(op, &[])?;
        expect_ok(op, &res, 1)
    }

    /// Send one payload over the relay connection, prefixed with its length
    /// in characters.
    pub fn ws_send(&self, payload: &str) -> Result<()> {
        let op = Opcode::WsSend;
        let len = payload.chars().count().to_string();
        let res = self.exchange(op, &[&len, payload])?;
        expect_ok(op, &res, 1)
    }

    /// Number of inbound relay payloads buffered by the module.
    pub fn ws_received_count(&self) -> Result<usize> {
        let op = Opcode::WsReceivedCount;
        let res = self.exchange(op, &[])?;
        expect_ok(op, &res, 2)?;
        parse_number(op, &res[1])
    }

    /// Take one buffered inbound relay payload, if any.
    pub fn ws_receive(&self) -> Result<Option<String>> {
        let op = Opcode::WsReceive;
        let res = self.exchange(op, &[])?;
        match res.head() {
            None => Err(ModuleError::FieldCount {
                op,
                expected: 1,
                actual: 0,
            }),
            Some(OUTCOME_NOT_RECEIVED) => Ok(None),
            Some(OUTCOME_OK) if res.len() == 3 => Ok(res.field(2).map(str::to_string)),
            Some(OUTCOME_OK) => Err(ModuleError::ReceiveFieldCount { actual: res.len() }),
            Some(other) => Err(ModuleError::Outcome {
                op,
                outcome: other.to_string(),
            }),
        }
    }

    fn exchange(&self, op: Opcode, args: &[&str]) -> Result<Frame> {
        let _guard = self.token.acquire(self.config.token_timeout())?;

        self.channel.pre_read()?;
        let request = Frame::new(std::iter::once(op.as_str()).chain(args.iter().copied()));
        self.channel.write(&request)?;
        let response = self.channel.read()?;

        debug!(op = %op, fields = response.len(), "module exchange complete");
        Ok(response)
    }
}

impl std::fmt::Debug for ModuleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleClient")
            .field("token", &self.token)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn expect_len(op: Opcode, res: &Frame, expected: usize) -> Result<()> {
    if res.len() != expected {
        return Err(ModuleError::FieldCount {
            op,
            expected,
            actual: res.len(),
        });
    }
    Ok(())
}

fn expect_ok(op: Opcode, res: &Frame, expected: usize) -> Result<()> {
    expect_len(op, res, expected)?;
    match res.head() {
        Some(OUTCOME_OK) => Ok(()),
        other => Err(ModuleError::Outcome {
            op,
            outcome: other.unwrap_or_default().to_string(),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(op: Opcode, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ModuleError::InvalidNumber {
            op,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    use roboblocks_frame::decode_frame;
    use roboblocks_transport::{ManualClock, ReplyTransport, SystemClock};

    use super::*;

    type Replies = Arc<Mutex<Vec<Vec<String>>>>;

    /// Client whose module answers every request with `reply(request)`.
    fn client_with<F>(mut reply: F) -> (ModuleClient, Replies)
    where
        F: FnMut(&[String]) -> Option<Vec<String>> + Send + 'static,
    {
        let requests: Replies = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);
        let transport = ReplyTransport::new(move |line: &str| {
            let fields = decode_frame(line)?;
            log.lock().unwrap().push(fields.clone());
            reply(&fields).map(|res| Frame::new(res).encode())
        });
        let client = ModuleClient::new(Arc::new(transport), Arc::new(ManualClock::new()));
        (client, requests)
    }

    fn fixed(res: &'static [&'static str]) -> impl FnMut(&[String]) -> Option<Vec<String>> {
        move |_| Some(res.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn wifi_status_parses_code() {
        let (client, requests) = client_with(fixed(&["ok", "3"]));
        assert_eq!(client.wifi_status().unwrap(), 3);
        assert_eq!(requests.lock().unwrap()[0], vec!["wifi_status"]);
    }

    #[test]
    fn wifi_connect_sends_credentials() {
        let (client, requests) = client_with(fixed(&["ok"]));
        client.wifi_connect("home,net", "pa*ss").unwrap();
        assert_eq!(
            requests.lock().unwrap()[0],
            vec!["wifi_connect", "home,net", "pa*ss"]
        );
    }

    #[test]
    fn wifi_is_connected_treats_zero_as_false() {
        let (client, _) = client_with(fixed(&["ok", "0"]));
        assert!(!client.wifi_is_connected().unwrap());

        let (client, _) = client_with(fixed(&["ok", "1"]));
        assert!(client.wifi_is_connected().unwrap());
    }

    #[test]
    fn ws_connect_error_is_soft_failure() {
        let (client, requests) = client_with(fixed(&["connect_error"]));
        assert!(!client.ws_connect("wss://relay.example/ws").unwrap());
        assert_eq!(
            requests.lock().unwrap()[0],
            vec!["ws_connect", "wss://relay.example/ws"]
        );

        let (client, _) = client_with(fixed(&["ok"]));
        assert!(client.ws_connect("wss://relay.example/ws").unwrap());
    }

    #[test]
    fn ws_security_sends_mode() {
        let (client, requests) = client_with(fixed(&["ok"]));
        client.ws_security("insecure").unwrap();
        assert_eq!(requests.lock().unwrap()[0], vec!["ws_security", "insecure"]);
    }

    #[test]
    fn ws_send_prefixes_character_count() {
        let (client, requests) = client_with(fixed(&["ok"]));
        client.ws_send("message_type\tlogout").unwrap();
        client.ws_send("température").unwrap();

        let requests = requests.lock().unwrap();
        assert_eq!(requests[0], vec!["ws_send", "19", "message_type\tlogout"]);
        assert_eq!(requests[1], vec!["ws_send", "11", "température"]);
    }

    #[test]
    fn ws_receive_outcomes() {
        let (client, _) = client_with(fixed(&["not_received"]));
        assert_eq!(client.ws_receive().unwrap(), None);

        let (client, _) = client_with(fixed(&["ok", "9", "a\tb\nc\td"]));
        assert_eq!(client.ws_receive().unwrap().as_deref(), Some("a\tb\nc\td"));

        let (client, _) = client_with(fixed(&["ok", "9"]));
        let err = client.ws_receive().unwrap_err();
        assert!(matches!(err, ModuleError::ReceiveFieldCount { actual: 2 }));
        assert_eq!(err.code(), 20);

        let (client, _) = client_with(fixed(&["busy"]));
        assert_eq!(client.ws_receive().unwrap_err().code(), 19);
    }

    #[test]
    fn ws_received_count_parses() {
        let (client, _) = client_with(fixed(&["ok", "4"]));
        assert_eq!(client.ws_received_count().unwrap(), 4);

        let (client, _) = client_with(fixed(&["ok", "many"]));
        let err = client.ws_received_count().unwrap_err();
        assert!(matches!(err, ModuleError::InvalidNumber { .. }));
        assert_eq!(err.code(), 21);
    }

    #[test]
    fn wrong_field_count_reports_operation_code() {
        let (client, _) = client_with(fixed(&["ok", "extra"]));
        assert_eq!(client.wifi_connect("a", "b").unwrap_err().code(), 2);
        assert_eq!(client.wifi_disconnect().unwrap_err().code(), 4);
        assert_eq!(client.ws_security("insecure").unwrap_err().code(), 8);
        assert_eq!(client.ws_connect("u").unwrap_err().code(), 10);
        assert_eq!(client.ws_close().unwrap_err().code(), 12);
        assert_eq!(client.ws_send("p").unwrap_err().code(), 14);

        let (client, _) = client_with(fixed(&["ok"]));
        assert_eq!(client.wifi_status().unwrap_err().code(), 0);
        assert_eq!(client.wifi_is_connected().unwrap_err().code(), 6);
        assert_eq!(client.ws_received_count().unwrap_err().code(), 16);
    }

    #[test]
    fn unexpected_outcome_reports_operation_code() {
        let (client, _) = client_with(fixed(&["error"]));
        assert_eq!(client.wifi_connect("a", "b").unwrap_err().code(), 3);
        assert_eq!(client.ws_connect("u").unwrap_err().code(), 11);
        assert_eq!(client.ws_close().unwrap_err().code(), 13);

        let (client, _) = client_with(fixed(&["error", "1"]));
        assert_eq!(client.wifi_status().unwrap_err().code(), 1);
        assert_eq!(client.wifi_is_connected().unwrap_err().code(), 7);
    }

    #[test]
    fn silent_module_is_read_timeout() {
        let (client, _) = client_with(|_| None);
        let err = client.wifi_status().unwrap_err();
        assert!(matches!(err, ModuleError::Frame(_)));
        assert_eq!(err.code(), 102);
    }

    #[test]
    fn held_token_times_out_operation() {
        let clock = Arc::new(ManualClock::new());
        let transport = ReplyTransport::new(|_: &str| Some("*ok,3\n".to_string()));
        let client = ModuleClient::new(Arc::new(transport), clock.clone());

        let _held = client.token.acquire(Duration::ZERO).unwrap();
        let err = client.wifi_status().unwrap_err();

        assert!(matches!(err, ModuleError::TokenTimeout(_)));
        assert_eq!(err.code(), 101);
        assert!(clock.now() >= ModuleConfig::default().token_timeout());
    }

    #[test]
    fn concurrent_callers_get_their_own_responses() {
        let transport = ReplyTransport::new(|line: &str| {
            let fields = decode_frame(line)?;
            match fields[0].as_str() {
                "wifi_status" => Some("*ok,5\n".to_string()),
                "ws_receivedcount" => Some("*ok,7\n".to_string()),
                _ => None,
            }
        });
        let client = Arc::new(ModuleClient::new(
            Arc::new(transport),
            Arc::new(SystemClock::new()),
        ));

        let status = {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                for _ in 0..50 {
                    assert_eq!(client.wifi_status().unwrap(), 5);
                }
            })
        };
        let count = {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                for _ in 0..50 {
                    assert_eq!(client.ws_received_count().unwrap(), 7);
                }
            })
        };

        status.join().unwrap();
        count.join().unwrap();
    }
}
