//! In-process stand-in for the companion module and the relay behind it.
//!
//! [`SimulatedModule`] answers the companion module's opcodes over a
//! [`ReplyTransport`] and plays a minimal relay: it answers login, logout and
//! telemetry messages and lets the caller inject pairing traffic. Used by the
//! integration tests and the CLI `demo` command.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use roboblocks_frame::{decode_frame, encode_frame};
use roboblocks_module::{Opcode, OUTCOME_CONNECT_ERROR, OUTCOME_NOT_RECEIVED, OUTCOME_OK};
use roboblocks_relay::message::{
    self, MessageBuilder, ACK, ACTION, LOGIN, LOGOUT, PAIR_DEVICE, RESULT, RESULT_OK,
};
use roboblocks_relay::RelayMessage;
use roboblocks_transport::{Clock, LineTransport, ReplyTransport};
use tracing::trace;

/// Status code reported while associated.
pub const WIFI_STATUS_CONNECTED: i32 = 3;

/// Status code reported while not associated.
pub const WIFI_STATUS_DISCONNECTED: i32 = 6;

/// One request the module received, stamped with the clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub at: Duration,
    pub fields: Vec<String>,
}

impl Request {
    pub fn opcode(&self) -> Option<&str> {
        self.fields.first().map(String::as_str)
    }
}

/// One payload sent over the relay connection, stamped with the clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPayload {
    pub at: Duration,
    pub payload: String,
}

impl SentPayload {
    pub fn message(&self) -> RelayMessage {
        RelayMessage::parse(&self.payload)
    }
}

#[derive(Debug)]
struct SimState {
    silent: bool,
    associate_after: Option<u32>,
    polls_until_associated: u32,
    associating: bool,
    wifi_connected: bool,
    ssid: Option<String>,
    security: Option<String>,
    accept_relay: bool,
    relay_open: bool,
    login_result: Option<String>,
    answer_logout: bool,
    acknowledge: bool,
    inbound: VecDeque<String>,
    requests: Vec<Request>,
    sent: Vec<SentPayload>,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            silent: false,
            associate_after: Some(0),
            polls_until_associated: 0,
            associating: false,
            wifi_connected: false,
            ssid: None,
            security: None,
            accept_relay: true,
            relay_open: false,
            login_result: Some(RESULT_OK.to_string()),
            answer_logout: true,
            acknowledge: true,
            inbound: VecDeque::new(),
            requests: Vec::new(),
            sent: Vec::new(),
        }
    }
}

impl SimState {
    fn answer(&mut self, fields: &[String]) -> Option<Vec<String>> {
        let op = fields.first().and_then(|op| Opcode::from_wire(op))?;
        let ok = || vec![OUTCOME_OK.to_string()];

        let reply = match op {
            Opcode::WifiStatus => {
                let code = if self.wifi_connected {
                    WIFI_STATUS_CONNECTED
                } else {
                    WIFI_STATUS_DISCONNECTED
                };
                vec![OUTCOME_OK.to_string(), code.to_string()]
            }
            Opcode::WifiConnect => {
                self.ssid = fields.get(1).cloned();
                self.wifi_connected = false;
                self.relay_open = false;
                self.associating = self.associate_after.is_some();
                self.polls_until_associated = self.associate_after.unwrap_or(0);
                ok()
            }
            Opcode::WifiDisconnect => {
                self.drop_wifi();
                ok()
            }
            Opcode::WifiIsConnected => {
                if self.associating && !self.wifi_connected {
                    if self.polls_until_associated == 0 {
                        self.associating = false;
                        self.wifi_connected = true;
                    } else {
                        self.polls_until_associated -= 1;
                    }
                }
                let flag = if self.wifi_connected { "1" } else { "0" };
                vec![OUTCOME_OK.to_string(), flag.to_string()]
            }
            Opcode::WsSecurity => {
                self.security = fields.get(1).cloned();
                ok()
            }
            Opcode::WsConnect => {
                if self.wifi_connected && self.accept_relay {
                    self.relay_open = true;
                    ok()
                } else {
                    vec![OUTCOME_CONNECT_ERROR.to_string()]
                }
            }
            Opcode::WsClose => {
                self.relay_open = false;
                ok()
            }
            Opcode::WsSend => {
                let payload = fields.get(2).cloned().unwrap_or_default();
                self.relay_received(&payload);
                ok()
            }
            Opcode::WsReceivedCount => {
                vec![OUTCOME_OK.to_string(), self.inbound.len().to_string()]
            }
            Opcode::WsReceive => match self.inbound.pop_front() {
                Some(payload) => vec![
                    OUTCOME_OK.to_string(),
                    payload.chars().count().to_string(),
                    payload,
                ],
                None => vec![OUTCOME_NOT_RECEIVED.to_string()],
            },
        };
        Some(reply)
    }

    fn relay_received(&mut self, payload: &str) {
        if !self.relay_open {
            return;
        }
        let message = RelayMessage::parse(payload);
        let response = match message.message_type() {
            Some(LOGIN) => self
                .login_result
                .as_deref()
                .map(|result| MessageBuilder::new(LOGIN).field(RESULT, result).encode()),
            Some(LOGOUT) if self.answer_logout => {
                Some(MessageBuilder::new(LOGOUT).field(RESULT, RESULT_OK).encode())
            }
            Some(ACTION) if self.acknowledge => Some(MessageBuilder::new(ACK).encode()),
            _ => None,
        };
        if let Some(response) = response {
            self.inbound.push_back(response);
        }
    }

    fn drop_wifi(&mut self) {
        self.associating = false;
        self.wifi_connected = false;
        self.relay_open = false;
    }
}

/// Simulated companion module with a scriptable relay behind it.
///
/// Defaults: associates on the first `wifi_isconnected` poll, accepts the
/// relay connection, accepts every login, confirms logout and acknowledges
/// every telemetry message.
pub struct SimulatedModule {
    state: Arc<Mutex<SimState>>,
    transport: Arc<dyn LineTransport>,
}

impl SimulatedModule {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let state = Arc::new(Mutex::new(SimState::default()));
        let shared = Arc::clone(&state);
        let transport = ReplyTransport::new(move |line: &str| {
            let fields = decode_frame(line)?;
            let mut state = shared.lock().unwrap_or_else(|e| e.into_inner());
            state.requests.push(Request {
                at: clock.now(),
                fields: fields.clone(),
            });
            if fields.first().map(String::as_str) == Some(Opcode::WsSend.as_str()) {
                state.sent.push(SentPayload {
                    at: clock.now(),
                    payload: fields.get(2).cloned().unwrap_or_default(),
                });
            }
            if state.silent {
                trace!(fields = ?fields, "simulated module staying silent");
                return None;
            }
            state.answer(&fields).map(|reply| encode_frame(&reply))
        });

        Self {
            state,
            transport: Arc::new(transport),
        }
    }

    /// The serial side of the module, to hand to a controller.
    pub fn transport(&self) -> Arc<dyn LineTransport> {
        Arc::clone(&self.transport)
    }

    /// Associate after `polls` unsuccessful `wifi_isconnected` polls, or
    /// never when `None`.
    pub fn set_associate_after(&self, polls: Option<u32>) {
        self.lock().associate_after = polls;
    }

    pub fn set_relay_accepts(&self, accept: bool) {
        self.lock().accept_relay = accept;
    }

    /// Result code for login responses, or `None` to never answer logins.
    pub fn set_login_result(&self, result: Option<&str>) {
        self.lock().login_result = result.map(str::to_string);
    }

    pub fn set_answer_logout(&self, answer: bool) {
        self.lock().answer_logout = answer;
    }

    /// Whether telemetry messages are acknowledged.
    pub fn set_acknowledge(&self, acknowledge: bool) {
        self.lock().acknowledge = acknowledge;
    }

    /// Stop answering requests entirely.
    pub fn set_silent(&self, silent: bool) {
        self.lock().silent = silent;
    }

    /// Lose the wireless association (and with it the relay connection).
    pub fn drop_wifi(&self) {
        self.lock().drop_wifi();
    }

    /// Queue an inbound relay payload.
    pub fn push_inbound(&self, payload: &str) {
        self.lock().inbound.push_back(payload.to_string());
    }

    /// A remote peer pairs with the device.
    pub fn pair_peer(&self) {
        self.push_inbound(&MessageBuilder::new(PAIR_DEVICE).encode());
    }

    /// The remote peer unpairs.
    pub fn unpair_peer(&self) {
        self.push_inbound(&message::unpair_device());
    }

    pub fn wifi_connected(&self) -> bool {
        self.lock().wifi_connected
    }

    pub fn relay_open(&self) -> bool {
        self.lock().relay_open
    }

    pub fn ssid(&self) -> Option<String> {
        self.lock().ssid.clone()
    }

    /// Security mode most recently set with `ws_security`.
    pub fn security(&self) -> Option<String> {
        self.lock().security.clone()
    }

    pub fn pending_inbound(&self) -> usize {
        self.lock().inbound.len()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    /// Requests whose opcode is `op`.
    pub fn requests_for(&self, op: Opcode) -> Vec<Request> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.opcode() == Some(op.as_str()))
            .cloned()
            .collect()
    }

    /// Every relay payload sent so far, oldest first.
    pub fn sent(&self) -> Vec<SentPayload> {
        self.lock().sent.clone()
    }

    /// Relay payloads of the given message type.
    pub fn sent_of_type(&self, message_type: &str) -> Vec<SentPayload> {
        self.lock()
            .sent
            .iter()
            .filter(|s| s.message().message_type() == Some(message_type))
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for SimulatedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("SimulatedModule")
            .field("wifi_connected", &state.wifi_connected)
            .field("relay_open", &state.relay_open)
            .field("inbound", &state.inbound.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use roboblocks_transport::ManualClock;

    use super::*;

    fn exchange(sim: &SimulatedModule, fields: &[&str]) -> Option<Vec<String>> {
        let reply = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&reply);
        sim.transport()
            .on_line_received(Arc::new(move |line: &str| {
                *sink.lock().unwrap() = decode_frame(line);
            }))
            .unwrap();
        sim.transport().write_line(&encode_frame(fields)).unwrap();
        let reply = reply.lock().unwrap().take();
        reply
    }

    #[test]
    fn association_can_be_delayed() {
        let sim = SimulatedModule::new(Arc::new(ManualClock::new()));
        sim.set_associate_after(Some(2));

        exchange(&sim, &["wifi_connect", "lab", "pw"]);
        assert_eq!(sim.ssid().as_deref(), Some("lab"));

        assert_eq!(exchange(&sim, &["wifi_isconnected"]).unwrap()[1], "0");
        assert_eq!(exchange(&sim, &["wifi_isconnected"]).unwrap()[1], "0");
        assert_eq!(exchange(&sim, &["wifi_isconnected"]).unwrap()[1], "1");
        assert_eq!(exchange(&sim, &["wifi_status"]).unwrap()[1], "3");
    }

    #[test]
    fn relay_answers_login_with_configured_result() {
        let sim = SimulatedModule::new(Arc::new(ManualClock::new()));
        sim.set_login_result(Some("001"));
        exchange(&sim, &["wifi_connect", "lab", "pw"]);
        exchange(&sim, &["wifi_isconnected"]);
        assert_eq!(exchange(&sim, &["ws_connect", "wss://x"]).unwrap(), vec!["ok"]);

        let login = message::login("microbit", "r", "p", "u");
        exchange(&sim, &["ws_send", "0", login.as_str()]);

        let reply = exchange(&sim, &["ws_receive"]).unwrap();
        let message = RelayMessage::parse(&reply[2]);
        assert_eq!(message.result(), Some("001"));
        assert_eq!(sim.sent_of_type(LOGIN).len(), 1);
    }

    #[test]
    fn relay_refused_without_wifi() {
        let sim = SimulatedModule::new(Arc::new(ManualClock::new()));
        assert_eq!(
            exchange(&sim, &["ws_connect", "wss://x"]).unwrap(),
            vec!["connect_error"]
        );
    }

    #[test]
    fn silent_module_records_but_never_answers() {
        let sim = SimulatedModule::new(Arc::new(ManualClock::new()));
        sim.set_silent(true);
        assert!(exchange(&sim, &["wifi_status"]).is_none());
        assert_eq!(sim.requests().len(), 1);
    }

    #[test]
    fn receive_drains_queue_in_order() {
        let sim = SimulatedModule::new(Arc::new(ManualClock::new()));
        sim.pair_peer();
        sim.unpair_peer();
        assert_eq!(exchange(&sim, &["ws_receivedcount"]).unwrap()[1], "2");

        let first = exchange(&sim, &["ws_receive"]).unwrap();
        assert_eq!(first[2], "message_type\tpairDevice");
        let second = exchange(&sim, &["ws_receive"]).unwrap();
        assert_eq!(second[2], "message_type\tunpairDevice");
        assert_eq!(exchange(&sim, &["ws_receive"]).unwrap(), vec!["not_received"]);
    }
}
