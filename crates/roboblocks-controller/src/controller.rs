use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use roboblocks_module::ModuleClient;
use roboblocks_relay::message::{self, MessageBuilder, ACK, ACTION, EVENT_SENSOR, LOGIN, LOGOUT, RESULT_OK};
use roboblocks_relay::{Correlator, PairingEvent, RelayMessage};
use roboblocks_transport::{Clock, LineTransport};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::error::Result;
use crate::events::{ControllerEvent, EventHandler, Handlers};
use crate::state::ConnectionState;
use crate::telemetry::Telemetry;

#[derive(Debug, Clone, Copy)]
struct StateRecord {
    state: ConnectionState,
    since: Duration,
}

/// Snapshot of the companion module's own view of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModuleStatus {
    pub wifi_status: i32,
    pub wifi_connected: bool,
    pub buffered_payloads: usize,
}

/// Drives the companion module through Wi-Fi association, relay login and
/// pairing, and sends telemetry while logged in.
///
/// Foreground operations (`connect_wifi`, `connect_server`, `send_value`, ...)
/// run on the caller's thread. Timeouts of the connecting state and inbound
/// relay traffic are handled by [`tick`](Self::tick), which the background
/// driver calls periodically (see [`Controller::spawn_driver`]).
///
/// Handlers fire synchronously at the transition that raises them, after the
/// new state is recorded.
pub struct Controller {
    client: Arc<ModuleClient>,
    correlator: Correlator,
    clock: Arc<dyn Clock>,
    config: ControllerConfig,
    record: Mutex<StateRecord>,
    telemetry: Mutex<Telemetry>,
    last_send: Mutex<Duration>,
    handlers: Arc<Handlers>,
}

impl Controller {
    /// Create a controller with default configuration.
    pub fn new(transport: Arc<dyn LineTransport>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(transport, clock, ControllerConfig::default())
    }

    pub fn with_config(
        transport: Arc<dyn LineTransport>,
        clock: Arc<dyn Clock>,
        config: ControllerConfig,
    ) -> Self {
        let client = Arc::new(ModuleClient::with_config(
            transport,
            Arc::clone(&clock),
            config.module,
        ));
        let correlator = Correlator::with_config(
            Arc::clone(&client),
            Arc::clone(&clock),
            config.correlator_config(),
        );

        let handlers = Arc::new(Handlers::default());
        let sink = Arc::clone(&handlers);
        correlator.set_pairing_listener(Arc::new(move |event| match event {
            PairingEvent::Paired => sink.fire(ControllerEvent::Paired),
            PairingEvent::Unpaired => sink.fire(ControllerEvent::Unpaired),
        }));

        let now = clock.now();
        Self {
            client,
            correlator,
            clock,
            config,
            record: Mutex::new(StateRecord {
                state: ConnectionState::WifiDisconnected,
                since: now,
            }),
            telemetry: Mutex::new(Telemetry::default()),
            last_send: Mutex::new(now),
            handlers,
        }
    }

    /// Attach a handler to `event`, replacing any previous one.
    pub fn on<F>(&self, event: ControllerEvent, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.set_handler(event, Arc::new(handler));
    }

    pub fn set_handler(&self, event: ControllerEvent, handler: EventHandler) {
        self.handlers.set(event, handler);
    }

    pub fn clear_handler(&self, event: ControllerEvent) {
        self.handlers.clear(event);
    }

    pub fn state(&self) -> ConnectionState {
        self.record().state
    }

    /// Clock reading at the most recent transition.
    pub fn state_changed_at(&self) -> Duration {
        self.record().since
    }

    /// Telemetry waiting for the next acknowledged send.
    pub fn pending_telemetry(&self) -> Telemetry {
        self.lock_telemetry().clone()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<ModuleClient> {
        &self.client
    }

    pub(crate) fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Start associating with a wireless network.
    ///
    /// Enters WiFiConnecting without firing a handler; the outcome is
    /// decided by later ticks.
    pub fn connect_wifi(&self, ssid: &str, password: &str) -> Result<()> {
        self.client.wifi_connect(ssid, password)?;
        self.transition(ConnectionState::WifiConnecting, None);
        Ok(())
    }

    /// Ask the module to drop its wireless association. The next tick
    /// observes the loss and fires [`ControllerEvent::WifiDisconnected`].
    pub fn disconnect_wifi(&self) -> Result<()> {
        self.client.wifi_disconnect()?;
        Ok(())
    }

    /// Open the relay connection and log in to `room`.
    ///
    /// Ignored unless Wi-Fi is connected. Returns `true` when the relay
    /// accepted the login.
    pub fn connect_server(&self, room: &str, password: &str, user: &str) -> Result<bool> {
        let state = self.state();
        if !state.accepts_relay_commands() {
            debug!(%state, "login ignored");
            return Ok(false);
        }

        self.client.ws_security(&self.config.relay_security)?;
        if !self.client.ws_connect(&self.config.relay_url)? {
            warn!(url = %self.config.relay_url, "relay connection refused");
            self.transition(ConnectionState::WifiConnected, Some(ControllerEvent::LoginFailed));
            return Ok(false);
        }

        let login = message::login(&self.config.device_type, room, password, user);
        let response =
            self.correlator
                .send_and_await(Some(&login), Some(LOGIN), self.config.message_timeout())?;

        let result = response.as_ref().and_then(RelayMessage::result);
        if result != Some(RESULT_OK) {
            warn!(room, result = ?result, "relay login rejected");
            self.client.ws_close()?;
            self.transition(ConnectionState::WifiConnected, Some(ControllerEvent::LoginFailed));
            return Ok(false);
        }

        self.correlator.reset_pairing();
        self.transition(
            ConnectionState::ServerConnected,
            Some(ControllerEvent::LoginSucceeded),
        );
        Ok(true)
    }

    /// Log out of the relay and close the relay connection.
    ///
    /// Ignored unless Wi-Fi is connected. The logout response is awaited but
    /// its outcome does not change the result.
    pub fn server_disconnect(&self) -> Result<()> {
        let state = self.state();
        if !state.accepts_relay_commands() {
            debug!(%state, "logout ignored");
            return Ok(());
        }

        if state == ConnectionState::ServerConnected {
            let response = self.correlator.send_and_await(
                Some(&message::logout()),
                Some(LOGOUT),
                self.config.message_timeout(),
            )?;
            if response.as_ref().and_then(RelayMessage::result) != Some(RESULT_OK) {
                debug!("logout not confirmed by relay");
            }
        }

        self.client.ws_close()?;
        self.transition(ConnectionState::WifiConnected, Some(ControllerEvent::LoggedOut));
        Ok(())
    }

    /// Tell the relay this device is leaving its pairing. Only valid while
    /// logged in; the state does not change.
    pub fn robot_disconnect(&self) -> Result<()> {
        if self.state() != ConnectionState::ServerConnected {
            return Ok(());
        }
        self.correlator
            .send_and_await(Some(&message::unpair_device()), None, Duration::ZERO)?;
        Ok(())
    }

    /// Whether a remote peer is paired. Always `false` unless logged in.
    pub fn is_paired(&self) -> bool {
        self.state() == ConnectionState::ServerConnected && self.correlator.is_paired()
    }

    /// Buffer one telemetry value for the next [`send_value`](Self::send_value).
    pub fn set_value(&self, key: &str, value: f64) {
        self.lock_telemetry().set(key, value);
    }

    /// Send buffered telemetry to the relay.
    ///
    /// No-op unless logged in. Blocks until the minimum send interval has
    /// passed since the previous send. The buffer is cleared only when the
    /// relay acknowledges; returns whether it did.
    pub fn send_value(&self) -> Result<bool> {
        if self.state() != ConnectionState::ServerConnected {
            return Ok(false);
        }

        self.throttle();

        let payload = {
            let telemetry = self.lock_telemetry();
            MessageBuilder::new(ACTION)
                .field("device_type", self.config.device_type.as_str())
                .field("event", EVENT_SENSOR)
                .fields(telemetry.fields())
                .encode()
        };

        let ack = self
            .correlator
            .send_and_await(Some(&payload), Some(ACK), Duration::ZERO)?;
        if ack.is_none() {
            debug!("telemetry not acknowledged, keeping buffer");
            return Ok(false);
        }

        self.lock_telemetry().clear();
        Ok(true)
    }

    /// Query the module's own link status.
    pub fn module_status(&self) -> Result<ModuleStatus> {
        Ok(ModuleStatus {
            wifi_status: self.client.wifi_status()?,
            wifi_connected: self.client.wifi_is_connected()?,
            buffered_payloads: self.client.ws_received_count()?,
        })
    }

    /// One pass of the background state check.
    pub fn tick(&self) -> Result<()> {
        let StateRecord { state, since } = self.record();
        match state {
            ConnectionState::WifiDisconnected => {}
            ConnectionState::WifiConnecting => {
                if self.clock.now() >= since + self.config.wifi_connect_timeout() {
                    warn!(timeout = ?self.config.wifi_connect_timeout(), "Wi-Fi association timed out");
                    self.transition(
                        ConnectionState::WifiDisconnected,
                        Some(ControllerEvent::WifiConnectFailed),
                    );
                } else if self.client.wifi_is_connected()? {
                    self.transition(
                        ConnectionState::WifiConnected,
                        Some(ControllerEvent::WifiConnected),
                    );
                }
            }
            ConnectionState::WifiConnected => {
                if !self.client.wifi_is_connected()? {
                    self.wifi_lost();
                }
            }
            ConnectionState::ServerConnected => {
                if !self.client.wifi_is_connected()? {
                    self.wifi_lost();
                } else {
                    self.correlator.send_and_await(None, None, Duration::ZERO)?;
                }
            }
        }
        Ok(())
    }

    fn wifi_lost(&self) {
        warn!("Wi-Fi association lost");
        self.transition(
            ConnectionState::WifiDisconnected,
            Some(ControllerEvent::WifiDisconnected),
        );
    }

    fn throttle(&self) {
        let mut last_send = self.last_send.lock().unwrap_or_else(|e| e.into_inner());
        let earliest = *last_send + self.config.min_send_interval();
        while self.clock.now() < earliest {
            self.clock.sleep(self.config.module.poll_interval());
        }
        *last_send = self.clock.now();
    }

    fn transition(&self, state: ConnectionState, event: Option<ControllerEvent>) {
        let previous = {
            let mut record = self.record.lock().unwrap_or_else(|e| e.into_inner());
            let previous = record.state;
            *record = StateRecord {
                state,
                since: self.clock.now(),
            };
            previous
        };
        info!(from = %previous, to = %state, event = ?event, "state changed");

        if let Some(event) = event {
            self.handlers.fire(event);
        }
    }

    fn record(&self) -> StateRecord {
        *self.record.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_telemetry(&self) -> MutexGuard<'_, Telemetry> {
        self.telemetry.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("state", &self.state())
            .field("correlator", &self.correlator)
            .field("handlers", &self.handlers)
            .finish_non_exhaustive()
    }
}
