use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use roboblocks_module::{ExchangeToken, ModuleClient};
use roboblocks_transport::Clock;
use tracing::{debug, info, trace};

use crate::error::{RelayError, Result};
use crate::message::{RelayMessage, PAIR_DEVICE, UNPAIR_DEVICE};

/// Default bound on acquiring the relay receive token.
pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

/// Pairing change observed on the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingEvent {
    Paired,
    Unpaired,
}

/// Callback for pairing notifications. Runs inside the correlation loop.
pub type PairingListener = Arc<dyn Fn(PairingEvent) + Send + Sync>;

/// Correlator timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelatorConfig {
    pub token_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            token_timeout: DEFAULT_TOKEN_TIMEOUT,
            poll_interval: Duration::from_millis(1),
        }
    }
}

/// Receive correlation over the relay connection.
///
/// The companion module buffers inbound relay payloads; the correlator polls
/// them one exchange at a time, watches for pairing notifications and hands
/// back the first message of an awaited type. Correlation sequences are
/// serialized by their own token, independent of the module's exchange token,
/// so concurrent callers interleave per module exchange but never within one
/// sequence.
pub struct Correlator {
    client: Arc<ModuleClient>,
    clock: Arc<dyn Clock>,
    token: ExchangeToken,
    paired: AtomicBool,
    listener: Mutex<Option<PairingListener>>,
    config: CorrelatorConfig,
}

impl Correlator {
    pub fn new(client: Arc<ModuleClient>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(client, clock, CorrelatorConfig::default())
    }

    pub fn with_config(
        client: Arc<ModuleClient>,
        clock: Arc<dyn Clock>,
        config: CorrelatorConfig,
    ) -> Self {
        let token = ExchangeToken::new("relay receive", Arc::clone(&clock), config.poll_interval);
        Self {
            client,
            clock,
            token,
            paired: AtomicBool::new(false),
            listener: Mutex::new(None),
            config,
        }
    }

    /// Register the pairing listener, replacing any previous one.
    pub fn set_pairing_listener(&self, listener: PairingListener) {
        *self.listener.lock().unwrap_or_else(|e| e.into_inner()) = Some(listener);
    }

    /// Optionally send `outgoing`, then poll inbound relay traffic until a
    /// message of type `expected` arrives or `timeout` elapses.
    ///
    /// Pairing notifications are consumed along the way regardless of
    /// `expected`. A zero `timeout` makes a single pass over whatever is
    /// buffered. Returns `Ok(None)` when nothing matching arrived in time.
    pub fn send_and_await(
        &self,
        outgoing: Option<&str>,
        expected: Option<&str>,
        timeout: Duration,
    ) -> Result<Option<RelayMessage>> {
        let _guard = self
            .token
            .acquire(self.config.token_timeout)
            .map_err(RelayError::TokenTimeout)?;

        if let Some(payload) = outgoing {
            self.client.ws_send(payload)?;
        }

        let deadline = self.clock.now() + timeout;
        loop {
            if let Some(payload) = self.client.ws_receive()? {
                let message = RelayMessage::parse(&payload);
                let message_type = message.message_type();
                trace!(message_type = ?message_type, "relay message received");

                if expected.is_some() && message_type == expected {
                    return Ok(Some(message));
                }

                match message_type {
                    Some(PAIR_DEVICE) => {
                        info!("relay peer paired");
                        self.notify(PairingEvent::Paired);
                        self.paired.store(true, Ordering::SeqCst);
                        continue;
                    }
                    Some(UNPAIR_DEVICE) => {
                        info!("relay peer unpaired");
                        self.paired.store(false, Ordering::SeqCst);
                        self.notify(PairingEvent::Unpaired);
                        continue;
                    }
                    _ => {}
                }
            }

            if self.clock.now() >= deadline {
                break;
            }
            self.clock.sleep(self.config.poll_interval);
        }

        if let Some(expected) = expected {
            debug!(expected, ?timeout, "relay message not received in time");
        }
        Ok(None)
    }

    /// Raw pairing flag. Only meaningful while logged in to the relay.
    pub fn is_paired(&self) -> bool {
        self.paired.load(Ordering::SeqCst)
    }

    pub fn reset_pairing(&self) {
        self.paired.store(false, Ordering::SeqCst);
    }

    pub fn client(&self) -> &Arc<ModuleClient> {
        &self.client
    }

    fn notify(&self, event: PairingEvent) {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(listener) = listener {
            listener(event);
        }
    }
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator")
            .field("paired", &self.is_paired())
            .field("token", &self.token)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
