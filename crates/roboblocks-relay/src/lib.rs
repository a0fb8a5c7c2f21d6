//! Relay message codec and receive correlation.
//!
//! Relay messages travel as `key\tvalue` lines through the companion
//! module's WebSocket link. [`Correlator`] polls the module's inbound buffer,
//! tracks pairing notifications and matches responses to requests.

pub mod correlator;
pub mod error;
pub mod message;

pub use correlator::{
    Correlator, CorrelatorConfig, PairingEvent, PairingListener, DEFAULT_TOKEN_TIMEOUT,
};
pub use error::{RelayError, Result};
pub use message::{MessageBuilder, RelayMessage};
