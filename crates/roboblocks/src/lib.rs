//! Wi-Fi and relay connectivity through a serial companion module.
//!
//! roboblocks drives a Wi-Fi/WebSocket companion module attached over a
//! serial line: it associates with a wireless network, logs in to a relay
//! room, tracks pairing with a remote peer and sends sensor telemetry.
//!
//! # Crate Structure
//!
//! - [`transport`]: line-oriented byte transport and clock collaborators
//! - [`frame`]: escaped line framing and request/response exchange
//! - [`module`]: companion module operation client
//! - [`relay`]: relay message codec and receive correlation (behind `controller` feature)
//! - [`controller`]: connection state machine (behind `controller` feature)

/// Re-export transport types.
pub mod transport {
    pub use roboblocks_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use roboblocks_frame::*;
}

/// Re-export companion module types.
pub mod module {
    pub use roboblocks_module::*;
}

/// Re-export relay types (requires `controller` feature).
#[cfg(feature = "controller")]
pub mod relay {
    pub use roboblocks_relay::*;
}

/// Re-export controller types (requires `controller` feature).
#[cfg(feature = "controller")]
pub mod controller {
    pub use roboblocks_controller::*;
}
