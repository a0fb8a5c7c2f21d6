//! Request/response client for the serial Wi-Fi/WebSocket companion module.
//!
//! This is the layer that knows the companion module's operation catalogue.
//! Every operation is serialized by an [`ExchangeToken`] and validates the
//! response shape; contract violations surface as [`ModuleError`] values with
//! stable identifiers.

pub mod client;
pub mod config;
pub mod error;
pub mod opcode;
pub mod token;

pub use client::ModuleClient;
pub use config::ModuleConfig;
pub use error::{ModuleError, Result};
pub use opcode::{
    Opcode, OUTCOME_CONNECT_ERROR, OUTCOME_NOT_RECEIVED, OUTCOME_OK, SECURITY_INSECURE,
};
pub use token::{ExchangeToken, TokenGuard, TokenTimeout};
