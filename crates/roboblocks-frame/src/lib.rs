//! Escaped line framing and request/response exchange for the companion module.
//!
//! Every message on the serial link is one line:
//! - A `*` start marker
//! - Comma-separated fields, each escaped independently
//! - A `\n` terminator
//!
//! [`ExchangeChannel`] turns the line transport into a blocking
//! "write request, await response" primitive with a read timeout.

pub mod codec;
pub mod error;
pub mod exchange;

pub use codec::{
    decode_frame, encode_frame, escape_field, unescape_field, Frame, FIELD_SEPARATOR,
    START_MARKER, TERMINATOR,
};
pub use error::{FrameError, Result};
pub use exchange::{ExchangeChannel, ExchangeConfig, DEFAULT_POLL_INTERVAL, DEFAULT_READ_TIMEOUT};
