//! Byte transport and clock collaborators for the companion module link.
//!
//! Provides a unified line-oriented interface over the serial link to the
//! Wi-Fi companion module:
//! - [`SerialLink`] over a tty device or any `Read`/`Write` pair
//! - [`ReplyTransport`] for in-process peers that answer written lines
//!
//! This is the lowest layer of roboblocks. Everything else builds on top of
//! the [`LineTransport`] trait and the [`Clock`] provided here.

pub mod clock;
pub mod error;
pub mod reply;
pub mod serial;
pub mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, TransportError};
pub use reply::ReplyTransport;
pub use serial::{LinkConfig, SerialLink, DEFAULT_MAX_LINE_LENGTH};
pub use traits::{LineHandler, LineTransport};
