use std::sync::Arc;

use crate::error::Result;

/// Callback invoked for every delimiter-terminated line received.
///
/// The line is passed as received, including its trailing `\n` when the
/// transport saw one.
pub type LineHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// A line-delimited byte transport to the companion module.
///
/// Writes are pushed to the wire immediately with no queuing; callers are
/// responsible for not overlapping request/response exchanges.
pub trait LineTransport: Send + Sync {
    /// Write one complete line. `line` already carries its terminator.
    fn write_line(&self, line: &str) -> Result<()>;

    /// Register the "line received" notification.
    ///
    /// Only one handler is active at a time; registering again replaces the
    /// previous handler.
    fn on_line_received(&self, handler: LineHandler) -> Result<()>;
}
