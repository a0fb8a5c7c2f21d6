use std::sync::Mutex;

use tracing::trace;

use crate::error::Result;
use crate::traits::{LineHandler, LineTransport};

/// In-process transport whose far end is a reply function.
///
/// Every written line is handed to the reply function. When it returns a
/// line, that line is delivered to the registered handler before
/// `write_line` returns, exactly as if the peer had answered over the wire.
/// A `None` reply models a peer that stays silent.
pub struct ReplyTransport<F> {
    reply: Mutex<F>,
    handler: Mutex<Option<LineHandler>>,
    written: Mutex<Vec<String>>,
}

impl<F> ReplyTransport<F>
where
    F: FnMut(&str) -> Option<String> + Send,
{
    pub fn new(reply: F) -> Self {
        Self {
            reply: Mutex::new(reply),
            handler: Mutex::new(None),
            written: Mutex::new(Vec::new()),
        }
    }

    /// Every line written so far, oldest first.
    pub fn written(&self) -> Vec<String> {
        self.written
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Deliver an unsolicited line to the registered handler.
    pub fn inject(&self, line: &str) {
        let handler = self
            .handler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(handler) = handler {
            handler(line);
        }
    }
}

impl<F> LineTransport for ReplyTransport<F>
where
    F: FnMut(&str) -> Option<String> + Send,
{
    fn write_line(&self, line: &str) -> Result<()> {
        self.written
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(line.to_string());

        let reply = {
            let mut reply = self.reply.lock().unwrap_or_else(|e| e.into_inner());
            (*reply)(line)
        };

        if let Some(reply) = reply {
            trace!(line = %reply.trim_end(), "reply transport answering");
            self.inject(&reply);
        }
        Ok(())
    }

    fn on_line_received(&self, handler: LineHandler) -> Result<()> {
        *self.handler.lock().unwrap_or_else(|e| e.into_inner()) = Some(handler);
        Ok(())
    }
}

impl<F> std::fmt::Debug for ReplyTransport<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let written = self.written.lock().map(|w| w.len()).unwrap_or(0);
        f.debug_struct("ReplyTransport")
            .field("written", &written)
            .finish_non_exhaustive()
    }
}
