use std::sync::{Arc, Mutex};
use std::time::Duration;

use roboblocks_transport::{Clock, LineTransport};
use tracing::{debug, trace};

use crate::codec::Frame;
use crate::error::{FrameError, Result};

/// Default time to wait for a response frame.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Default interval between checks for a pending frame.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration for an [`ExchangeChannel`].
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// How long [`ExchangeChannel::read`] waits before failing.
    pub read_timeout: Duration,
    /// Sleep between checks while waiting.
    pub poll_interval: Duration,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Synchronous "send request line, await response line" over a
/// [`LineTransport`].
///
/// Holds at most one pending inbound frame. A frame that arrives while
/// another is still unclaimed is dropped, so a late line can never overwrite
/// the response the caller is waiting for.
///
/// The channel does not serialize callers. One exchange is
/// `pre_read` → `write` → `read`, and callers must not interleave exchanges.
pub struct ExchangeChannel {
    transport: Arc<dyn LineTransport>,
    clock: Arc<dyn Clock>,
    pending: Arc<Mutex<Option<Frame>>>,
    hook_installed: Mutex<bool>,
    config: ExchangeConfig,
}

impl ExchangeChannel {
    /// Create a channel with default configuration.
    pub fn new(transport: Arc<dyn LineTransport>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(transport, clock, ExchangeConfig::default())
    }

    /// Create a channel with explicit configuration.
    pub fn with_config(
        transport: Arc<dyn LineTransport>,
        clock: Arc<dyn Clock>,
        config: ExchangeConfig,
    ) -> Self {
        Self {
            transport,
            clock,
            pending: Arc::new(Mutex::new(None)),
            hook_installed: Mutex::new(false),
            config,
        }
    }

    /// Encode and push a frame to the transport immediately.
    pub fn write(&self, frame: &Frame) -> Result<()> {
        let line = frame.encode();
        debug!(fields = ?frame.fields(), "writing frame");
        self.transport.write_line(&line)?;
        Ok(())
    }

    /// Prepare for a response: install the receive hook on first use and
    /// discard any stale pending frame.
    ///
    /// Must be called immediately before [`write`](Self::write) for each
    /// request.
    pub fn pre_read(&self) -> Result<()> {
        self.install_hook()?;
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        Ok(())
    }

    /// Wait for the pending frame, take it, and return it.
    ///
    /// Returns [`FrameError::ReadTimeout`] when nothing arrives within the
    /// configured read timeout.
    pub fn read(&self) -> Result<Frame> {
        let deadline = self.clock.now() + self.config.read_timeout;
        loop {
            let frame = self
                .pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take();
            if let Some(frame) = frame {
                debug!(fields = ?frame.fields(), "read frame");
                return Ok(frame);
            }

            if self.clock.now() >= deadline {
                return Err(FrameError::ReadTimeout(self.config.read_timeout));
            }
            self.clock.sleep(self.config.poll_interval);
        }
    }

    fn install_hook(&self) -> Result<()> {
        let mut installed = self
            .hook_installed
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if *installed {
            return Ok(());
        }

        let pending = Arc::clone(&self.pending);
        self.transport.on_line_received(Arc::new(move |line: &str| {
            let Some(frame) = Frame::decode(line) else {
                trace!(line = %line.trim_end(), "ignoring non-frame line");
                return;
            };
            let mut slot = pending.lock().unwrap_or_else(|e| e.into_inner());
            if slot.is_none() {
                *slot = Some(frame);
            } else {
                trace!("dropping frame; previous frame still unclaimed");
            }
        }))?;

        *installed = true;
        debug!("frame receive hook installed");
        Ok(())
    }
}

impl std::fmt::Debug for ExchangeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeChannel")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
