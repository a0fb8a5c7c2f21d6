use std::fs::OpenOptions;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use bytes::BytesMut;
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::{LineHandler, LineTransport};

/// Default upper bound for an unterminated line held in the receive buffer.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

const READ_CHUNK_SIZE: usize = 256;

/// Configuration for a [`SerialLink`].
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Maximum bytes buffered while waiting for a line terminator. Input past
    /// this bound is discarded.
    pub max_line_length: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

type SharedHandler = Arc<Mutex<Option<LineHandler>>>;

/// Serial link to the companion module.
///
/// Wraps a tty device (or any `Read`/`Write` pair). Received bytes are split
/// into `\n`-terminated lines on a dedicated reader thread, which starts the
/// first time a line handler is registered.
pub struct SerialLink {
    writer: Mutex<Box<dyn Write + Send>>,
    reader: Mutex<Option<Box<dyn Read + Send>>>,
    handler: SharedHandler,
    config: LinkConfig,
}

impl SerialLink {
    /// Open a serial device (or any readable and writable file).
    ///
    /// Baud rate and pin routing are expected to be configured already.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| TransportError::Open {
                path: path.to_path_buf(),
                source: e,
            })?;
        let reader = file.try_clone().map_err(|e| TransportError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!(?path, "opened serial link");
        Ok(Self::from_parts(reader, file))
    }

    /// Build a link from separate read and write halves.
    pub fn from_parts(
        reader: impl Read + Send + 'static,
        writer: impl Write + Send + 'static,
    ) -> Self {
        Self::with_config(reader, writer, LinkConfig::default())
    }

    /// Build a link with explicit configuration.
    pub fn with_config(
        reader: impl Read + Send + 'static,
        writer: impl Write + Send + 'static,
        config: LinkConfig,
    ) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
            reader: Mutex::new(Some(Box::new(reader))),
            handler: Arc::new(Mutex::new(None)),
            config,
        }
    }

    /// Current link configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    fn start_reader(&self) -> Result<()> {
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(reader) = reader else {
            return Ok(());
        };

        let handler = Arc::clone(&self.handler);
        let max_line_length = self.config.max_line_length;
        std::thread::Builder::new()
            .name("roboblocks-serial-rx".to_string())
            .spawn(move || read_lines(reader, handler, max_line_length))?;
        debug!("serial reader thread started");
        Ok(())
    }
}

impl LineTransport for SerialLink {
    fn write_line(&self, line: &str) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let bytes = line.as_bytes();

        let mut offset = 0usize;
        while offset < bytes.len() {
            match writer.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        loop {
            match writer.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn on_line_received(&self, handler: LineHandler) -> Result<()> {
        *self.handler.lock().unwrap_or_else(|e| e.into_inner()) = Some(handler);
        self.start_reader()
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn read_lines(mut reader: Box<dyn Read + Send>, handler: SharedHandler, max_line_length: usize) {
    let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        let read = match reader.read(&mut chunk) {
            Ok(n) => n,
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
                ) =>
            {
                continue
            }
            Err(err) => {
                warn!(error = %err, "serial read failed; reader stopping");
                return;
            }
        };

        if read == 0 {
            debug!("serial link closed");
            return;
        }

        buf.extend_from_slice(&chunk[..read]);

        while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
            let line = buf.split_to(pos + 1);
            dispatch(&handler, &String::from_utf8_lossy(&line));
        }

        if buf.len() > max_line_length {
            warn!(
                size = buf.len(),
                max = max_line_length,
                "discarding unterminated serial input"
            );
            buf.clear();
        }
    }
}

fn dispatch(handler: &SharedHandler, line: &str) {
    let current = handler.lock().unwrap_or_else(|e| e.into_inner()).clone();
    if let Some(handler) = current {
        handler(line);
    }
}
