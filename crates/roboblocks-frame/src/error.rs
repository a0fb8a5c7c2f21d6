use std::time::Duration;

/// Errors that can occur while exchanging frames with the companion module.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// No response frame arrived within the read timeout.
    #[error("no response frame within {0:?}")]
    ReadTimeout(Duration),

    /// The byte transport failed.
    #[error("frame transport error: {0}")]
    Transport(#[from] roboblocks_transport::TransportError),
}

impl FrameError {
    /// Stable identifier of this failure.
    pub fn code(&self) -> u16 {
        match self {
            FrameError::ReadTimeout(_) => 102,
            FrameError::Transport(_) => 103,
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
