use roboblocks_module::ModuleError;
use roboblocks_relay::RelayError;

/// Fatal controller errors.
///
/// Soft outcomes (Wi-Fi timeout, rejected login, missing ACK) are reported
/// through state transitions and handlers, never through this type.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl ControllerError {
    /// Stable identifier of this failure.
    pub fn code(&self) -> u16 {
        match self {
            ControllerError::Module(err) => err.code(),
            ControllerError::Relay(err) => err.code(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ControllerError>;
