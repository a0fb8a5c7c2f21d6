use roboblocks_module::{ModuleError, TokenTimeout};

/// Errors raised while correlating relay traffic.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The relay receive token could not be acquired.
    #[error("relay receive busy: {0}")]
    TokenTimeout(TokenTimeout),

    /// A companion module operation failed.
    #[error(transparent)]
    Module(#[from] ModuleError),
}

impl RelayError {
    /// Stable identifier of this failure.
    pub fn code(&self) -> u16 {
        match self {
            RelayError::TokenTimeout(_) => 100,
            RelayError::Module(err) => err.code(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
