use crate::opcode::Opcode;
use crate::token::TokenTimeout;

/// Errors raised by companion module operations.
///
/// Every variant is a protocol or hardware contract violation with no
/// defined recovery; [`code`](ModuleError::code) gives its stable identifier.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    /// The serial exchange token could not be acquired.
    #[error("companion module busy: {0}")]
    TokenTimeout(#[from] TokenTimeout),

    /// Frame exchange failed (read timeout or transport failure).
    #[error(transparent)]
    Frame(#[from] roboblocks_frame::FrameError),

    /// The response had the wrong number of fields.
    #[error("{op} response has {actual} fields (expected {expected})")]
    FieldCount {
        op: Opcode,
        expected: usize,
        actual: usize,
    },

    /// The response outcome marker was neither success nor a known alternate.
    #[error("{op} response outcome '{outcome}' not recognized")]
    Outcome { op: Opcode, outcome: String },

    /// `ws_receive` reported a payload but the response had the wrong shape.
    #[error("ws_receive payload response has {actual} fields (expected 3)")]
    ReceiveFieldCount { actual: usize },

    /// A numeric response field did not parse.
    #[error("{op} returned non-numeric value '{value}'")]
    InvalidNumber { op: Opcode, value: String },
}

impl ModuleError {
    /// Stable identifier of this failure.
    pub fn code(&self) -> u16 {
        match self {
            ModuleError::TokenTimeout(_) => 101,
            ModuleError::Frame(err) => err.code(),
            ModuleError::FieldCount { op, .. } => op.field_count_code(),
            ModuleError::Outcome { op, .. } => op.outcome_code(),
            ModuleError::ReceiveFieldCount { .. } => 20,
            ModuleError::InvalidNumber { .. } => 21,
        }
    }
}

pub type Result<T> = std::result::Result<T, ModuleError>;
