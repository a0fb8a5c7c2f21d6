use std::fmt;
use std::io;

use roboblocks_controller::ControllerError;
use roboblocks_frame::FrameError;
use roboblocks_module::ModuleError;
use roboblocks_relay::RelayError;
use roboblocks_transport::TransportError;

// Process exit codes. Timeouts use 124 like timeout(1).
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::BrokenPipe => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Open { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    let fatal = err.code();
    match err {
        FrameError::Transport(err) => transport_error(context, err),
        FrameError::ReadTimeout(_) => {
            CliError::new(TIMEOUT, format!("{context}: [fatal {fatal}] {err}"))
        }
    }
}

/// Map a companion module failure. Contract violations carry their stable
/// identifier in the message.
pub fn module_error(context: &str, err: ModuleError) -> CliError {
    let fatal = err.code();
    match err {
        ModuleError::Frame(err) => frame_error(context, err),
        ModuleError::TokenTimeout(_) => {
            CliError::new(TIMEOUT, format!("{context}: [fatal {fatal}] {err}"))
        }
        other => CliError::new(DATA_INVALID, format!("{context}: [fatal {fatal}] {other}")),
    }
}

pub fn relay_error(context: &str, err: RelayError) -> CliError {
    let fatal = err.code();
    match err {
        RelayError::Module(err) => module_error(context, err),
        other => CliError::new(TIMEOUT, format!("{context}: [fatal {fatal}] {other}")),
    }
}

/// Exit code for a stable fatal identifier.
pub fn fatal_exit_code(fatal: u16) -> i32 {
    match fatal {
        100..=102 => TIMEOUT,
        103 => TRANSPORT_ERROR,
        _ => DATA_INVALID,
    }
}

/// Error reported by the background driver, which only lends out a
/// reference.
pub fn driver_error(err: &ControllerError) -> CliError {
    let fatal = err.code();
    CliError::new(
        fatal_exit_code(fatal),
        format!("controller driver: [fatal {fatal}] {err}"),
    )
}

pub fn controller_error(context: &str, err: ControllerError) -> CliError {
    match err {
        ControllerError::Module(err) => module_error(context, err),
        ControllerError::Relay(err) => relay_error(context, err),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use roboblocks_module::{Opcode, TokenTimeout};

    use super::*;

    #[test]
    fn missing_device_is_transport_error() {
        let err = TransportError::Open {
            path: "/dev/ttyNOPE".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(transport_error("open", err).code, TRANSPORT_ERROR);
    }

    #[test]
    fn read_timeout_reports_fatal_identifier() {
        let err = ModuleError::Frame(FrameError::ReadTimeout(Duration::from_secs(60)));
        let cli = module_error("wifi_status", err);
        assert_eq!(cli.code, TIMEOUT);
        assert!(cli.message.contains("[fatal 102]"));
    }

    #[test]
    fn shape_violation_is_data_invalid() {
        let err = ModuleError::FieldCount {
            op: Opcode::WsSend,
            expected: 1,
            actual: 2,
        };
        let cli = controller_error("send", ControllerError::Module(err));
        assert_eq!(cli.code, DATA_INVALID);
        assert!(cli.message.contains("[fatal 14]"));
    }

    #[test]
    fn fatal_identifiers_map_to_exit_codes() {
        assert_eq!(fatal_exit_code(0), DATA_INVALID);
        assert_eq!(fatal_exit_code(20), DATA_INVALID);
        assert_eq!(fatal_exit_code(100), TIMEOUT);
        assert_eq!(fatal_exit_code(102), TIMEOUT);
        assert_eq!(fatal_exit_code(103), TRANSPORT_ERROR);
    }

    #[test]
    fn relay_token_timeout() {
        let err = RelayError::TokenTimeout(TokenTimeout {
            name: "relay receive",
            waited: Duration::from_secs(30),
        });
        let cli = relay_error("poll", err);
        assert_eq!(cli.code, TIMEOUT);
        assert!(cli.message.contains("[fatal 100]"));
    }
}
