use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

use roboblocks_controller::ControllerConfig;

use crate::exit::{io_error, CliError, CliResult, DATA_INVALID, USAGE};
use crate::output::OutputFormat;

pub mod demo;
pub mod session;
pub mod status;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Query the companion module's Wi-Fi and relay buffer status.
    Status(StatusArgs),
    /// Connect, log in to a relay room and send telemetry until stopped.
    Session(SessionArgs),
    /// Run a session against the built-in simulated companion module.
    Demo(DemoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, config: ControllerConfig) -> CliResult<i32> {
    match command {
        Command::Status(args) => status::run(args, format, config),
        Command::Session(args) => session::run(args, format, config),
        Command::Demo(args) => demo::run(args, format, config),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Serial device of the companion module (e.g. /dev/ttyUSB0).
    pub device: PathBuf,
}

/// Telemetry options shared by `session` and `demo`.
#[derive(Args, Debug)]
pub struct TelemetryArgs {
    /// Telemetry value to send, as KEY=NUMBER (repeatable).
    #[arg(long = "value", value_name = "KEY=NUMBER", value_parser = parse_value)]
    pub values: Vec<(String, f64)>,
    /// Interval between telemetry sends (e.g. 2s, 500ms).
    #[arg(long, default_value = "1s")]
    pub every: String,
    /// Stop after N sends.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Serial device of the companion module (e.g. /dev/ttyUSB0).
    pub device: PathBuf,
    /// Wireless network name.
    #[arg(long, env = "ROBOBLOCKS_SSID")]
    pub ssid: String,
    /// Wireless network password.
    #[arg(long, env = "ROBOBLOCKS_WIFI_PASSWORD", hide_env_values = true)]
    pub password: String,
    /// Relay room name.
    #[arg(long)]
    pub room: String,
    /// Relay room password.
    #[arg(long, env = "ROBOBLOCKS_ROOM_PASS", hide_env_values = true)]
    pub room_pass: String,
    /// User name announced to the relay.
    #[arg(long)]
    pub user: String,
    #[command(flatten)]
    pub telemetry: TelemetryArgs,
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Simulate a remote peer pairing after login.
    #[arg(long)]
    pub pair: bool,
    /// Make the simulated relay reject the login with this result code.
    #[arg(long, value_name = "CODE")]
    pub reject_login: Option<String>,
    #[command(flatten)]
    pub telemetry: TelemetryArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Load controller configuration from an optional JSON file.
pub fn load_config(path: Option<&Path>) -> CliResult<ControllerConfig> {
    let Some(path) = path else {
        return Ok(ControllerConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|err| io_error(&format!("read config {}", path.display()), err))?;
    serde_json::from_str(&text).map_err(|err| {
        CliError::new(
            DATA_INVALID,
            format!("invalid config {}: {err}", path.display()),
        )
    })
}

fn parse_value(input: &str) -> Result<(String, f64), String> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=NUMBER, got '{input}'"))?;
    if key.is_empty() {
        return Err("telemetry key must not be empty".to_string());
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid number '{value}' for key '{key}'"))?;
    Ok((key.to_string(), value))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn parse_value_accepts_key_number() {
        assert_eq!(parse_value("temp=21.5").unwrap(), ("temp".to_string(), 21.5));
        assert_eq!(parse_value("accX=-3").unwrap(), ("accX".to_string(), -3.0));
    }

    #[test]
    fn parse_value_rejects_malformed() {
        assert!(parse_value("temp").is_err());
        assert!(parse_value("=1").is_err());
        assert!(parse_value("temp=warm").is_err());
    }

    #[test]
    fn missing_config_path_uses_defaults() {
        assert_eq!(load_config(None).unwrap(), ControllerConfig::default());
    }

    #[test]
    fn config_file_overrides_named_fields() {
        let path = std::env::temp_dir().join(format!(
            "roboblocks-config-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{ "device_type": "bench", "driver_interval_ms": 50 }"#)
            .expect("config should be writable");

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.device_type, "bench");
        assert_eq!(config.driver_interval(), Duration::from_millis(50));
        assert_eq!(config.message_timeout(), Duration::from_secs(5));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn invalid_config_is_data_invalid() {
        let path = std::env::temp_dir().join(format!(
            "roboblocks-bad-config-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, "{ not json").expect("config should be writable");

        let err = load_config(Some(&path)).unwrap_err();
        assert_eq!(err.code, DATA_INVALID);

        let _ = std::fs::remove_file(path);
    }
}
