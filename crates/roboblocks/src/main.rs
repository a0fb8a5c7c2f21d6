mod cmd;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "roboblocks",
    version,
    about = "Companion module Wi-Fi and relay CLI"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// Controller configuration file (JSON).
    #[arg(long, value_name = "FILE", env = "ROBOBLOCKS_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::load_config(cli.config.as_deref())
        .and_then(|config| cmd::run(cli.command, format, config));

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_session_subcommand() {
        let cli = Cli::try_parse_from([
            "roboblocks",
            "session",
            "/dev/ttyUSB0",
            "--ssid",
            "lab",
            "--password",
            "secret",
            "--room",
            "class-3b",
            "--room-pass",
            "1234",
            "--user",
            "alice",
            "--value",
            "temp=21.5",
            "--value",
            "light=3",
            "--count",
            "2",
        ])
        .expect("session args should parse");

        let Command::Session(args) = cli.command else {
            panic!("expected session command");
        };
        assert_eq!(args.room, "class-3b");
        assert_eq!(
            args.telemetry.values,
            vec![("temp".to_string(), 21.5), ("light".to_string(), 3.0)]
        );
        assert_eq!(args.telemetry.count, Some(2));
        assert_eq!(args.telemetry.every, "1s");
    }

    #[test]
    fn parses_demo_subcommand() {
        let cli = Cli::try_parse_from(["roboblocks", "demo", "--pair", "--reject-login", "001"])
            .expect("demo args should parse");
        let Command::Demo(args) = cli.command else {
            panic!("expected demo command");
        };
        assert!(args.pair);
        assert_eq!(args.reject_login.as_deref(), Some("001"));
    }

    #[test]
    fn parses_status_with_global_config() {
        let cli = Cli::try_parse_from([
            "roboblocks",
            "status",
            "/dev/ttyUSB0",
            "--config",
            "/etc/roboblocks.json",
        ])
        .expect("status args should parse");
        assert!(matches!(cli.command, Command::Status(_)));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/roboblocks.json")));
    }

    #[test]
    fn rejects_malformed_telemetry_value() {
        let err = Cli::try_parse_from(["roboblocks", "demo", "--value", "temp"])
            .expect_err("malformed value should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
