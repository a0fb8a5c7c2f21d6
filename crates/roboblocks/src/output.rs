use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use roboblocks_controller::{ConnectionState, ControllerEvent, ModuleStatus};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct StatusOutput<'a> {
    kind: &'static str,
    device: &'a str,
    #[serde(flatten)]
    status: &'a ModuleStatus,
}

pub fn print_status(device: &str, status: &ModuleStatus, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = StatusOutput {
                kind: "module-status",
                device,
                status,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DEVICE", "WIFI STATUS", "CONNECTED", "BUFFERED"])
                .add_row(vec![
                    device.to_string(),
                    status.wifi_status.to_string(),
                    status.wifi_connected.to_string(),
                    status.buffered_payloads.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Module Status:");
            println!("  Device:           {device}");
            println!("  Wi-Fi status:     {}", status.wifi_status);
            println!("  Wi-Fi connected:  {}", status.wifi_connected);
            println!("  Buffered relay:   {}", status.buffered_payloads);
        }
    }
}

#[derive(Serialize)]
struct EventOutput {
    kind: &'static str,
    event: ControllerEvent,
    state: ConnectionState,
    timestamp: String,
}

/// Print one controller event as it happens. Table output degrades to one
/// line per event, since events stream.
pub fn print_event(event: ControllerEvent, state: ConnectionState, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = EventOutput {
                kind: "controller-event",
                event,
                state,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("event={event} state={state}");
        }
    }
}

/// Outcome of a session.
#[derive(Debug, Default, Serialize)]
pub struct SessionSummary {
    pub sends: usize,
    pub acknowledged: usize,
    pub paired: bool,
    pub final_state: Option<ConnectionState>,
}

pub fn print_summary(summary: &SessionSummary, format: OutputFormat) {
    let final_state = summary
        .final_state
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct Out<'a> {
                kind: &'static str,
                #[serde(flatten)]
                summary: &'a SessionSummary,
            }
            println!(
                "{}",
                serde_json::to_string(&Out {
                    kind: "session-summary",
                    summary,
                })
                .unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SENDS", "ACKNOWLEDGED", "PAIRED", "FINAL STATE"])
                .add_row(vec![
                    summary.sends.to_string(),
                    summary.acknowledged.to_string(),
                    summary.paired.to_string(),
                    final_state,
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Session Summary:");
            println!("  Sends:            {}", summary.sends);
            println!("  Acknowledged:     {}", summary.acknowledged);
            println!("  Paired:           {}", summary.paired);
            println!("  Final state:      {final_state}");
        }
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
