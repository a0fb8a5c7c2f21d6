use std::sync::Arc;

use roboblocks_controller::{ControllerConfig, ModuleStatus};
use roboblocks_module::ModuleClient;
use roboblocks_transport::{SerialLink, SystemClock};

use crate::cmd::StatusArgs;
use crate::exit::{module_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_status, OutputFormat};

pub fn run(args: StatusArgs, format: OutputFormat, config: ControllerConfig) -> CliResult<i32> {
    let link = SerialLink::open(&args.device)
        .map_err(|err| transport_error("open companion module", err))?;
    let client = ModuleClient::with_config(
        Arc::new(link),
        Arc::new(SystemClock::new()),
        config.module,
    );

    let status = ModuleStatus {
        wifi_status: client
            .wifi_status()
            .map_err(|err| module_error("wifi_status", err))?,
        wifi_connected: client
            .wifi_is_connected()
            .map_err(|err| module_error("wifi_isconnected", err))?,
        buffered_payloads: client
            .ws_received_count()
            .map_err(|err| module_error("ws_receivedcount", err))?,
    };

    print_status(&args.device.display().to_string(), &status, format);
    Ok(SUCCESS)
}
