use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use roboblocks_controller::{Controller, ControllerConfig, SimulatedModule};
use roboblocks_transport::{Clock, SystemClock};
use tracing::info;

use crate::cmd::session::{drive, install_ctrlc_handler, SessionPlan};
use crate::cmd::{parse_duration, DemoArgs};
use crate::exit::CliResult;
use crate::output::OutputFormat;

const DEMO_SENDS: usize = 3;

pub fn run(args: DemoArgs, format: OutputFormat, config: ControllerConfig) -> CliResult<i32> {
    let every = parse_duration(&args.telemetry.every)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let sim = Arc::new(SimulatedModule::new(Arc::clone(&clock)));
    if let Some(code) = args.reject_login.as_deref() {
        sim.set_login_result(Some(code));
    }

    let controller = Arc::new(Controller::with_config(sim.transport(), clock, config));

    let values = if args.telemetry.values.is_empty() {
        vec![("temp".to_string(), 21.0), ("brightness".to_string(), 128.0)]
    } else {
        args.telemetry.values
    };
    let plan = SessionPlan {
        ssid: "demo-network".to_string(),
        password: "demo-password".to_string(),
        room: "demo-room".to_string(),
        room_pass: "demo-pass".to_string(),
        user: "demo".to_string(),
        values,
        every,
        count: Some(args.telemetry.count.unwrap_or(DEMO_SENDS)),
    };

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    info!(pair = args.pair, "running against simulated companion module");
    let pair = args.pair;
    drive(&controller, &plan, format, &running, || {
        if pair {
            sim.pair_peer();
        }
    })
}
