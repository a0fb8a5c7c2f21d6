use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use roboblocks_controller::{
    ConnectionState, Controller, ControllerConfig, ControllerError, ControllerEvent, FatalHook,
};
use roboblocks_transport::{Clock, SerialLink, SystemClock};
use tracing::{info, warn};

use crate::cmd::{parse_duration, SessionArgs};
use crate::exit::{
    controller_error, driver_error, io_error, transport_error, CliError, CliResult, FAILURE,
    INTERNAL, SUCCESS, TIMEOUT,
};
use crate::output::{print_event, print_summary, OutputFormat, SessionSummary};

const WAIT_POLL: Duration = Duration::from_millis(20);

/// What a session connects to and sends.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub ssid: String,
    pub password: String,
    pub room: String,
    pub room_pass: String,
    pub user: String,
    pub values: Vec<(String, f64)>,
    pub every: Duration,
    pub count: Option<usize>,
}

pub fn run(args: SessionArgs, format: OutputFormat, config: ControllerConfig) -> CliResult<i32> {
    let every = parse_duration(&args.telemetry.every)?;
    let link = SerialLink::open(&args.device)
        .map_err(|err| transport_error("open companion module", err))?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let controller = Arc::new(Controller::with_config(Arc::new(link), clock, config));

    let plan = SessionPlan {
        ssid: args.ssid,
        password: args.password,
        room: args.room,
        room_pass: args.room_pass,
        user: args.user,
        values: args.telemetry.values,
        every,
        count: args.telemetry.count,
    };

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    drive(&controller, &plan, format, &running, || {})
}

/// Run a full session on `controller` with the background driver attached.
///
/// `after_login` runs once the relay accepted the login.
pub fn drive(
    controller: &Arc<Controller>,
    plan: &SessionPlan,
    format: OutputFormat,
    running: &Arc<AtomicBool>,
    after_login: impl FnOnce(),
) -> CliResult<i32> {
    for event in ControllerEvent::ALL {
        let observer = Arc::downgrade(controller);
        controller.on(event, move || {
            if let Some(controller) = observer.upgrade() {
                print_event(event, controller.state(), format);
            }
        });
    }

    let fatal: Arc<Mutex<Option<CliError>>> = Arc::new(Mutex::new(None));
    let hook: FatalHook = {
        let fatal = Arc::clone(&fatal);
        let running = Arc::clone(running);
        Arc::new(move |err: &ControllerError| {
            *fatal.lock().unwrap_or_else(|e| e.into_inner()) = Some(driver_error(err));
            running.store(false, Ordering::SeqCst);
        })
    };

    let driver = controller
        .spawn_driver(Some(hook))
        .map_err(|err| io_error("spawn controller driver", err))?;
    let result = run_plan(controller, plan, running, after_login);
    driver.stop();

    for event in ControllerEvent::ALL {
        controller.clear_handler(event);
    }

    if let Some(err) = fatal.lock().unwrap_or_else(|e| e.into_inner()).take() {
        return Err(err);
    }

    let summary = result?;
    print_summary(&summary, format);
    Ok(SUCCESS)
}

fn run_plan(
    controller: &Controller,
    plan: &SessionPlan,
    running: &AtomicBool,
    after_login: impl FnOnce(),
) -> CliResult<SessionSummary> {
    let mut summary = SessionSummary::default();

    controller
        .connect_wifi(&plan.ssid, &plan.password)
        .map_err(|err| controller_error("connect Wi-Fi", err))?;
    info!(ssid = %plan.ssid, "waiting for Wi-Fi association");

    loop {
        if !running.load(Ordering::SeqCst) {
            summary.final_state = Some(controller.state());
            return Ok(summary);
        }
        match controller.state() {
            ConnectionState::WifiConnected => break,
            ConnectionState::WifiDisconnected => {
                return Err(CliError::new(
                    TIMEOUT,
                    format!("Wi-Fi association with '{}' timed out", plan.ssid),
                ));
            }
            _ => thread::sleep(WAIT_POLL),
        }
    }

    let logged_in = controller
        .connect_server(&plan.room, &plan.room_pass, &plan.user)
        .map_err(|err| controller_error("relay login", err))?;
    if !logged_in {
        return Err(CliError::new(
            FAILURE,
            format!("relay login to room '{}' failed", plan.room),
        ));
    }
    after_login();

    while running.load(Ordering::SeqCst) {
        if controller.state() != ConnectionState::ServerConnected {
            warn!(state = %controller.state(), "relay session ended");
            break;
        }

        for (key, value) in &plan.values {
            controller.set_value(key, *value);
        }
        let acknowledged = controller
            .send_value()
            .map_err(|err| controller_error("send telemetry", err))?;
        summary.sends += 1;
        if acknowledged {
            summary.acknowledged += 1;
        }

        if plan.count.is_some_and(|count| summary.sends >= count) {
            break;
        }
        sleep_while_running(running, plan.every);
    }

    summary.paired = controller.is_paired();
    controller
        .server_disconnect()
        .map_err(|err| controller_error("relay logout", err))?;
    summary.final_state = Some(controller.state());
    Ok(summary)
}

fn sleep_while_running(running: &AtomicBool, duration: Duration) {
    let start = Instant::now();
    while running.load(Ordering::SeqCst) {
        let elapsed = start.elapsed();
        if elapsed >= duration {
            break;
        }
        thread::sleep((duration - elapsed).min(WAIT_POLL));
    }
}

pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
