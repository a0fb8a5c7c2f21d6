use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use roboblocks_transport::Clock;
use tracing::{debug, error};

use crate::controller::Controller;
use crate::error::ControllerError;

/// Upper bound on how long the driver sleeps before re-checking its stop
/// flag.
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Called once when the driver stops on a fatal error.
pub type FatalHook = Arc<dyn Fn(&ControllerError) + Send + Sync>;

/// Handle to a running background driver.
///
/// Dropping the handle stops the driver and waits for it to exit.
pub struct DriverHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DriverHandle {
    /// Stop the driver and wait for its thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    /// Whether the driver thread has exited (stopped or failed).
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("controller driver panicked");
            }
        }
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for DriverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverHandle")
            .field("stopping", &self.stop.load(Ordering::SeqCst))
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl Controller {
    /// Run [`tick`](Controller::tick) on a background thread every
    /// `driver_interval`.
    ///
    /// The first fatal error stops the driver; it is logged and passed to
    /// `fatal_hook`.
    pub fn spawn_driver(
        self: &Arc<Self>,
        fatal_hook: Option<FatalHook>,
    ) -> io::Result<DriverHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let controller = Arc::clone(self);
        let flag = Arc::clone(&stop);
        let clock = self.clock();
        let interval = self.config().driver_interval();

        let thread = thread::Builder::new()
            .name("roboblocks-driver".to_string())
            .spawn(move || {
                debug!(?interval, "controller driver started");
                while !flag.load(Ordering::SeqCst) {
                    if let Err(err) = controller.tick() {
                        error!(code = err.code(), error = %err, "controller driver stopped");
                        if let Some(hook) = &fatal_hook {
                            hook(&err);
                        }
                        return;
                    }
                    pause(clock.as_ref(), &flag, interval);
                }
                debug!("controller driver stopped");
            })?;

        Ok(DriverHandle {
            stop,
            thread: Some(thread),
        })
    }
}

fn pause(clock: &dyn Clock, stop: &AtomicBool, interval: Duration) {
    let deadline = clock.now() + interval;
    while !stop.load(Ordering::SeqCst) {
        let now = clock.now();
        if now >= deadline {
            break;
        }
        clock.sleep((deadline - now).min(STOP_CHECK_INTERVAL));
    }
}
