//! Connection controller for the Wi-Fi companion module.
//!
//! [`Controller`] walks the link through four states:
//!
//! ```text
//! WifiDisconnected --connect_wifi--> WifiConnecting --tick--> WifiConnected
//!        ^                                 |                      |  ^
//!        +------------ timeout / lost -----+        connect_server|  |server_disconnect
//!                                                                 v  |
//!                                                           ServerConnected
//! ```
//!
//! Foreground calls trigger transitions; the background driver advances the
//! connecting timeout, watches for lost association and drains relay
//! traffic while logged in. Handlers registered per [`ControllerEvent`] are
//! the notification channel for every soft outcome.

pub mod config;
pub mod controller;
pub mod driver;
pub mod error;
pub mod events;
pub mod sim;
pub mod state;
pub mod telemetry;

pub use config::{ControllerConfig, DEFAULT_DEVICE_TYPE, DEFAULT_RELAY_URL};
pub use controller::{Controller, ModuleStatus};
pub use driver::{DriverHandle, FatalHook};
pub use error::{ControllerError, Result};
pub use events::{ControllerEvent, EventHandler, Handlers};
pub use sim::SimulatedModule;
pub use state::ConnectionState;
pub use telemetry::{format_number, CustomValue, Telemetry};
