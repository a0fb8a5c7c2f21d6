use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::trace;

/// Notification points a caller can attach a handler to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerEvent {
    WifiConnected,
    WifiConnectFailed,
    WifiDisconnected,
    LoginSucceeded,
    LoginFailed,
    LoggedOut,
    /// A remote peer paired with this device.
    Paired,
    /// The remote peer went away, or this device unpaired.
    Unpaired,
}

impl ControllerEvent {
    pub const ALL: [ControllerEvent; 8] = [
        ControllerEvent::WifiConnected,
        ControllerEvent::WifiConnectFailed,
        ControllerEvent::WifiDisconnected,
        ControllerEvent::LoginSucceeded,
        ControllerEvent::LoginFailed,
        ControllerEvent::LoggedOut,
        ControllerEvent::Paired,
        ControllerEvent::Unpaired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerEvent::WifiConnected => "wifi_connected",
            ControllerEvent::WifiConnectFailed => "wifi_connect_failed",
            ControllerEvent::WifiDisconnected => "wifi_disconnected",
            ControllerEvent::LoginSucceeded => "login_succeeded",
            ControllerEvent::LoginFailed => "login_failed",
            ControllerEvent::LoggedOut => "logged_out",
            ControllerEvent::Paired => "paired",
            ControllerEvent::Unpaired => "unpaired",
        }
    }
}

impl fmt::Display for ControllerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handler attached to a [`ControllerEvent`].
pub type EventHandler = Arc<dyn Fn() + Send + Sync>;

/// One optional handler per event. A missing handler is not an error.
#[derive(Default)]
pub struct Handlers {
    table: Mutex<HashMap<ControllerEvent, EventHandler>>,
}

impl Handlers {
    /// Attach `handler` to `event`, replacing any previous handler.
    pub fn set(&self, event: ControllerEvent, handler: EventHandler) {
        self.table
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(event, handler);
    }

    pub fn clear(&self, event: ControllerEvent) {
        self.table
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&event);
    }

    /// Run the handler for `event`, if any. The table is not locked while
    /// the handler runs, so handlers may register other handlers.
    pub fn fire(&self, event: ControllerEvent) {
        let handler = self
            .table
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&event)
            .cloned();
        if let Some(handler) = handler {
            trace!(%event, "invoking handler");
            handler();
        }
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        let mut registered: Vec<_> = table.keys().map(ControllerEvent::as_str).collect();
        registered.sort_unstable();
        f.debug_struct("Handlers")
            .field("registered", &registered)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn fire_without_handler_is_silent() {
        Handlers::default().fire(ControllerEvent::LoginFailed);
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let handlers = Handlers::default();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&first);
        handlers.set(
            ControllerEvent::Paired,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let counter = Arc::clone(&second);
        handlers.set(
            ControllerEvent::Paired,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        handlers.fire(ControllerEvent::Paired);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        handlers.clear(ControllerEvent::Paired);
        handlers.fire(ControllerEvent::Paired);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_may_reregister() {
        let handlers = Arc::new(Handlers::default());
        let inner = Arc::clone(&handlers);
        handlers.set(
            ControllerEvent::LoggedOut,
            Arc::new(move || inner.clear(ControllerEvent::LoggedOut)),
        );
        handlers.fire(ControllerEvent::LoggedOut);
        assert!(format!("{handlers:?}").contains("registered: []"));
    }
}
