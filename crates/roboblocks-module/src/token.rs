use std::sync::{Arc, Mutex};
use std::time::Duration;

use roboblocks_transport::Clock;
use tracing::trace;

/// Acquiring an [`ExchangeToken`] did not succeed before the timeout.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{name} token not acquired within {waited:?}")]
pub struct TokenTimeout {
    /// Name of the token that could not be acquired.
    pub name: &'static str,
    /// The timeout that elapsed.
    pub waited: Duration,
}

/// Single-holder mutual exclusion with a bounded acquire.
///
/// Each shared resource gets its own token: one serializes request/response
/// exchanges on the serial link, another serializes relay receive
/// correlation. The two are independent and may be held at the same time by
/// different call paths.
///
/// Waiters poll at a fixed interval through the [`Clock`], so a virtual
/// clock drives timeouts deterministically.
pub struct ExchangeToken {
    name: &'static str,
    held: Mutex<bool>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
}

impl ExchangeToken {
    pub fn new(name: &'static str, clock: Arc<dyn Clock>, poll_interval: Duration) -> Self {
        Self {
            name,
            held: Mutex::new(false),
            clock,
            poll_interval,
        }
    }

    /// Take the token, waiting up to `timeout` for the current holder to
    /// release it. The token is released when the returned guard drops.
    pub fn acquire(&self, timeout: Duration) -> Result<TokenGuard<'_>, TokenTimeout> {
        let deadline = self.clock.now() + timeout;
        loop {
            if self.try_take() {
                trace!(token = self.name, "token acquired");
                return Ok(TokenGuard { token: self });
            }

            if self.clock.now() >= deadline {
                return Err(TokenTimeout {
                    name: self.name,
                    waited: timeout,
                });
            }
            self.clock.sleep(self.poll_interval);
        }
    }

    /// Whether some caller currently holds the token.
    pub fn is_held(&self) -> bool {
        *self.held.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn try_take(&self) -> bool {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        if *held {
            return false;
        }
        *held = true;
        true
    }

    fn release(&self) {
        *self.held.lock().unwrap_or_else(|e| e.into_inner()) = false;
        trace!(token = self.name, "token released");
    }
}

impl std::fmt::Debug for ExchangeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeToken")
            .field("name", &self.name)
            .field("held", &self.is_held())
            .finish()
    }
}

/// Proof of holding an [`ExchangeToken`]; releases it on drop.
#[must_use = "the token is released as soon as the guard is dropped"]
pub struct TokenGuard<'a> {
    token: &'a ExchangeToken,
}

impl std::fmt::Debug for TokenGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGuard")
            .field("token", &self.token.name)
            .finish()
    }
}

impl Drop for TokenGuard<'_> {
    fn drop(&mut self) {
        self.token.release();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use roboblocks_transport::{ManualClock, SystemClock};

    use super::*;

    fn token() -> Arc<ExchangeToken> {
        Arc::new(ExchangeToken::new(
            "test",
            Arc::new(SystemClock::new()),
            Duration::from_millis(1),
        ))
    }

    #[test]
    fn guard_releases_on_drop() {
        let token = token();
        {
            let _guard = token.acquire(Duration::from_millis(10)).unwrap();
            assert!(token.is_held());
        }
        assert!(!token.is_held());
        assert!(token.acquire(Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn acquire_times_out_while_held() {
        let token = token();
        let _guard = token.acquire(Duration::from_millis(10)).unwrap();

        let err = token.acquire(Duration::from_millis(30)).unwrap_err();
        assert_eq!(err.name, "test");
        assert_eq!(err.waited, Duration::from_millis(30));
    }

    #[test]
    fn guard_debug_names_its_token() {
        let token = token();
        let guard = token.acquire(Duration::from_millis(10)).unwrap();
        assert_eq!(format!("{guard:?}"), r#"TokenGuard { token: "test" }"#);
    }

    #[test]
    fn manual_clock_drives_timeout() {
        let clock = Arc::new(ManualClock::new());
        let token = ExchangeToken::new("virtual", clock.clone(), Duration::from_millis(1));
        let _guard = token.acquire(Duration::ZERO).unwrap();

        assert!(token.acquire(Duration::from_secs(30)).is_err());
        assert!(clock.now() >= Duration::from_secs(30));
    }

    #[test]
    fn waiter_proceeds_after_release() {
        let token = token();
        let guard = token.acquire(Duration::from_millis(10)).unwrap();

        let waiter = {
            let token = Arc::clone(&token);
            thread::spawn(move || token.acquire(Duration::from_secs(5)).map(|_| ()))
        };

        thread::sleep(Duration::from_millis(20));
        drop(guard);

        assert!(waiter.join().unwrap().is_ok());
    }

    #[test]
    fn holders_never_overlap() {
        let token = token();
        let inside = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let token = Arc::clone(&token);
                let inside = Arc::clone(&inside);
                let overlaps = Arc::clone(&overlaps);
                thread::spawn(move || {
                    for _ in 0..25 {
                        let _guard = token.acquire(Duration::from_secs(5)).unwrap();
                        if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                            overlaps.fetch_add(1, Ordering::SeqCst);
                        }
                        thread::sleep(Duration::from_micros(100));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }
}
