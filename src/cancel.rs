//! Cooperative cancellation.
//!
//! The sort engine polls a [`CancelToken`] at the top of every scan and
//! search iteration, never mid-rotation, so a rotation in flight always
//! completes before an abort is observed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cloneable, atomically-readable abort flag.
/// Setting it is the only external mutation the engine permits.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(unix)]
static SIGNAL_TOKEN: std::sync::OnceLock<CancelToken> = std::sync::OnceLock::new();

#[cfg(unix)]
extern "C" fn on_signal(_sig: libc::c_int) {
    // Atomic store through a pre-registered Arc; async-signal-safe.
    if let Some(token) = SIGNAL_TOKEN.get() {
        token.cancel();
    }
}

/// Route SIGINT and SIGTERM to the given token.
/// Only the first registration in a process takes effect.
#[cfg(unix)]
pub fn cancel_on_signals(token: &CancelToken) {
    if SIGNAL_TOKEN.set(token.clone()).is_ok() {
        let handler = on_signal as extern "C" fn(libc::c_int);
        unsafe {
            libc::signal(libc::SIGINT, handler as libc::sighandler_t);
            libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
        }
    }
}

#[cfg(not(unix))]
pub fn cancel_on_signals(_token: &CancelToken) {}
