//! # Fatal Faults
//!
//! Integrity faults are invariant violations that must stop the console: a
//! vehicle control device never keeps running once it has seen one.
//!
//! A [`Fault`] is created where the violation is detected (usually through
//! [`ensure_invariant!`](crate::ensure_invariant)) and travels up as an ordinary
//! `Err`. The periodic task that receives it hands it to [`Halt::halt`], which
//! logs the full diagnostic and stops all scheduled work. Nothing restarts
//! automatically; recovering requires a power cycle.
//!
//! ```
//! use tank_controls::fault::{halt_channel, Fault};
//!
//! let (halt, _monitor) = halt_channel();
//! assert!(!halt.is_halted());
//!
//! halt.halt(Fault::new("stored == intended", "config image mismatch"));
//! assert!(halt.is_halted());
//! ```

use std::panic::Location;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::error;

/// An unrecoverable invariant violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("integrity fault at {location}: {message} (assertion `{assertion}` failed)")]
pub struct Fault {
    /// Source text of the violated assertion.
    pub assertion: &'static str,
    /// Diagnostic message.
    pub message: String,
    /// Where the violation was detected.
    pub location: &'static Location<'static>,
}

impl Fault {
    /// Creates a fault located at the caller.
    #[track_caller]
    #[must_use]
    pub fn new(assertion: &'static str, message: impl Into<String>) -> Self {
        Self {
            assertion,
            message: message.into(),
            location: Location::caller(),
        }
    }
}

/// Returns early with a [`Fault`] when `cond` does not hold.
///
/// The enclosing function's error type must implement `From<Fault>`.
#[macro_export]
macro_rules! ensure_invariant {
    ($cond:expr, $($arg:tt)+) => {
        if !($cond) {
            return Err($crate::fault::Fault::new(stringify!($cond), format!($($arg)+)).into());
        }
    };
}

/// Creates a connected halt handle and monitor.
#[must_use]
pub fn halt_channel() -> (Halt, HaltMonitor) {
    let (tx, rx) = watch::channel(None);
    (Halt { tx: Arc::new(tx) }, HaltMonitor { rx })
}

/// Handle used by tasks to stop the system on a fatal fault.
#[derive(Debug, Clone)]
pub struct Halt {
    tx: Arc<watch::Sender<Option<Fault>>>,
}

impl Halt {
    /// Logs the fault and stops all scheduled work.
    ///
    /// Only the first fault is kept; later ones are logged and dropped.
    pub fn halt(&self, fault: Fault) {
        error!("ASSERTION FAILED");
        error!("  Assertion: {}", fault.assertion);
        error!("  Message: {}", fault.message);
        error!("  Location: {}", fault.location);

        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(fault);
            true
        });
    }

    /// Returns true once any task has halted the system.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.tx.borrow().is_some()
    }
}

/// Observes the halt signal.
#[derive(Debug)]
pub struct HaltMonitor {
    rx: watch::Receiver<Option<Fault>>,
}

impl HaltMonitor {
    /// Waits until the system halts and returns the fault that caused it.
    ///
    /// Never completes if every [`Halt`] handle is dropped without halting.
    pub async fn halted(&mut self) -> Fault {
        loop {
            if let Some(fault) = self.rx.borrow_and_update().clone() {
                return fault;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Returns the fault if the system has already halted.
    #[must_use]
    pub fn fault(&self) -> Option<Fault> {
        self.rx.borrow().clone()
    }
}
