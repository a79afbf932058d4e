//! # Keyboard Module
//!
//! Emits the driver's intent as a stream of USB keyboard reports.
//!
//! This module handles:
//! - Handing the latest intent from the input task to the keyboard task
//! - Duty-cycling keys over a fixed period
//! - The engine kill switch
//! - Periodic all-keys-up reports against stuck keys

pub mod emitter;
pub mod kill_switch;
pub mod mailbox;
pub mod report;

pub use emitter::{DutyCycleEmitter, TickOutcome};
pub use kill_switch::KillSwitch;
pub use mailbox::{intent_mailbox, IntentPublisher, IntentReceiver};
pub use report::KeyboardReport;
