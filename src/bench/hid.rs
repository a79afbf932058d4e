//! HID keyboard endpoint that records what it is sent.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::hal::{HalError, HidKeyboard};
use crate::keyboard::report::KeyboardReport;

/// Reports kept by default.
pub const DEFAULT_HISTORY: usize = 4096;

#[derive(Debug)]
struct HidState {
    ready: bool,
    history: VecDeque<KeyboardReport>,
    capacity: usize,
    sent: u64,
}

/// Recording keyboard endpoint. Clones share the same history.
#[derive(Debug, Clone)]
pub struct RecordingHid {
    state: Arc<Mutex<HidState>>,
}

impl Default for RecordingHid {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingHid {
    /// A ready endpoint keeping the last [`DEFAULT_HISTORY`] reports.
    #[must_use]
    pub fn new() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }

    #[must_use]
    pub fn with_history(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(HidState {
                ready: true,
                history: VecDeque::with_capacity(capacity),
                capacity,
                sent: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HidState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_ready(&self, ready: bool) {
        self.lock().ready = ready;
    }

    /// Total reports accepted, including ones dropped from the history.
    #[must_use]
    pub fn sent(&self) -> u64 {
        self.lock().sent
    }

    /// Recorded reports, oldest first.
    #[must_use]
    pub fn reports(&self) -> Vec<KeyboardReport> {
        self.lock().history.iter().copied().collect()
    }

    #[must_use]
    pub fn last(&self) -> Option<KeyboardReport> {
        self.lock().history.back().copied()
    }
}

impl HidKeyboard for RecordingHid {
    fn ready(&self) -> bool {
        self.lock().ready
    }

    fn send_keyboard_report(
        &mut self,
        modifiers: u8,
        reserved: u8,
        keycodes: [u8; 6],
    ) -> Result<(), HalError> {
        let mut state = self.lock();
        if state.capacity > 0 && state.history.len() == state.capacity {
            state.history.pop_front();
        }
        if state.capacity > 0 {
            state.history.push_back(KeyboardReport {
                modifiers,
                reserved,
                keycodes,
            });
        }
        state.sent += 1;
        Ok(())
    }
}
