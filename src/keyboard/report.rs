//! # Keyboard Report
//!
//! HID boot-protocol keyboard report and the keys the console drives.

use crate::controls::types::Intent;

/// HID usage IDs for the keys the console presses.
pub mod scan_codes {
    pub const A: u8 = 0x04;
    pub const D: u8 = 0x07;
    pub const S: u8 = 0x16;
    pub const W: u8 = 0x1A;
    pub const SPACE: u8 = 0x2C;
}

/// Key slots in a boot-protocol report.
pub const KEY_SLOTS: usize = 6;

/// One boot-protocol keyboard report.
///
/// Pressed keys are packed from slot 0 in the order they were pressed; unused
/// slots hold 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyboardReport {
    pub modifiers: u8,
    pub reserved: u8,
    pub keycodes: [u8; KEY_SLOTS],
}

impl KeyboardReport {
    /// Every key released.
    pub const EMPTY: Self = Self {
        modifiers: 0,
        reserved: 0,
        keycodes: [0; KEY_SLOTS],
    };

    /// Adds `code` to the next free slot. Returns false when the report is full.
    pub fn press(&mut self, code: u8) -> bool {
        match self.keycodes.iter_mut().find(|slot| **slot == 0) {
            Some(slot) => {
                *slot = code;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_pressed(&self, code: u8) -> bool {
        code != 0 && self.keycodes.contains(&code)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keycodes.iter().all(|&code| code == 0)
    }

    /// Wire image: modifiers, reserved, then the six key slots.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[0] = self.modifiers;
        bytes[1] = self.reserved;
        bytes[2..].copy_from_slice(&self.keycodes);
        bytes
    }
}

/// Duty-cycled keyboard outputs in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Forward,
    Left,
    Right,
    Reverse,
    Handbrake,
}

impl Output {
    /// Every output, in the order keys are packed into a report.
    pub const ALL: [Self; 5] = [
        Self::Forward,
        Self::Left,
        Self::Right,
        Self::Reverse,
        Self::Handbrake,
    ];

    #[must_use]
    pub fn scan_code(self) -> u8 {
        match self {
            Self::Forward => scan_codes::W,
            Self::Left => scan_codes::A,
            Self::Right => scan_codes::D,
            Self::Reverse => scan_codes::S,
            Self::Handbrake => scan_codes::SPACE,
        }
    }

    /// Share of each period this output's key is held for.
    #[must_use]
    pub fn duty_cycle(self, intent: &Intent) -> f32 {
        match self {
            Self::Forward => intent.forward,
            Self::Left => intent.left,
            Self::Right => intent.right,
            Self::Reverse => intent.reverse,
            Self::Handbrake => intent.handbrake,
        }
    }
}
