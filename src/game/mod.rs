//! Match simulation modules

pub mod animation;
pub mod character;
pub mod combat;
pub mod controller;
pub mod controls;
pub mod r#match;
pub mod physics;
pub mod session;
pub mod snapshot;
pub mod variant;

pub use controller::CombatController;
pub use r#match::{GameMatch, SessionCommand, SessionHandle, SessionRegistry, SessionStatus};
pub use session::MatchSession;

use crate::ws::protocol::Buttons;

/// Read-only input state for one tick: what is held and what went down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    pub held: Buttons,
    pub pressed: Buttons,
}

impl InputSnapshot {
    /// Snapshot with `held` down and no new presses
    pub fn holding(held: Buttons) -> Self {
        Self {
            held,
            pressed: Buttons::default(),
        }
    }

    /// Snapshot for buttons that went down this tick
    pub fn pressing(pressed: Buttons) -> Self {
        Self {
            held: pressed,
            pressed,
        }
    }
}

/// Folds client input messages into per-tick snapshots. Presses are latched
/// when received, so a tap that begins and ends between two ticks still
/// registers once.
#[derive(Debug, Clone, Default)]
pub struct InputTracker {
    last_seq: u32,
    held: Buttons,
    latched: Buttons,
}

impl InputTracker {
    /// Record a client input; stale sequence numbers are dropped
    pub fn record(&mut self, seq: u32, buttons: Buttons) -> bool {
        if seq <= self.last_seq && self.last_seq != 0 {
            return false;
        }
        self.last_seq = seq;
        self.latched = self.latched.union(buttons.pressed_since(self.held));
        self.held = buttons;
        true
    }

    /// Snapshot for the coming tick, consuming latched presses
    pub fn take_snapshot(&mut self) -> InputSnapshot {
        let pressed = std::mem::take(&mut self.latched);
        InputSnapshot {
            held: self.held,
            pressed,
        }
    }

    pub fn last_seq(&self) -> u32 {
        self.last_seq
    }

    /// Release everything, e.g. when the controlling client leaves
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
