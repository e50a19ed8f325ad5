//! Process-wide lock state.
//!
//! The state is a single byte behind an atomic so the attribute writer and the
//! command classifier can run on different threads without a lock. Each query
//! reads one snapshot; nothing spans two reads.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Whether the diagnostic interface is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LockState {
    #[default]
    Locked = 0,
    Unlocked = 1,
}

impl LockState {
    pub fn from_unlocked(unlocked: bool) -> Self {
        if unlocked {
            LockState::Unlocked
        } else {
            LockState::Locked
        }
    }

    pub fn is_unlocked(self) -> bool {
        matches!(self, LockState::Unlocked)
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => LockState::Locked,
            _ => LockState::Unlocked,
        }
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockState::Locked => f.write_str("locked"),
            LockState::Unlocked => f.write_str("unlocked"),
        }
    }
}

/// Atomic holder for [`LockState`].
#[derive(Debug, Default)]
pub struct LockCell {
    raw: AtomicU8,
}

impl LockCell {
    pub fn new(initial: LockState) -> Self {
        Self {
            raw: AtomicU8::new(initial as u8),
        }
    }

    /// Current state. Never fails and has no side effects.
    pub fn get(&self) -> LockState {
        LockState::from_raw(self.raw.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: LockState) {
        self.raw.store(state as u8, Ordering::Release);
    }
}

/// Write handle handed to trusted in-process callers.
///
/// Only profiles that export a mutator hand one out; elsewhere the state is
/// read-only after boot apart from the `diag_enable` attribute.
#[derive(Debug, Clone)]
pub struct StateMutator {
    cell: Arc<LockCell>,
}

impl StateMutator {
    pub(crate) fn new(cell: Arc<LockCell>) -> Self {
        Self { cell }
    }

    /// Overwrite the lock state: `true` unlocks, `false` locks.
    pub fn set_lock_state(&self, unlocked: bool) {
        self.cell.set(LockState::from_unlocked(unlocked));
    }

    pub fn lock_state(&self) -> LockState {
        self.cell.get()
    }
}
