//! Write gate: who is currently writing to the grid.
//!
//! Server-origin writes (inbound deltas, AI commands) must never be captured
//! as outgoing local deltas. The gate is a three-state machine shared between
//! the writers and the delta queue:
//!
//! ```text
//!            enter(Local)                 enter(Remote)
//!   Idle ───────────────▶ ApplyingLocal   Idle ───────────────▶ ApplyingRemote
//!     ▲                        │            ▲                        │
//!     └──── guard dropped ─────┘            └──── guard dropped ─────┘
//! ```
//!
//! Transitions only start from `Idle`. Overlapping writers get
//! `GateError::Busy` instead of silently sharing the flag.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const IDLE: u8 = 0;
const LOCAL: u8 = 1;
const REMOTE: u8 = 2;

/// Who initiated a grid write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOrigin {
    /// A user edit on this client; captured as an outgoing delta.
    Local,
    /// A server delta or AI command; never re-captured.
    Remote,
}

/// Current gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    ApplyingLocal,
    ApplyingRemote,
}

impl GateState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            LOCAL => GateState::ApplyingLocal,
            REMOTE => GateState::ApplyingRemote,
            _ => GateState::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("grid write already in progress ({current:?}); cannot start {requested:?} write")]
    Busy { current: GateState, requested: WriteOrigin },
}

/// Shared write gate. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct WriteGate {
    state: Arc<AtomicU8>,
}

impl WriteGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GateState {
        GateState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// True while a server-origin write holds the gate.
    pub fn is_applying_remote(&self) -> bool {
        self.state() == GateState::ApplyingRemote
    }

    /// Enter the gate. The returned guard resets it to `Idle` on drop.
    pub fn enter(&self, origin: WriteOrigin) -> Result<GateGuard, GateError> {
        let target = match origin {
            WriteOrigin::Local => LOCAL,
            WriteOrigin::Remote => REMOTE,
        };
        self.state
            .compare_exchange(IDLE, target, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|current| GateError::Busy {
                current: GateState::from_raw(current),
                requested: origin,
            })?;
        Ok(GateGuard { state: Arc::clone(&self.state) })
    }
}

/// Holds the gate until dropped.
#[derive(Debug)]
#[must_use = "the gate is released as soon as the guard is dropped"]
pub struct GateGuard {
    state: Arc<AtomicU8>,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.state.store(IDLE, Ordering::Release);
    }
}
