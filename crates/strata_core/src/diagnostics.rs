//! # Diagnostics
//!
//! Per-system statistics, published by the world once per timeline step into a
//! shared handle. An overlay on another thread polls the handle; it never
//! touches the world itself.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::ecs::{SystemId, Timeline};

/// Statistics of one system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemStats {
    /// System id.
    pub id: SystemId,
    /// System name.
    pub name: &'static str,
    /// Timeline the system runs on.
    pub timeline: Timeline,
    /// Rows in the system's primary family.
    pub entity_count: usize,
    /// Rolling average run time in nanoseconds.
    pub average_tick_ns: u64,
    /// Last run time in nanoseconds.
    pub last_tick_ns: u64,
    /// Runs measured.
    pub runs: u64,
    /// Runs that exceeded the configured tick budget.
    pub over_budget: u64,
}

/// Everything published after one timeline step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    /// Timeline steps completed so far.
    pub frame: u64,
    /// Live entities.
    pub entity_count: usize,
    /// One entry per registered system, in timeline and registration order.
    pub systems: Vec<SystemStats>,
}

impl DiagnosticsSnapshot {
    /// Looks up the entry of a system.
    #[must_use]
    pub fn system(&self, id: SystemId) -> Option<&SystemStats> {
        self.systems.iter().find(|stats| stats.id == id)
    }
}

/// Shared, cloneable handle to the latest snapshot.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticsHandle {
    inner: Arc<RwLock<DiagnosticsSnapshot>>,
}

impl DiagnosticsHandle {
    /// Creates a handle holding an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the published snapshot.
    pub fn publish(&self, snapshot: DiagnosticsSnapshot) {
        *self.inner.write() = snapshot;
    }

    /// Copies the latest snapshot.
    #[must_use]
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        self.inner.read().clone()
    }

    /// Frame of the latest snapshot, without copying it.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.inner.read().frame
    }
}
