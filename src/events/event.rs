//! # Runtime events emitted by the supervisor and selector.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Selection events**: resolution outcomes per category
//! - **Process events**: launches and observed child terminations
//! - **Phase events**: signal-driven lifecycle transitions
//! - **Escalation events**: forced termination during shutdown/reload
//!
//! The [`Event`] struct carries additional metadata such as timestamps,
//! entity/category names, pids, and free-form reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::registry::Pid;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Selection events ===
    /// An entity was resolved for a category.
    ///
    /// Sets: `entity`, `category`.
    EntitySelected,

    /// A category was explicitly disabled via the `none` preference.
    ///
    /// Sets: `category`.
    CategoryDisabled,

    /// No member of a category could be resolved (missing or all unhealthy).
    ///
    /// Sets: `category`, `reason`.
    CategoryUnresolved,

    /// A health-check command exited non-zero or overran its deadline.
    ///
    /// Sets: `entity`, `reason`.
    HealthCheckFailed,

    // === Process events ===
    /// A resolved entity was launched as a child process.
    ///
    /// Sets: `entity`, `category`, `pid`.
    EntityLaunched,

    /// A tracked child process terminated (exit or signal).
    ///
    /// Sets: `entity`, `pid`, `reason` (human-readable status).
    EntityExited,

    // === Phase events ===
    /// Session termination requested (OS signal or window-manager death).
    ShutdownRequested,

    /// Daemon reload requested (SIGUSR1).
    ReloadRequested,

    /// Window-manager restart requested (SIGUSR2).
    WmRestartRequested,

    /// All records were cleared and the session reached `Terminated`.
    SessionEnded,

    // === Escalation events ===
    /// A child ignored SIGTERM for the whole grace period and was killed.
    ///
    /// Sets: `pid`.
    EscalatedKill,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Entity identifier, if applicable.
    pub entity: Option<Arc<str>>,
    /// Category name, if applicable.
    pub category: Option<Arc<str>>,
    /// Child process id, if applicable.
    pub pid: Option<Pid>,
    /// Human-readable reason (exit status, failure message, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            entity: None,
            category: None,
            pid: None,
            reason: None,
        }
    }

    /// Attaches an entity identifier.
    #[inline]
    pub fn with_entity(mut self, entity: impl Into<Arc<str>>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Attaches a category name.
    #[inline]
    pub fn with_category(mut self, category: impl Into<Arc<str>>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Attaches a child pid.
    #[inline]
    pub fn with_pid(mut self, pid: Pid) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
