//! Session lifecycle: the state machine that drives a desktop session.
//!
//! Internal modules:
//! - `core`: the supervisor itself (startup, monitoring loop, reload,
//!   shutdown escalation) and its builder;
//! - `signals`: OS signal watchers feeding the terminate/reload/wm-restart
//!   flags consumed by the monitoring loop.

#[allow(clippy::module_inception)]
mod core;
mod signals;

pub use self::core::{Phase, Supervisor, SupervisorBuilder};
