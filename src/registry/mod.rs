//! Process registry: the supervisor's table of in-flight child processes.
//!
//! This is the load-bearing piece of the whole crate. Every table operation
//! is a narrow `std::sync::Mutex` critical section, playing the role a
//! block-SIGCHLD/unblock bracket plays around a raw signal handler; the
//! SIGCHLD delivery path itself is a dedicated reaper task (see [`reaper`]).
//!
//! ## Architecture
//! ```text
//! Supervisor/Selector ──► ProcessRegistry::spawn() ──► ProcessDriver::spawn()
//!                                │ (lock held across spawn+insert)
//!                                ▼
//!                         record table (Vec, insertion order)
//!                                ▲
//!  SIGCHLD ──► reaper task ──────┘ on_child_status(pid, status)
//!                                │
//!                                ▼
//!                         Notify ──► wait_exit / wait_event waiters
//! ```
//!
//! ## Rules
//! - The delivery path (`on_child_status`) only flips fields on existing
//!   records; it never inserts, removes, or reorders.
//! - `status_changed` is set exactly once per observed transition and
//!   cleared exactly once, by `next_event`.
//! - Event drain order is table insertion order, not OS exit order; callers
//!   drain to exhaustion every loop tick, so nothing is lost.

mod driver;
mod reaper;
#[allow(clippy::module_inception)]
mod registry;

pub use driver::{ProcessDriver, ShellDriver, TermSignal};
pub(crate) use reaper::spawn_reaper;
pub use registry::{ChildStatus, Owner, Pid, ProcessRegistry, RecordSnapshot};
