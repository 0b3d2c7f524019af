//! # sessionvisor
//!
//! **Sessionvisor** is a desktop-session supervisor library for Rust.
//!
//! Given a set of declared service entities (window manager, compositor,
//! notification daemon, polkit agent, status bar, applets, and user-facing
//! default applications), it selects one healthy candidate per functional
//! category, launches and tracks it as a child process, and keeps the session
//! alive by restarting, reloading, or tearing down the process set in
//! response to OS signals and child termination.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  descriptor sources ──► ModelStore (categories ──► candidate entities)
//!                              │
//!                              ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (session state machine)                               │
//! │  - Selector (preference-and-fallback resolution + health checks)  │
//! │  - ProcessRegistry (child process table, fed by the reaper)       │
//! │  - Bus (broadcast events) + subscribers                           │
//! │  - signal flags (terminate / reload / wm-restart)                 │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   window manager      compositor, ...    applets / optionals
//!   (child process)     (one per category) (all healthy members)
//!        │                  │                  │
//!        └───── SIGCHLD ────┴──────────────────┘
//!                  │
//!                  ▼
//!         reaper task (waitpid WNOHANG loop)
//!                  │ on_child_status(pid, status)
//!                  ▼
//!         ProcessRegistry ──► Supervisor monitoring loop (drains events)
//! ```
//!
//! ### Lifecycle
//! ```text
//! Startup ──► Running ⇄ Reloading
//!                │
//!                ▼
//!          ShuttingDown ──► Terminated
//!
//! Startup:       load entities, resolve + launch window manager, daemons,
//!                optional members, export default applications (env vars)
//! Running:       drain child exit events, react to signal flags, poll the
//!                display hook, block until the next event or cycle tick
//! Reloading:     re-read preferences, escalate non-wm daemons down,
//!                re-resolve and relaunch them
//! ShuttingDown:  SIGTERM ──► grace (1000 ms) ──► SIGKILL, per record
//! ```
//!
//! ## Example
//! ```no_run
//! use sessionvisor::{EntityDescriptor, SessionConfig, Supervisor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Descriptors normally come from parsed service files; any source
//!     // implementing `DescriptorSource` works, as does a pre-parsed batch.
//!     let descriptors = vec![EntityDescriptor {
//!         id: "openbox".into(),
//!         command: Some("openbox".into()),
//!         category: Some("window-manager".into()),
//!         default: Some(true),
//!         ..EntityDescriptor::default()
//!     }];
//!
//!     let mut sup = Supervisor::builder(SessionConfig::default())
//!         .with_descriptors(vec![descriptors])
//!         .build();
//!     sup.run().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod events;
mod hooks;
mod model;
mod registry;
mod select;
mod subscribers;
mod supervisor;

#[cfg(test)]
pub(crate) mod testing;

// ---- Public re-exports ----

pub use config::{SessionConfig, SessionPrefs, PREFERENCE_NONE};
pub use error::SessionError;
pub use events::{Bus, Event, EventKind};
pub use hooks::{
    ConfigSource, DescriptorSource, DisplayHook, Notifier, NullDisplayHook, NullNotifier,
    StaticPrefs,
};
pub use model::{
    Category, CategoryId, Entity, EntityDescriptor, EntityId, ModelStore, Preference, Section,
    WINDOW_MANAGER,
};
pub use registry::{
    ChildStatus, Owner, Pid, ProcessDriver, ProcessRegistry, RecordSnapshot, ShellDriver,
    TermSignal,
};
pub use select::Selector;
pub use subscribers::{LogWriter, Subscribe};
pub use supervisor::{Phase, Supervisor, SupervisorBuilder};
