//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the supervisor, the
//! selector, and the process registry consumers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Supervisor` (lifecycle, exits, escalation),
//!   `Selector` (selection outcomes, health checks).
//! - **Consumers**: the supervisor's subscriber listener, which forwards
//!   events to every registered [`Subscribe`](crate::Subscribe).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
