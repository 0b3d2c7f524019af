//! # Event subscribers for the session runtime.
//!
//! This module provides the [`Subscribe`] trait and a built-in [`LogWriter`]
//! for handling runtime events broadcast through the
//! [`Bus`](crate::events::Bus).
//!
//! ```text
//! Event flow:
//!   Supervisor/Selector ── publish(Event) ──► Bus ──► listener task
//!                                                        │
//!                                                        ├──► LogWriter
//!                                                        └──► custom Subscribe impls
//! ```

mod log;
mod subscriber;

pub use self::log::LogWriter;
pub use subscriber::Subscribe;
