//! # Event subscriber trait.
//!
//! [`Subscribe`] is the extension point for plugging custom event handlers
//! (logging, metrics, desktop notifications) into the runtime. Events are
//! delivered sequentially from the supervisor's listener task.

use async_trait::async_trait;

use crate::events::Event;

/// Event subscriber for runtime observability.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
/// - A slow subscriber delays the others behind the same listener.
///
/// ## Example
/// ```rust
/// use async_trait::async_trait;
/// use sessionvisor::{Event, EventKind, Subscribe};
///
/// struct ExitCounter;
///
/// #[async_trait]
/// impl Subscribe for ExitCounter {
///     async fn on_event(&self, ev: &Event) {
///         if matches!(ev.kind, EventKind::EntityExited) {
///             // bump a metric, etc.
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    async fn on_event(&self, event: &Event);

    /// Returns the subscriber name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose;
    /// override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
