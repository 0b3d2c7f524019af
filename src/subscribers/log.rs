//! # Logging subscriber.
//!
//! [`LogWriter`] forwards events to the `log` facade in a compact
//! human-readable format, one line per event:
//!
//! ```text
//! [selected] entity=picom category=compositor
//! [launched] entity=picom category=compositor pid=4711
//! [exited] entity=picom pid=4711 reason="exited with status 1"
//! [reload-requested]
//! [escalated-kill] pid=4711
//! ```

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Built-in subscriber that logs every event through the `log` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let entity = e.entity.as_deref().unwrap_or("?");
        let category = e.category.as_deref().unwrap_or("?");
        match e.kind {
            EventKind::EntitySelected => {
                debug!("[selected] entity={entity} category={category}");
            }
            EventKind::CategoryDisabled => {
                info!("[disabled] category={category}");
            }
            EventKind::CategoryUnresolved => {
                warn!("[unresolved] category={category} reason={:?}", e.reason);
            }
            EventKind::HealthCheckFailed => {
                warn!("[health-check-failed] entity={entity} reason={:?}", e.reason);
            }
            EventKind::EntityLaunched => {
                info!(
                    "[launched] entity={entity} category={category} pid={}",
                    e.pid.map(|p| p.0).unwrap_or(-1)
                );
            }
            EventKind::EntityExited => {
                info!(
                    "[exited] entity={entity} pid={} reason={:?}",
                    e.pid.map(|p| p.0).unwrap_or(-1),
                    e.reason
                );
            }
            EventKind::ShutdownRequested => info!("[shutdown-requested]"),
            EventKind::ReloadRequested => info!("[reload-requested]"),
            EventKind::WmRestartRequested => info!("[wm-restart-requested]"),
            EventKind::SessionEnded => info!("[session-ended]"),
            EventKind::EscalatedKill => {
                warn!("[escalated-kill] pid={}", e.pid.map(|p| p.0).unwrap_or(-1));
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
