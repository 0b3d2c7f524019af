//! # Session signal flags and their OS watchers.
//!
//! Three external signals steer the session:
//! - **SIGINT / SIGTERM** → terminate the session
//! - **SIGUSR1** → reload configuration and restart the daemons
//! - **SIGUSR2** → restart only the window-manager category
//!
//! The watcher task only flips atomic flags and wakes the monitoring loop;
//! the loop consumes the flags at the top of each iteration. This mirrors
//! the handler discipline of the process registry: the delivery path never
//! does real work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::SessionError;
use crate::registry::ProcessRegistry;

/// Pending-signal flags set by watchers, consumed by the monitoring loop.
#[derive(Debug, Default)]
pub(crate) struct SignalFlags {
    terminate: AtomicBool,
    reload: AtomicBool,
    restart_wm: AtomicBool,
}

impl SignalFlags {
    pub(crate) fn request_terminate(&self) {
        self.terminate.store(true, Ordering::SeqCst);
    }

    pub(crate) fn request_reload(&self) {
        self.reload.store(true, Ordering::SeqCst);
    }

    pub(crate) fn request_wm_restart(&self) {
        self.restart_wm.store(true, Ordering::SeqCst);
    }

    /// Consumes the terminate flag.
    pub(crate) fn take_terminate(&self) -> bool {
        self.terminate.swap(false, Ordering::SeqCst)
    }

    /// Consumes the reload flag.
    pub(crate) fn take_reload(&self) -> bool {
        self.reload.swap(false, Ordering::SeqCst)
    }

    /// Consumes the wm-restart flag.
    pub(crate) fn take_wm_restart(&self) -> bool {
        self.restart_wm.swap(false, Ordering::SeqCst)
    }
}

/// Installs the session signal watchers.
///
/// Failure to install any watcher is fatal: a session that cannot be told
/// to shut down must not start. The watcher wakes the monitoring loop
/// through the registry's notifier after flipping a flag.
pub(crate) fn spawn_watchers(
    flags: Arc<SignalFlags>,
    registry: Arc<ProcessRegistry>,
    token: CancellationToken,
) -> Result<(), SessionError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt()).map_err(SessionError::signal_install)?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(SessionError::signal_install)?;
    let mut sigusr1 = signal(SignalKind::user_defined1()).map_err(SessionError::signal_install)?;
    let mut sigusr2 = signal(SignalKind::user_defined2()).map_err(SessionError::signal_install)?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = sigint.recv() => flags.request_terminate(),
                _ = sigterm.recv() => flags.request_terminate(),
                _ = sigusr1.recv() => flags.request_reload(),
                _ = sigusr2.recv() => flags.request_wm_restart(),
            }
            registry.interrupt();
        }
    });
    Ok(())
}
