//! # Reaper: the SIGCHLD delivery path.
//!
//! A dedicated task listens for SIGCHLD and collects every pending child
//! status with `waitpid(WNOHANG)` until the kernel has nothing left, posting
//! each into the registry. Statuses for pids nobody registered are dropped
//! by `on_child_status` itself.
//!
//! Stop/continue transitions are collected too (`WUNTRACED`/`WCONTINUED`)
//! so the monitoring loop can log them.

use std::sync::Arc;

use log::trace;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;

use super::registry::{ChildStatus, Pid, ProcessRegistry};

/// Installs the SIGCHLD watcher and spawns the reaper task.
///
/// Failure to install the watcher is fatal: without it the supervisor would
/// never observe child exits.
pub(crate) fn spawn_reaper(
    registry: Arc<ProcessRegistry>,
    token: CancellationToken,
) -> Result<(), SessionError> {
    let mut sigchld = signal(SignalKind::child()).map_err(SessionError::signal_install)?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                received = sigchld.recv() => {
                    if received.is_none() {
                        break;
                    }
                    reap_pending(&registry);
                }
            }
        }
    });
    Ok(())
}

/// Collects every pending child status. Signals coalesce, so one SIGCHLD
/// may stand for several exits; loop until `waitpid` has nothing left.
fn reap_pending(registry: &ProcessRegistry) {
    let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
    loop {
        match waitpid(None, Some(flags)) {
            Ok(WaitStatus::Exited(pid, code)) => {
                registry.on_child_status(Pid(pid.as_raw()), ChildStatus::Exited(code));
            }
            Ok(WaitStatus::Signaled(pid, sig, _core)) => {
                registry.on_child_status(Pid(pid.as_raw()), ChildStatus::Signaled(sig as i32));
            }
            Ok(WaitStatus::Stopped(pid, sig)) => {
                registry.on_child_status(Pid(pid.as_raw()), ChildStatus::Stopped(sig as i32));
            }
            Ok(WaitStatus::Continued(pid)) => {
                registry.on_child_status(Pid(pid.as_raw()), ChildStatus::Continued);
            }
            Ok(WaitStatus::StillAlive) => break,
            Ok(other) => {
                trace!("ignoring wait status {other:?}");
            }
            // ECHILD: no children left to wait for.
            Err(_) => break,
        }
    }
}
