//! Error types used by the sessionvisor runtime.
//!
//! Only genuinely fatal conditions surface as [`SessionError`]: a failed
//! spawn, a signal watcher that could not be installed, or a required
//! window-manager category that could not be resolved. Everything else
//! (missing preferred entity, failed health check, malformed descriptor,
//! config reload failure) is logged and degrades; child exits are routed
//! through the registry as ordinary events, never as errors.

use std::io;

use thiserror::Error;

/// # Errors produced by the session runtime.
///
/// Continuing after any of these would leave the supervisor tracking an
/// inconsistent process tree (or a session with no window manager), so they
/// abort the session rather than degrade.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SessionError {
    /// Spawning a child process failed outright (the `fork`/`exec` analog).
    #[error("unable to spawn `{command}`: {source}")]
    Spawn {
        /// The shell command that failed to spawn.
        command: String,
        /// The underlying OS error.
        source: io::Error,
    },

    /// A required OS signal watcher could not be installed.
    #[error("unable to install signal watcher: {source}")]
    SignalInstall {
        /// The underlying OS error.
        source: io::Error,
    },

    /// The window-manager category could not be resolved while required.
    ///
    /// User-visible; callers typically map this to a non-zero exit code.
    #[error("no usable window manager could be resolved")]
    WindowManagerUnresolved,
}

impl SessionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SessionError::Spawn { .. } => "session_spawn_failed",
            SessionError::SignalInstall { .. } => "session_signal_install_failed",
            SessionError::WindowManagerUnresolved => "session_wm_unresolved",
        }
    }

    pub(crate) fn spawn(command: impl Into<String>, source: io::Error) -> Self {
        SessionError::Spawn {
            command: command.into(),
            source,
        }
    }

    pub(crate) fn signal_install(source: io::Error) -> Self {
        SessionError::SignalInstall { source }
    }
}
