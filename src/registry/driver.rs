//! # ProcessDriver: the seam between the registry and the OS.
//!
//! [`ShellDriver`] is the production implementation: commands run via
//! `/bin/sh -c` with stdio redirected to `/dev/null`, signals go through
//! `kill(2)`. Tests substitute a scripted driver.

use std::io;
use std::process::{Command, Stdio};

use super::registry::Pid;

/// Termination request strength, in escalation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TermSignal {
    /// Graceful request (SIGTERM).
    Terminate,
    /// Forced kill (SIGKILL).
    Kill,
}

/// Spawns child processes and delivers termination signals.
///
/// Implementations must hand back the OS pid immediately and must not reap
/// the child themselves; reaping belongs to the registry's reaper.
pub trait ProcessDriver: Send + Sync + 'static {
    /// Spawns `command` and returns the child's pid.
    fn spawn(&self, command: &str) -> io::Result<Pid>;

    /// Sends a termination signal to `pid`.
    fn signal(&self, pid: Pid, sig: TermSignal) -> io::Result<()>;
}

/// Production driver: `/bin/sh -c <command>` with silenced stdio.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShellDriver;

impl ProcessDriver for ShellDriver {
    fn spawn(&self, command: &str) -> io::Result<Pid> {
        let child = Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        // The Child handle is dropped without waiting; the reaper collects
        // the exit status via waitpid.
        Ok(Pid(child.id() as i32))
    }

    fn signal(&self, pid: Pid, sig: TermSignal) -> io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        let signal = match sig {
            TermSignal::Terminate => Signal::SIGTERM,
            TermSignal::Kill => Signal::SIGKILL,
        };
        kill(nix::unistd::Pid::from_raw(pid.0), signal)
            .map_err(|errno| io::Error::from_raw_os_error(errno as i32))
    }
}
