//! # Scripted process driver for tests.
//!
//! [`FakeDriver`] stands in for [`ShellDriver`]: it never forks, hands out
//! monotonically increasing fake pids, and reports statuses straight into
//! its registry according to per-command plans:
//!
//! - default: the process "runs" until signaled, then dies from the signal;
//! - [`plan_exit`](FakeDriver::plan_exit): the process exits immediately
//!   with the given code;
//! - [`plan_hang`](FakeDriver::plan_hang): the process ignores SIGTERM and
//!   only dies from SIGKILL.
//!
//! Every spawn and signal is recorded in an ordered op log so tests can
//! assert escalation and restart ordering.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use crate::registry::{ChildStatus, Pid, ProcessDriver, ProcessRegistry, TermSignal};

/// One recorded driver operation, in call order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum DriverOp {
    Spawn(Pid, String),
    Signal(Pid, TermSignal),
}

#[derive(Clone, Copy, Debug)]
enum Plan {
    /// Runs until signaled; SIGTERM and SIGKILL both kill it.
    Run,
    /// Exits on its own right after spawning.
    Exit(i32),
    /// Ignores SIGTERM; only SIGKILL kills it.
    Hang,
}

struct State {
    plans: HashMap<String, Plan>,
    commands: HashMap<Pid, String>,
    ops: Vec<DriverOp>,
}

/// Scripted [`ProcessDriver`] wired to its own [`ProcessRegistry`].
pub(crate) struct FakeDriver {
    registry: Arc<ProcessRegistry>,
    state: Mutex<State>,
    next_pid: AtomicI32,
}

impl FakeDriver {
    pub(crate) fn arc() -> Arc<Self> {
        Arc::new(Self {
            registry: Arc::new(ProcessRegistry::new()),
            state: Mutex::new(State {
                plans: HashMap::new(),
                commands: HashMap::new(),
                ops: Vec::new(),
            }),
            next_pid: AtomicI32::new(100),
        })
    }

    /// The registry this driver reports statuses into. Pass it to the
    /// component under test via its builder/constructor.
    pub(crate) fn registry(&self) -> Arc<ProcessRegistry> {
        Arc::clone(&self.registry)
    }

    /// Scripts `command` to exit immediately with `code`.
    pub(crate) fn plan_exit(&self, command: &str, code: i32) {
        self.lock().plans.insert(command.to_string(), Plan::Exit(code));
    }

    /// Scripts `command` to ignore SIGTERM.
    pub(crate) fn plan_hang(&self, command: &str) {
        self.lock().plans.insert(command.to_string(), Plan::Hang);
    }

    /// Commands spawned so far, in order.
    pub(crate) fn spawned_commands(&self) -> Vec<String> {
        self.lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                DriverOp::Spawn(_, cmd) => Some(cmd.clone()),
                DriverOp::Signal(..) => None,
            })
            .collect()
    }

    /// Signals delivered so far, in order.
    pub(crate) fn signals(&self) -> Vec<(Pid, TermSignal)> {
        self.lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                DriverOp::Signal(pid, sig) => Some((*pid, *sig)),
                DriverOp::Spawn(..) => None,
            })
            .collect()
    }

    /// The full ordered op log.
    pub(crate) fn ops(&self) -> Vec<DriverOp> {
        self.lock().ops.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

impl ProcessDriver for FakeDriver {
    fn spawn(&self, command: &str) -> io::Result<Pid> {
        let pid = Pid(self.next_pid.fetch_add(1, Ordering::SeqCst));
        let plan = {
            let mut state = self.lock();
            state.ops.push(DriverOp::Spawn(pid, command.to_string()));
            state.commands.insert(pid, command.to_string());
            state.plans.get(command).copied().unwrap_or(Plan::Run)
        };
        if let Plan::Exit(code) = plan {
            // The registry holds its table lock across spawn+insert, so the
            // status must be posted from a task, after the record exists.
            let registry = Arc::clone(&self.registry);
            tokio::spawn(async move {
                registry.on_child_status(pid, ChildStatus::Exited(code));
            });
        }
        Ok(pid)
    }

    fn signal(&self, pid: Pid, sig: TermSignal) -> io::Result<()> {
        let plan = {
            let mut state = self.lock();
            state.ops.push(DriverOp::Signal(pid, sig));
            state
                .commands
                .get(&pid)
                .and_then(|cmd| state.plans.get(cmd))
                .copied()
                .unwrap_or(Plan::Run)
        };
        match (plan, sig) {
            (Plan::Run, TermSignal::Terminate) => {
                self.registry.on_child_status(pid, ChildStatus::Signaled(15));
            }
            (Plan::Run | Plan::Hang, TermSignal::Kill) => {
                self.registry.on_child_status(pid, ChildStatus::Signaled(9));
            }
            (Plan::Hang, TermSignal::Terminate) => {}
            (Plan::Exit(_), _) => {} // already gone
        }
        Ok(())
    }
}
