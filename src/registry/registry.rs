//! # ProcessRegistry: async-signal-safe child process table.
//!
//! Records live in a `Vec` guarded by a `std::sync::Mutex`; every public
//! operation is a short lock-scan-unlock critical section, the async analog
//! of a block-SIGCHLD/unblock bracket. A `tokio::sync::Notify`
//! wakes waiters whenever a status changes, so blocking waits suspend
//! instead of busy-polling.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time;

use crate::error::SessionError;

use super::driver::ProcessDriver;

/// Child process id as handed out by the OS.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Pid(pub i32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decoded `waitpid` status of a tracked child.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildStatus {
    /// Process exited normally with this code.
    Exited(i32),
    /// Process was terminated by this signal.
    Signaled(i32),
    /// Process was stopped by this signal (record is kept).
    Stopped(i32),
    /// Process was resumed (record is kept).
    Continued,
}

impl ChildStatus {
    /// Whether the process is gone (exited or killed by a signal).
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChildStatus::Exited(_) | ChildStatus::Signaled(_))
    }
}

impl fmt::Display for ChildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildStatus::Exited(code) => write!(f, "exited with status {code}"),
            ChildStatus::Signaled(sig) => write!(f, "terminated by signal {sig}"),
            ChildStatus::Stopped(sig) => write!(f, "stopped by signal {sig}"),
            ChildStatus::Continued => write!(f, "continued"),
        }
    }
}

/// Opaque owner reference: what produced a tracked process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Owner {
    /// A launched service/application belonging to a category.
    Service {
        /// Entity identifier.
        entity: String,
        /// Owning category name.
        category: String,
    },
    /// A temporary health-check run; removed by the checker itself.
    Check {
        /// Entity identifier under test.
        entity: String,
    },
}

impl Owner {
    /// Entity identifier this process belongs to.
    pub fn entity(&self) -> &str {
        match self {
            Owner::Service { entity, .. } | Owner::Check { entity } => entity,
        }
    }

    /// Category name, for service processes.
    pub fn category(&self) -> Option<&str> {
        match self {
            Owner::Service { category, .. } => Some(category),
            Owner::Check { .. } => None,
        }
    }

    /// Matches an entity identifier or a category name, the lookup key used
    /// by `find_by_owner`.
    fn matches(&self, needle: &str) -> bool {
        self.entity() == needle || self.category() == Some(needle)
    }
}

/// One row per live child process.
#[derive(Clone, Debug)]
struct Record {
    pid: Pid,
    owner: Owner,
    status: Option<ChildStatus>,
    status_changed: bool,
}

/// Point-in-time copy of a record, handed out to callers. Snapshots, not
/// references: the table may change the moment the lock is released.
#[derive(Clone, Debug)]
pub struct RecordSnapshot {
    /// Child process id.
    pub pid: Pid,
    /// What produced this process.
    pub owner: Owner,
    /// Last observed status, if any.
    pub status: Option<ChildStatus>,
}

/// Table of in-flight child processes.
///
/// Insertion order is preserved; `next_event` drains in that order.
pub struct ProcessRegistry {
    records: Mutex<Vec<Record>>,
    notify: Notify,
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Record>> {
        // A poisoning panic elsewhere must not wedge shutdown; the table
        // itself stays consistent because every mutation is a single push,
        // retain or field flip.
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a new record for `pid`.
    ///
    /// At most one record per pid; a duplicate registration replaces the
    /// stale row (the pid has necessarily been reaped and recycled).
    pub fn register(&self, pid: Pid, owner: Owner) {
        let mut records = self.lock();
        records.retain(|r| r.pid != pid);
        records.push(Record {
            pid,
            owner,
            status: None,
            status_changed: false,
        });
    }

    /// Spawns `command` through `driver` and registers the child.
    ///
    /// The table lock is held across spawn+insert: the reaper may already
    /// have collected the status of an immediately-exiting child, but its
    /// `on_child_status` then blocks until the record exists, so the event
    /// cannot be lost. This is the analog of blocking SIGCHLD around
    /// `fork` + registry insert.
    pub fn spawn(
        &self,
        driver: &dyn ProcessDriver,
        command: &str,
        owner: Owner,
    ) -> Result<Pid, SessionError> {
        let mut records = self.lock();
        let pid = driver
            .spawn(command)
            .map_err(|e| SessionError::spawn(command, e))?;
        records.retain(|r| r.pid != pid);
        records.push(Record {
            pid,
            owner,
            status: None,
            status_changed: false,
        });
        Ok(pid)
    }

    /// Looks up a record by pid. "Not found" is a normal outcome.
    pub fn find(&self, pid: Pid) -> Option<RecordSnapshot> {
        self.lock()
            .iter()
            .find(|r| r.pid == pid)
            .map(Self::snapshot)
    }

    /// Looks up the first record whose owner matches an entity identifier
    /// or a category name.
    pub fn find_by_owner(&self, needle: &str) -> Option<RecordSnapshot> {
        self.lock()
            .iter()
            .find(|r| r.owner.matches(needle))
            .map(Self::snapshot)
    }

    /// Returns the next record with a pending status change, starting after
    /// `cursor` in insertion order, clearing the flag on return.
    ///
    /// Repeated calls with `None` drain all pending events; order is table
    /// insertion order, not event arrival order.
    pub fn next_event(&self, cursor: Option<Pid>) -> Option<RecordSnapshot> {
        let mut records = self.lock();
        let start = match cursor {
            Some(pid) => records
                .iter()
                .position(|r| r.pid == pid)
                .map(|i| i + 1)
                .unwrap_or(0),
            None => 0,
        };
        for r in records[start..].iter_mut() {
            if r.status_changed {
                r.status_changed = false;
                return Some(Self::snapshot(r));
            }
        }
        None
    }

    /// Unlinks the record for `pid`; no-op if absent.
    pub fn remove(&self, pid: Pid) {
        self.lock().retain(|r| r.pid != pid);
    }

    /// Records a status observed by the delivery path (the reaper).
    ///
    /// Only flips fields on an existing record; a pid nobody registered
    /// (e.g. a grandchild reaped by accident) is silently dropped. Never
    /// blocks beyond the table lock, never allocates into the table.
    pub fn on_child_status(&self, pid: Pid, status: ChildStatus) {
        {
            let mut records = self.lock();
            match records.iter_mut().find(|r| r.pid == pid) {
                Some(r) => {
                    r.status = Some(status);
                    r.status_changed = true;
                }
                None => return,
            }
        }
        self.notify.notify_waiters();
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Pid of the oldest record, if any. Used by the final shutdown sweep.
    pub fn first_pid(&self) -> Option<Pid> {
        self.lock().first().map(|r| r.pid)
    }

    /// Suspends until the record for `pid` reports a status change, the
    /// record disappears, or `deadline` elapses.
    ///
    /// Returns `true` if the change was observed (or the record is already
    /// gone), `false` on deadline. Does not consume the `status_changed`
    /// flag; that is `next_event`'s job.
    pub async fn wait_exit(&self, pid: Pid, deadline: Duration) -> bool {
        let until = time::Instant::now() + deadline;
        loop {
            // Register interest before checking, so a notification between
            // the check and the await is not lost.
            let notified = self.notify.notified();
            match self.pending_change(pid) {
                None | Some(true) => return true,
                Some(false) => {}
            }
            if time::timeout_at(until, notified).await.is_err() {
                return false;
            }
        }
    }

    /// Suspends until any record reports a pending status change or
    /// `deadline` elapses. The monitoring loop's blocking wait.
    pub async fn wait_event(&self, deadline: Duration) {
        let notified = self.notify.notified();
        if self.has_pending_event() {
            return;
        }
        let _ = time::timeout(deadline, notified).await;
    }

    /// Wakes the monitoring loop's blocking wait; called by the signal
    /// watchers after flipping a flag.
    ///
    /// `notify_one` stores a permit when nobody is waiting yet, so a flag
    /// raised between the loop's flag checks and its blocking wait still
    /// wakes it immediately instead of costing a full cycle.
    pub(crate) fn interrupt(&self) {
        self.notify.notify_one();
    }

    fn pending_change(&self, pid: Pid) -> Option<bool> {
        self.lock()
            .iter()
            .find(|r| r.pid == pid)
            .map(|r| r.status_changed)
    }

    fn has_pending_event(&self) -> bool {
        self.lock().iter().any(|r| r.status_changed)
    }

    fn snapshot(r: &Record) -> RecordSnapshot {
        RecordSnapshot {
            pid: r.pid,
            owner: r.owner.clone(),
            status: r.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(entity: &str, category: &str) -> Owner {
        Owner::Service {
            entity: entity.to_string(),
            category: category.to_string(),
        }
    }

    #[test]
    fn delivery_only_touches_the_addressed_record() {
        let reg = ProcessRegistry::new();
        reg.register(Pid(10), service("dunst", "notifications"));
        reg.register(Pid(11), service("picom", "compositor"));
        reg.register(Pid(12), service("openbox", "window-manager"));
        reg.remove(Pid(11));

        reg.on_child_status(Pid(12), ChildStatus::Exited(0));
        // Deliveries to unknown pids are dropped without effect.
        reg.on_child_status(Pid(11), ChildStatus::Exited(1));
        reg.on_child_status(Pid(999), ChildStatus::Signaled(9));

        let ev = reg.next_event(None).expect("one pending event");
        assert_eq!(ev.pid, Pid(12));
        assert_eq!(ev.status, Some(ChildStatus::Exited(0)));
        assert!(reg.next_event(None).is_none());

        let untouched = reg.find(Pid(10)).unwrap();
        assert_eq!(untouched.status, None);
    }

    #[test]
    fn drain_follows_insertion_order_not_arrival_order() {
        let reg = ProcessRegistry::new();
        reg.register(Pid(1), service("a", "c1"));
        reg.register(Pid(2), service("b", "c2"));
        reg.register(Pid(3), service("c", "c3"));

        reg.on_child_status(Pid(3), ChildStatus::Exited(0));
        reg.on_child_status(Pid(1), ChildStatus::Exited(0));

        assert_eq!(reg.next_event(None).unwrap().pid, Pid(1));
        assert_eq!(reg.next_event(None).unwrap().pid, Pid(3));
        assert!(reg.next_event(None).is_none());
    }

    #[test]
    fn cursor_resumes_after_given_pid() {
        let reg = ProcessRegistry::new();
        reg.register(Pid(1), service("a", "c1"));
        reg.register(Pid(2), service("b", "c2"));
        reg.on_child_status(Pid(1), ChildStatus::Exited(0));
        reg.on_child_status(Pid(2), ChildStatus::Exited(0));

        let first = reg.next_event(None).unwrap();
        assert_eq!(first.pid, Pid(1));
        let second = reg.next_event(Some(first.pid)).unwrap();
        assert_eq!(second.pid, Pid(2));
    }

    #[test]
    fn records_do_not_leak_after_drain_and_remove() {
        let reg = ProcessRegistry::new();
        let before = reg.len();

        reg.register(Pid(42), service("dunst", "notifications"));
        reg.on_child_status(Pid(42), ChildStatus::Exited(0));
        let ev = reg.next_event(None).unwrap();
        assert!(ev.status.unwrap().is_terminal());
        reg.remove(ev.pid);

        assert_eq!(reg.len(), before);
        // Removing again is a no-op.
        reg.remove(Pid(42));
        assert_eq!(reg.len(), before);
    }

    #[test]
    fn find_by_owner_matches_entity_and_category() {
        let reg = ProcessRegistry::new();
        reg.register(Pid(5), service("polybar", "status"));

        assert_eq!(reg.find_by_owner("polybar").unwrap().pid, Pid(5));
        assert_eq!(reg.find_by_owner("status").unwrap().pid, Pid(5));
        assert!(reg.find_by_owner("dock").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_wakes_wait_event_even_when_raised_first() {
        let reg = ProcessRegistry::new();
        // The interrupt arrives before anyone waits; the permit must carry
        // over so the next wait returns at once instead of sleeping the
        // full cycle.
        reg.interrupt();
        let start = time::Instant::now();
        reg.wait_event(Duration::from_secs(1)).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_exit_times_out_without_a_change() {
        let reg = ProcessRegistry::new();
        reg.register(Pid(7), service("stuck", "status"));
        assert!(!reg.wait_exit(Pid(7), Duration::from_millis(1000)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_exit_observes_a_change() {
        let reg = std::sync::Arc::new(ProcessRegistry::new());
        reg.register(Pid(7), service("quick", "status"));

        let waiter = {
            let reg = reg.clone();
            tokio::spawn(async move { reg.wait_exit(Pid(7), Duration::from_secs(10)).await })
        };
        tokio::task::yield_now().await;
        reg.on_child_status(Pid(7), ChildStatus::Exited(0));
        assert!(waiter.await.unwrap());
    }
}
