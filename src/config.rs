//! # Global session configuration.
//!
//! [`SessionConfig`] bundles runtime tuning (shutdown grace, health-check
//! deadline, monitoring cycle) with the user's per-category preferences
//! ([`SessionPrefs`]).
//!
//! Preferences are the output of an external INI parser (see the
//! [`ConfigSource`](crate::ConfigSource) collaborator); the supervisor only
//! interprets them. The sentinel value [`PREFERENCE_NONE`] disables a
//! category outright.
//!
//! ## Field semantics
//! - `grace`: per-process wait between SIGTERM and SIGKILL during shutdown
//! - `health_deadline`: hard cap on a single health-check run
//! - `cycle`: upper bound on one monitoring-loop iteration
//! - `wm_settle`: pause after launching the window manager before the rest
//!   of the session is brought up

use std::collections::HashMap;
use std::time::Duration;

/// Preference sentinel that disables a category ("do not run anything").
pub const PREFERENCE_NONE: &str = "none";

/// Global configuration for the session runtime.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Maximum time to wait for a child to exit after SIGTERM before it is
    /// force-killed. Applied uniformly during reload and shutdown.
    pub grace: Duration,

    /// Hard deadline for one health-check command. Without one, a hung test
    /// command stalls the whole session, so the deadline is mandatory.
    pub health_deadline: Duration,

    /// Upper bound on one monitoring-loop iteration. The loop wakes earlier
    /// when a child changes state or a signal flag is raised.
    pub cycle: Duration,

    /// Pause after launching the window manager, giving it time to take the
    /// display before the remaining daemons start.
    pub wm_settle: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages
    /// observe `Lagged` and skip older items. Minimum value is 1 (enforced
    /// by the bus).
    pub bus_capacity: usize,

    /// Suppresses resolution and launch of the window-manager category.
    pub no_window_manager: bool,

    /// User preferences, normally re-read on reload via a
    /// [`ConfigSource`](crate::ConfigSource).
    pub prefs: SessionPrefs,
}

impl Default for SessionConfig {
    /// Default configuration:
    ///
    /// - `grace = 1000ms` (SIGTERM → SIGKILL escalation window)
    /// - `health_deadline = 5s`
    /// - `cycle = 1s`
    /// - `wm_settle = 3s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            grace: Duration::from_millis(1000),
            health_deadline: Duration::from_secs(5),
            cycle: Duration::from_secs(1),
            wm_settle: Duration::from_secs(3),
            bus_capacity: 1024,
            no_window_manager: false,
            prefs: SessionPrefs::default(),
        }
    }
}

/// User preferences as produced by the external config parser.
///
/// One entry per category name; the value is either the identifier of the
/// preferred entity or [`PREFERENCE_NONE`]. For optional categories
/// (applets/autostart) the value is a space-separated identifier list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionPrefs {
    /// Category name → preferred entity identifier (or sentinel).
    pub preferences: HashMap<String, String>,
    /// `no-window-manager` key of the `daemons` section.
    pub no_window_manager: bool,
    /// `keyboard-layout` key of the `input` section, passed verbatim to the
    /// display hook.
    pub keyboard_layout: Option<String>,
}

impl SessionPrefs {
    /// Sets a category preference (builder-style helper, mostly for tests
    /// and embedders constructing preferences programmatically).
    pub fn with_preference(mut self, category: impl Into<String>, pref: impl Into<String>) -> Self {
        self.preferences.insert(category.into(), pref.into());
        self
    }
}
