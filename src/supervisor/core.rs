//! # Supervisor: the session state machine.
//!
//! Owns the model store, the process registry, the selector, and the event
//! bus, and drives the session through its phases:
//!
//! ```text
//! Startup ──► Running ⇄ Reloading
//!                │
//!                ▼
//!          ShuttingDown ──► Terminated
//! ```
//!
//! ## Key responsibilities
//! - resolve and launch one entity per daemon category (all healthy members
//!   for optional categories), export default applications as env vars
//! - drain child exit events every loop tick, ending the session when the
//!   window manager dies outside a supervisor-initiated restart
//! - react to the terminate/reload/wm-restart signal flags
//! - escalate SIGTERM → grace → SIGKILL, guaranteeing every record is
//!   removed even under partial failure
//!
//! ## Rules
//! - Single logical thread of control: the monitoring loop is the only
//!   consumer of registry events and the sole mutator of active pointers.
//! - Exit events are drained to exhaustion before any blocking wait, so an
//!   exit burst cannot lose events.
//! - A supervisor-initiated restart consumes the old process's exit through
//!   the escalation wait, so the monitoring loop never mistakes it for a
//!   session-ending window-manager death.

use std::sync::Arc;

use log::{debug, warn};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::{SessionConfig, SessionPrefs};
use crate::error::SessionError;
use crate::events::{Bus, Event, EventKind};
use crate::hooks::{ConfigSource, DescriptorSource, DisplayHook, Notifier, NullDisplayHook, NullNotifier};
use crate::model::{CategoryId, EntityDescriptor, ModelStore, Preference, Section, WINDOW_MANAGER};
use crate::registry::{spawn_reaper, Owner, Pid, ProcessDriver, ProcessRegistry, RecordSnapshot, ShellDriver, TermSignal};
use crate::select::Selector;
use crate::subscribers::Subscribe;

use super::signals::{self, SignalFlags};

/// Default-application categories and the environment variable each one
/// exports to launched children.
const APP_EXPORTS: &[(&str, &str)] = &[
    ("browser", "BROWSER"),
    ("terminal", "TERMINAL"),
    ("filemanager", "FILEMANAGER"),
    ("dmenu", "LAUNCHER"),
];

/// Session lifecycle phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Loading entities, launching the initial process set.
    Startup,
    /// Steady-state monitoring.
    Running,
    /// Re-reading preferences and restarting daemons.
    Reloading,
    /// Escalating every tracked process down.
    ShuttingDown,
    /// All records cleared; the session is over.
    Terminated,
}

/// Coordinates selection, launching, monitoring, reload, and shutdown for
/// one desktop session. There is exactly one supervisor per session.
pub struct Supervisor {
    cfg: SessionConfig,
    prefs: SessionPrefs,
    store: ModelStore,
    registry: Arc<ProcessRegistry>,
    driver: Arc<dyn ProcessDriver>,
    selector: Selector,
    bus: Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
    flags: Arc<SignalFlags>,
    display: Arc<dyn DisplayHook>,
    notifier: Arc<dyn Notifier>,
    config_source: Option<Arc<dyn ConfigSource>>,
    descriptor_sources: Vec<Arc<dyn DescriptorSource>>,
    descriptor_batches: Vec<Vec<EntityDescriptor>>,
    phase: Phase,
    end: bool,
}

impl Supervisor {
    /// Starts building a supervisor with the given configuration.
    pub fn builder(cfg: SessionConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The process registry (shared with embedders for inspection).
    pub fn registry(&self) -> Arc<ProcessRegistry> {
        Arc::clone(&self.registry)
    }

    /// The entity/category model.
    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// The event bus; subscribe for runtime events.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Runs the session to completion.
    ///
    /// Returns once the session has terminated: either after an orderly
    /// shutdown (`Ok`), or with a fatal error such as an unresolvable
    /// window manager. Every spawned process is escalated down before this
    /// returns, even on the error paths that occur after startup began.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        let token = CancellationToken::new();
        let result = self.run_inner(&token).await;
        token.cancel();
        result
    }

    async fn run_inner(&mut self, token: &CancellationToken) -> Result<(), SessionError> {
        spawn_reaper(Arc::clone(&self.registry), token.clone())?;
        signals::spawn_watchers(
            Arc::clone(&self.flags),
            Arc::clone(&self.registry),
            token.clone(),
        )?;
        self.subscriber_listener(token);

        let started = self.startup().await;
        if let Err(e) = started {
            // Partial startup still launched processes; tear them down.
            self.phase = Phase::ShuttingDown;
            self.shutdown_all().await;
            self.phase = Phase::Terminated;
            return Err(e);
        }

        self.phase = Phase::Running;
        self.monitor().await;

        self.phase = Phase::ShuttingDown;
        self.shutdown_all().await;
        self.phase = Phase::Terminated;
        self.bus.publish(Event::new(EventKind::SessionEnded));
        Ok(())
    }

    // ---------------------------
    // Startup
    // ---------------------------

    async fn startup(&mut self) -> Result<(), SessionError> {
        self.phase = Phase::Startup;

        let mut batches = std::mem::take(&mut self.descriptor_batches);
        for src in &self.descriptor_sources {
            match src.descriptors() {
                Ok(batch) => batches.push(batch),
                Err(e) => warn!("descriptor source failed, skipping: {e}"),
            }
        }
        self.store.load(&batches);
        self.reload_prefs();

        self.display.load_wallpaper();
        if let Some(layout) = self.prefs.keyboard_layout.clone() {
            self.display.set_keyboard_layout(&layout);
        }
        self.display.load_display_conf();

        self.export_applications().await?;

        if !self.window_manager_suppressed() {
            let launched = match self.store.find_category(WINDOW_MANAGER) {
                Some(wm) => self.launch_category(wm).await?,
                None => false,
            };
            if !launched {
                return Err(SessionError::WindowManagerUnresolved);
            }
            // Give the window manager time to take the display before the
            // remaining daemons start.
            time::sleep(self.cfg.wm_settle).await;
        }

        self.launch_daemons().await?;
        Ok(())
    }

    fn window_manager_suppressed(&self) -> bool {
        self.cfg.no_window_manager || self.prefs.no_window_manager
    }

    /// Re-reads preferences from the config source (keeping the previous
    /// ones on failure) and applies them to the model.
    fn reload_prefs(&mut self) {
        if let Some(source) = &self.config_source {
            match source.load_prefs() {
                Ok(prefs) => self.prefs = prefs,
                Err(e) => warn!("unable to reload preferences, keeping previous: {e}"),
            }
        }
        self.store.apply_prefs(&self.prefs);
    }

    /// Daemon-section categories except the window manager, with their
    /// optional flag, in seed order.
    fn daemon_categories(&self) -> Vec<(CategoryId, bool)> {
        self.store
            .category_ids()
            .filter(|&cat| {
                let c = self.store.category(cat);
                c.section() == Section::Daemons && c.name() != WINDOW_MANAGER
            })
            .map(|cat| (cat, self.store.category(cat).is_optional()))
            .collect()
    }

    async fn launch_daemons(&mut self) -> Result<(), SessionError> {
        for (cat, optional) in self.daemon_categories() {
            if optional {
                self.launch_optionals(cat).await?;
            } else {
                self.launch_category(cat).await?;
            }
        }
        Ok(())
    }

    /// Resolves and launches one entity for `cat`. Returns whether a
    /// process was actually started.
    async fn launch_category(&mut self, cat: CategoryId) -> Result<bool, SessionError> {
        let Some(ent) = self.selector.select(&self.store, cat).await? else {
            let category = self.store.category(cat);
            match category.preference() {
                Preference::Disabled => {
                    self.bus.publish(
                        Event::new(EventKind::CategoryDisabled).with_category(category.name()),
                    );
                }
                _ if category.members().is_empty() => {
                    // Seeded but unconfigured; not worth a warning.
                    debug!("no entities declared for category '{}'", category.name());
                }
                _ => {
                    warn!("unable to resolve category '{}'", category.name());
                    self.bus.publish(
                        Event::new(EventKind::CategoryUnresolved)
                            .with_category(category.name())
                            .with_reason("no healthy candidate"),
                    );
                }
            }
            return Ok(false);
        };

        let (entity_id, command) = {
            let e = self.store.entity(ent);
            (e.id().to_string(), e.command().to_string())
        };
        let category_name = self.store.category(cat).name().to_string();
        if command.is_empty() {
            warn!("entity '{entity_id}' has no launch command");
            return Ok(false);
        }

        let pid = self.registry.spawn(
            self.driver.as_ref(),
            &command,
            Owner::Service {
                entity: entity_id.clone(),
                category: category_name.clone(),
            },
        )?;
        self.store.set_active(cat, ent);
        self.bus.publish(
            Event::new(EventKind::EntityLaunched)
                .with_entity(entity_id)
                .with_category(category_name)
                .with_pid(pid),
        );
        Ok(true)
    }

    /// Launches every member of an optional category that passes its health
    /// check. Optional categories have no active pointer; each member runs
    /// (or not) independently.
    ///
    /// A preference on an optional category is a space-separated identifier
    /// allowlist; members not on the list are skipped.
    async fn launch_optionals(&mut self, cat: CategoryId) -> Result<(), SessionError> {
        let allow: Option<Vec<String>> = match self.store.category(cat).preference() {
            Preference::Disabled => return Ok(()),
            Preference::Named(list) => {
                Some(list.split_whitespace().map(str::to_string).collect())
            }
            Preference::Unset => None,
        };
        let members: Vec<_> = self.store.category(cat).members().to_vec();
        let category_name = self.store.category(cat).name().to_string();

        for ent in members {
            let (entity_id, command) = {
                let e = self.store.entity(ent);
                (e.id().to_string(), e.command().to_string())
            };
            if let Some(allow) = &allow {
                if !allow.iter().any(|a| *a == entity_id) {
                    continue;
                }
            }
            if command.is_empty() {
                continue;
            }
            if !self.selector.health_check(&self.store, ent).await? {
                continue;
            }
            let pid = self.registry.spawn(
                self.driver.as_ref(),
                &command,
                Owner::Service {
                    entity: entity_id.clone(),
                    category: category_name.clone(),
                },
            )?;
            self.bus.publish(
                Event::new(EventKind::EntityLaunched)
                    .with_entity(entity_id)
                    .with_category(category_name.clone())
                    .with_pid(pid),
            );
        }
        Ok(())
    }

    /// Resolves each default-application category and exports its launch
    /// command as an environment variable for children to inherit.
    ///
    /// First resolution wins: a variable inherited from the parent
    /// environment is respected until this supervisor has exported the
    /// category once; afterwards re-resolution (reload) may overwrite it.
    async fn export_applications(&mut self) -> Result<(), SessionError> {
        for (cat_name, var) in APP_EXPORTS {
            let Some(cat) = self.store.find_category(cat_name) else {
                continue;
            };
            let Some((ent, checked)) = self.selector.select_checked(&self.store, cat).await?
            else {
                continue;
            };
            // Fallback winners were health-checked during resolution; only
            // a trusted explicit preference still needs one before export.
            if !checked && !self.selector.health_check(&self.store, ent).await? {
                continue;
            }
            let command = self.store.entity(ent).command().to_string();
            if command.is_empty() {
                continue;
            }
            if std::env::var_os(var).is_none() || self.store.is_exported(cat) {
                std::env::set_var(var, &command);
                self.store.mark_exported(cat);
            }
        }
        Ok(())
    }

    // ---------------------------
    // Monitoring
    // ---------------------------

    async fn monitor(&mut self) {
        while !self.end {
            self.drain_events();
            if self.end {
                break;
            }

            if self.flags.take_terminate() {
                self.bus.publish(Event::new(EventKind::ShutdownRequested));
                break;
            }
            if self.flags.take_reload() {
                self.bus.publish(Event::new(EventKind::ReloadRequested));
                // A reload restarts the daemons anyway; a pending
                // wm-restart request is folded into it.
                self.flags.take_wm_restart();
                if let Err(e) = self.reload_daemons().await {
                    warn!("daemon reload failed: {e}");
                }
                continue;
            }
            if self.flags.take_wm_restart() {
                self.bus.publish(Event::new(EventKind::WmRestartRequested));
                if let Err(e) = self.restart_window_manager().await {
                    warn!("window manager restart failed: {e}");
                }
                continue;
            }

            if self.display.screen_changed() {
                debug!("screen configuration has changed");
                self.display.save_display_conf();
                self.display.load_wallpaper();
            }

            self.registry.wait_event(self.cfg.cycle).await;
        }
    }

    /// Drains all pending exit events, in registry insertion order.
    fn drain_events(&mut self) {
        while let Some(ev) = self.registry.next_event(None) {
            self.handle_child_event(ev);
        }
    }

    fn handle_child_event(&mut self, ev: RecordSnapshot) {
        let Some(status) = ev.status else { return };
        debug!("process {} ({}) {}", ev.pid, ev.owner.entity(), status);
        if !status.is_terminal() {
            // Stopped/continued: bookkeeping only, the record stays.
            return;
        }

        if let Owner::Service { entity, category } = &ev.owner {
            if category == WINDOW_MANAGER {
                // A wm death the supervisor did not initiate ends the
                // session; initiated restarts never reach this path because
                // escalation removes the record before the event is drained.
                self.end = true;
            }
            self.notifier
                .notify("Service terminated", &format!("{entity}: {status}"));
            if let Some(cat) = self.store.find_category(category) {
                if let Some(active) = self.store.category(cat).active() {
                    if self.store.entity(active).id() == *entity {
                        self.store.clear_active(cat);
                    }
                }
            }
        }

        self.bus.publish(
            Event::new(EventKind::EntityExited)
                .with_entity(ev.owner.entity())
                .with_pid(ev.pid)
                .with_reason(status.to_string()),
        );
        self.registry.remove(ev.pid);
    }

    // ---------------------------
    // Reload
    // ---------------------------

    /// SIGUSR1: re-read preferences, take every non-wm daemon down, bring
    /// the set back up under the new preferences.
    async fn reload_daemons(&mut self) -> Result<(), SessionError> {
        self.phase = Phase::Reloading;
        self.reload_prefs();

        let categories = self.daemon_categories();
        for &(cat, optional) in &categories {
            if optional {
                self.shutdown_optionals(cat).await;
            } else {
                self.shutdown_category(cat).await;
            }
        }

        self.export_applications().await?;
        for (cat, optional) in categories {
            if optional {
                self.launch_optionals(cat).await?;
            } else {
                self.launch_category(cat).await?;
            }
        }

        self.phase = Phase::Running;
        Ok(())
    }

    /// SIGUSR2: restart only the window-manager category.
    ///
    /// The old process's exit is consumed by the escalation wait, so the
    /// monitoring loop does not treat it as a session-ending death.
    async fn restart_window_manager(&mut self) -> Result<(), SessionError> {
        if self.window_manager_suppressed() {
            return Ok(());
        }
        self.phase = Phase::Reloading;
        self.reload_prefs();

        if let Some(wm) = self.store.find_category(WINDOW_MANAGER) {
            self.shutdown_category(wm).await;
            if !self.launch_category(wm).await? {
                warn!("window manager did not come back after restart; ending session");
                self.end = true;
            }
        }

        self.phase = Phase::Running;
        Ok(())
    }

    // ---------------------------
    // Shutdown
    // ---------------------------

    /// Takes down the process of a category's active entity, if any.
    async fn shutdown_category(&mut self, cat: CategoryId) {
        let name = self.store.category(cat).name().to_string();
        self.store.clear_active(cat);
        if let Some(rec) = self.registry.find_by_owner(&name) {
            self.escalate(rec.pid).await;
        }
    }

    /// Takes down every running member of an optional category.
    async fn shutdown_optionals(&mut self, cat: CategoryId) {
        let member_ids: Vec<String> = self
            .store
            .category(cat)
            .members()
            .iter()
            .map(|&e| self.store.entity(e).id().to_string())
            .collect();
        for id in member_ids {
            if let Some(rec) = self.registry.find_by_owner(&id) {
                self.escalate(rec.pid).await;
            }
        }
    }

    /// Two-phase termination: graceful signal, bounded wait, forced kill.
    /// The record is removed unconditionally afterwards; this is the only
    /// timeout/retry policy in the system and is applied uniformly.
    async fn escalate(&self, pid: Pid) {
        if self.driver.signal(pid, TermSignal::Terminate).is_ok()
            && !self.registry.wait_exit(pid, self.cfg.grace).await
        {
            self.bus
                .publish(Event::new(EventKind::EscalatedKill).with_pid(pid));
            let _ = self.driver.signal(pid, TermSignal::Kill);
        }
        self.registry.remove(pid);
    }

    /// Final teardown: every category with an active entity, then every
    /// record still in the table (health checks in flight, optionals,
    /// orphaned rows).
    async fn shutdown_all(&mut self) {
        let active: Vec<CategoryId> = self
            .store
            .category_ids()
            .filter(|&cat| self.store.category(cat).active().is_some())
            .collect();
        for cat in active {
            self.shutdown_category(cat).await;
        }
        while let Some(pid) = self.registry.first_pid() {
            self.escalate(pid).await;
        }
    }

    /// Forwards bus events to the registered subscribers, sequentially.
    fn subscriber_listener(&self, token: &CancellationToken) {
        if self.subscribers.is_empty() {
            return;
        }
        let mut rx = self.bus.subscribe();
        let subs = self.subscribers.clone();
        let token = token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => {
                            for s in &subs {
                                s.on_event(&ev).await;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("subscriber listener lagged, skipped {n} events");
                        }
                    }
                }
            }
        });
    }
}

/// Builder for constructing a [`Supervisor`] with optional collaborators.
pub struct SupervisorBuilder {
    cfg: SessionConfig,
    registry: Option<Arc<ProcessRegistry>>,
    driver: Option<Arc<dyn ProcessDriver>>,
    display: Option<Arc<dyn DisplayHook>>,
    notifier: Option<Arc<dyn Notifier>>,
    config_source: Option<Arc<dyn ConfigSource>>,
    descriptor_sources: Vec<Arc<dyn DescriptorSource>>,
    descriptor_batches: Vec<Vec<EntityDescriptor>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SessionConfig) -> Self {
        Self {
            cfg,
            registry: None,
            driver: None,
            display: None,
            notifier: None,
            config_source: None,
            descriptor_sources: Vec::new(),
            descriptor_batches: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    /// Supplies pre-parsed descriptor batches (highest priority first).
    pub fn with_descriptors(mut self, batches: Vec<Vec<EntityDescriptor>>) -> Self {
        self.descriptor_batches = batches;
        self
    }

    /// Adds descriptor sources, queried at startup after any pre-parsed
    /// batches.
    pub fn with_descriptor_sources(mut self, sources: Vec<Arc<dyn DescriptorSource>>) -> Self {
        self.descriptor_sources = sources;
        self
    }

    /// Substitutes the process driver (tests, sandboxing).
    pub fn with_driver(mut self, driver: Arc<dyn ProcessDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Shares an externally created registry.
    pub fn with_registry(mut self, registry: Arc<ProcessRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the display hook.
    pub fn with_display(mut self, display: Arc<dyn DisplayHook>) -> Self {
        self.display = Some(display);
        self
    }

    /// Sets the notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Sets the config source consulted at startup and on every reload.
    pub fn with_config_source(mut self, source: Arc<dyn ConfigSource>) -> Self {
        self.config_source = Some(source);
        self
    }

    /// Sets event subscribers for observability.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the supervisor.
    pub fn build(self) -> Supervisor {
        let bus = Bus::new(self.cfg.bus_capacity);
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(ProcessRegistry::new()));
        let driver: Arc<dyn ProcessDriver> = self.driver.unwrap_or_else(|| Arc::new(ShellDriver));
        let selector = Selector::new(
            Arc::clone(&registry),
            Arc::clone(&driver),
            bus.clone(),
            self.cfg.health_deadline,
        );
        let prefs = self.cfg.prefs.clone();

        Supervisor {
            cfg: self.cfg,
            prefs,
            store: ModelStore::new(),
            registry,
            driver,
            selector,
            bus,
            subscribers: self.subscribers,
            flags: Arc::new(SignalFlags::default()),
            display: self.display.unwrap_or_else(|| Arc::new(NullDisplayHook)),
            notifier: self.notifier.unwrap_or_else(|| Arc::new(NullNotifier)),
            config_source: self.config_source,
            descriptor_sources: self.descriptor_sources,
            descriptor_batches: self.descriptor_batches,
            phase: Phase::Startup,
            end: false,
        }
    }
}
