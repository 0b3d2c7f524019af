//! # Selector: preference-and-fallback resolution for a category.
//!
//! Resolution order:
//! 1. preference `none` → category disabled, no entity
//! 2. preference naming an existing member → that entity, unconditionally
//!    (an explicit choice is trusted without a health check; predictability
//!    of user configuration wins over safety here)
//! 3. fallback disallowed → no entity
//! 4. first `default`-flagged member passing its health check
//! 5. first member of any kind passing its health check
//! 6. no entity (the caller decides whether that is fatal)
//!
//! The health check spawns the entity's test command through the registry
//! and suspends until it exits, with a hard deadline; without one, a hung
//! test command would stall the whole supervisor.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::error::SessionError;
use crate::events::{Bus, Event, EventKind};
use crate::model::{CategoryId, EntityId, ModelStore, Preference};
use crate::registry::{ChildStatus, Owner, ProcessDriver, ProcessRegistry, TermSignal};

/// Resolves categories to entities, health-checking fallback candidates.
pub struct Selector {
    registry: Arc<ProcessRegistry>,
    driver: Arc<dyn ProcessDriver>,
    bus: Bus,
    health_deadline: Duration,
}

impl Selector {
    /// Creates a selector running health checks through the given registry
    /// and driver.
    pub fn new(
        registry: Arc<ProcessRegistry>,
        driver: Arc<dyn ProcessDriver>,
        bus: Bus,
        health_deadline: Duration,
    ) -> Self {
        Self {
            registry,
            driver,
            bus,
            health_deadline,
        }
    }

    /// Resolves `cat` to zero or one entity.
    ///
    /// Errors are reserved for fatal conditions (spawn failure during a
    /// health check); an unresolvable category is `Ok(None)`.
    pub async fn select(
        &self,
        store: &ModelStore,
        cat: CategoryId,
    ) -> Result<Option<EntityId>, SessionError> {
        Ok(self.select_checked(store, cat).await?.map(|(ent, _)| ent))
    }

    /// Like [`select`](Self::select), additionally reporting whether the
    /// winner already passed its health check during resolution: fallback
    /// winners have, a trusted explicit preference has not. Callers that
    /// health-check before use can skip the duplicate run.
    pub async fn select_checked(
        &self,
        store: &ModelStore,
        cat: CategoryId,
    ) -> Result<Option<(EntityId, bool)>, SessionError> {
        let category = store.category(cat);

        match category.preference() {
            Preference::Disabled => return Ok(None),
            Preference::Named(wanted) => {
                if let Some(ent) = store.find_entity(wanted, Some(category.name())) {
                    self.bus.publish(
                        Event::new(EventKind::EntitySelected)
                            .with_entity(wanted)
                            .with_category(category.name()),
                    );
                    return Ok(Some((ent, false)));
                }
                if !category.fallback_allowed() {
                    return Ok(None);
                }
                warn!(
                    "preferred entity '{wanted}' not found in category '{}', using fallback",
                    category.name()
                );
            }
            Preference::Unset => {
                if !category.fallback_allowed() {
                    return Ok(None);
                }
            }
        }

        // Defaults first, then every member, both in registration order.
        for &ent in category.members() {
            if !store.entity(ent).is_default() {
                continue;
            }
            if self.health_check(store, ent).await? {
                return Ok(Some((self.selected(store, ent, category.name()), true)));
            }
        }
        for &ent in category.members() {
            if store.entity(ent).is_default() {
                // Already failed in the defaults pass.
                continue;
            }
            if self.health_check(store, ent).await? {
                return Ok(Some((self.selected(store, ent, category.name()), true)));
            }
        }

        Ok(None)
    }

    fn selected(&self, store: &ModelStore, ent: EntityId, category: &str) -> EntityId {
        self.bus.publish(
            Event::new(EventKind::EntitySelected)
                .with_entity(store.entity(ent).id())
                .with_category(category),
        );
        ent
    }

    /// Runs the entity's health-check command.
    ///
    /// An entity without a test command is trivially healthy. Otherwise the
    /// command is spawned through the registry, awaited with the configured
    /// deadline, and its temporary record always removed afterward; an
    /// overrun check is killed outright. Exit code 0 means healthy.
    pub async fn health_check(
        &self,
        store: &ModelStore,
        ent: EntityId,
    ) -> Result<bool, SessionError> {
        let entity = store.entity(ent);
        let Some(test) = entity.test() else {
            return Ok(true);
        };

        let owner = Owner::Check {
            entity: entity.id().to_string(),
        };
        let pid = self.registry.spawn(self.driver.as_ref(), test, owner)?;

        let healthy = if self.registry.wait_exit(pid, self.health_deadline).await {
            match self.registry.find(pid).and_then(|r| r.status) {
                Some(ChildStatus::Exited(0)) => true,
                Some(status) => {
                    self.fail(entity.id(), &status.to_string());
                    false
                }
                None => false,
            }
        } else {
            // Deadline overrun: the check is hung, kill it.
            let _ = self.driver.signal(pid, TermSignal::Kill);
            self.fail(entity.id(), "health check deadline exceeded");
            false
        };

        // Dropping the record discards its pending event with it, so the
        // monitoring loop never sees check processes.
        self.registry.remove(pid);
        debug!(
            "health check for '{}': {}",
            entity.id(),
            if healthy { "passed" } else { "failed" }
        );
        Ok(healthy)
    }

    fn fail(&self, entity: &str, reason: &str) {
        self.bus.publish(
            Event::new(EventKind::HealthCheckFailed)
                .with_entity(entity)
                .with_reason(reason),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionPrefs;
    use crate::model::EntityDescriptor;
    use crate::testing::FakeDriver;

    fn descriptor(id: &str, category: &str, default: bool, test: Option<&str>) -> EntityDescriptor {
        EntityDescriptor {
            id: id.to_string(),
            command: Some(format!("{id} --run")),
            test: test.map(str::to_string),
            category: Some(category.to_string()),
            default: Some(default),
            ..EntityDescriptor::default()
        }
    }

    fn selector_with(driver: Arc<FakeDriver>) -> Selector {
        Selector::new(
            driver.registry(),
            driver,
            Bus::new(16),
            Duration::from_secs(5),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn preference_none_disables_the_category() {
        let driver = FakeDriver::arc();
        let mut store = ModelStore::new();
        store.load(&[vec![descriptor("picom", "compositor", true, None)]]);
        store.apply_prefs(&SessionPrefs::default().with_preference("compositor", "none"));

        let cat = store.find_category("compositor").unwrap();
        let sel = selector_with(driver);
        assert_eq!(sel.select(&store, cat).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_preference_is_trusted_without_health_check() {
        let driver = FakeDriver::arc();
        // The preferred entity's test command would fail; it must not run.
        driver.plan_exit("check-kitty", 1);

        let mut store = ModelStore::new();
        store.load(&[vec![
            descriptor("alacritty", "terminal", true, None),
            descriptor("kitty", "terminal", false, Some("check-kitty")),
        ]]);
        store.apply_prefs(&SessionPrefs::default().with_preference("terminal", "kitty"));

        let cat = store.find_category("terminal").unwrap();
        let sel = selector_with(driver.clone());
        let chosen = sel.select(&store, cat).await.unwrap().unwrap();
        assert_eq!(store.entity(chosen).id(), "kitty");
        assert!(driver.spawned_commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn defaults_are_tried_before_other_members() {
        let driver = FakeDriver::arc();
        driver.plan_exit("check-a", 1); // failing default
        driver.plan_exit("check-b", 0); // healthy default
        driver.plan_exit("check-c", 0); // healthy non-default, must not win

        let mut store = ModelStore::new();
        store.load(&[vec![
            descriptor("c", "notifications", false, Some("check-c")),
            descriptor("a", "notifications", true, Some("check-a")),
            descriptor("b", "notifications", true, Some("check-b")),
        ]]);

        let cat = store.find_category("notifications").unwrap();
        let sel = selector_with(driver.clone());
        let chosen = sel.select(&store, cat).await.unwrap().unwrap();
        assert_eq!(store.entity(chosen).id(), "b");
        // "c" was never health-checked: "b" won in the defaults pass.
        assert_eq!(driver.spawned_commands(), vec!["check-a", "check-b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn falls_through_to_non_defaults_when_all_defaults_fail() {
        let driver = FakeDriver::arc();
        driver.plan_exit("check-a", 1);
        driver.plan_exit("check-c", 0);

        let mut store = ModelStore::new();
        store.load(&[vec![
            descriptor("a", "notifications", true, Some("check-a")),
            descriptor("c", "notifications", false, Some("check-c")),
        ]]);

        let cat = store.find_category("notifications").unwrap();
        let sel = selector_with(driver.clone());
        let chosen = sel.select(&store, cat).await.unwrap().unwrap();
        assert_eq!(store.entity(chosen).id(), "c");
    }

    #[tokio::test(start_paused = true)]
    async fn select_checked_reports_health_check_provenance() {
        let driver = FakeDriver::arc();
        driver.plan_exit("check-kitty", 0);

        let mut store = ModelStore::new();
        store.load(&[vec![
            descriptor("alacritty", "terminal", true, None),
            descriptor("kitty", "terminal", false, Some("check-kitty")),
        ]]);
        let cat = store.find_category("terminal").unwrap();
        let sel = selector_with(driver.clone());

        // A fallback winner counts as already checked.
        let (ent, checked) = sel.select_checked(&store, cat).await.unwrap().unwrap();
        assert_eq!(store.entity(ent).id(), "alacritty");
        assert!(checked);

        // A trusted explicit preference does not.
        store.apply_prefs(&SessionPrefs::default().with_preference("terminal", "kitty"));
        let (ent, checked) = sel.select_checked(&store, cat).await.unwrap().unwrap();
        assert_eq!(store.entity(ent).id(), "kitty");
        assert!(!checked);
    }

    #[tokio::test(start_paused = true)]
    async fn no_fallback_means_no_selection() {
        let driver = FakeDriver::arc();
        let mut store = ModelStore::new();
        // "dock" is seeded with fallback disallowed.
        store.load(&[vec![descriptor("polybar", "dock", true, None)]]);

        let cat = store.find_category("dock").unwrap();
        let sel = selector_with(driver);
        assert_eq!(sel.select(&store, cat).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_health_check_is_killed_and_fails() {
        let driver = FakeDriver::arc();
        driver.plan_hang("check-stuck");

        let mut store = ModelStore::new();
        store.load(&[vec![descriptor("stuck", "notifications", true, Some("check-stuck"))]]);
        let ent = store.find_entity("stuck", None).unwrap();

        let sel = selector_with(driver.clone());
        assert!(!sel.health_check(&store, ent).await.unwrap());
        // The check process got a SIGKILL and its record was removed.
        assert!(driver
            .signals()
            .iter()
            .any(|(_, sig)| *sig == TermSignal::Kill));
        assert!(driver.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn health_check_leaves_no_record_behind() {
        let driver = FakeDriver::arc();
        driver.plan_exit("check-ok", 0);

        let mut store = ModelStore::new();
        store.load(&[vec![descriptor("fine", "notifications", true, Some("check-ok"))]]);
        let ent = store.find_entity("fine", None).unwrap();

        let sel = selector_with(driver.clone());
        assert!(sel.health_check(&store, ent).await.unwrap());
        assert!(driver.registry().is_empty());
        assert!(driver.registry().next_event(None).is_none());
    }
}
