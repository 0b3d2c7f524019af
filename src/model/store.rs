//! # ModelStore: arena and lookup for entities and categories.
//!
//! The store is seeded with the well-known category table (window manager,
//! compositor, notifications, polkit, ... plus the default-application
//! slots); categories named by descriptors but absent from the table are
//! created on demand with conservative flags (fallback allowed, required).
//!
//! ## Rules
//! - An entity belongs to at most one category at a time; re-binding removes
//!   it from the previous member list first.
//! - A category's active pointer, if set, refers to a member of that
//!   category (checked by `set_active`).
//! - `load()` is idempotent per store; reloading the entity set means
//!   constructing a fresh store.

use log::{debug, warn};

use crate::config::SessionPrefs;

use super::category::{Category, CategoryId, Section};
use super::entity::{Entity, EntityDescriptor, EntityId};

/// Well-known categories and their resolution flags, in the order users
/// expect to see them. `(name, section, fallback, optional)`.
const SEED_CATEGORIES: &[(&str, Section, bool, bool)] = &[
    ("window-manager", Section::Daemons, true, false),
    ("compositor", Section::Daemons, true, false),
    ("dock", Section::Daemons, false, false),
    ("hotkeys", Section::Daemons, false, false),
    ("notifications", Section::Daemons, true, false),
    ("polkit", Section::Daemons, true, false),
    ("power", Section::Daemons, true, false),
    ("status", Section::Daemons, false, false),
    ("applets", Section::Daemons, false, true),
    ("optional", Section::Daemons, false, true),
    ("browser", Section::Applications, true, false),
    ("dmenu", Section::Applications, true, false),
    ("filemanager", Section::Applications, true, false),
    ("terminal", Section::Applications, true, false),
];

/// Process-wide model of categories and their candidate entities.
///
/// Owned by the supervisor; never shared across processes. The supervisor is
/// the sole mutator of active pointers.
#[derive(Clone, Debug)]
pub struct ModelStore {
    entities: Vec<Entity>,
    categories: Vec<Category>,
    loaded: bool,
}

impl Default for ModelStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelStore {
    /// Creates a store seeded with the well-known category table.
    pub fn new() -> Self {
        let categories = SEED_CATEGORIES
            .iter()
            .map(|(name, section, fallback, optional)| {
                Category::new(name, *section, *fallback, *optional)
            })
            .collect();
        Self {
            entities: Vec::new(),
            categories,
            loaded: false,
        }
    }

    /// Populates entities from descriptor batches in priority order.
    ///
    /// The first batch that defines an identifier wins; later batches may
    /// not override it. A second call to `load` is a no-op: reload semantics
    /// require discarding and reconstructing the whole store.
    pub fn load(&mut self, batches: &[Vec<EntityDescriptor>]) {
        if self.loaded {
            debug!("entity set already loaded; ignoring load request");
            return;
        }
        self.loaded = true;

        let mut seen_before: usize = 0;
        for batch in batches {
            for d in batch {
                if d.id.is_empty() {
                    warn!("descriptor without an identifier ignored");
                    continue;
                }
                // Identifiers already defined by a higher-priority batch are
                // left untouched; ids repeated within one batch still merge.
                if let Some(existing) = self.find_entity(&d.id, None) {
                    if existing.0 < seen_before {
                        debug!("descriptor for '{}' shadowed by a higher-priority source", d.id);
                        continue;
                    }
                }
                let ent = self.entity_or_insert(&d.id);
                self.entities[ent.0].apply(d);
                if let Some(category) = &d.category {
                    self.bind_category(ent, category);
                }
            }
            seen_before = self.entities.len();
        }
    }

    /// Whether `load` has already run for this store.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Applies user preferences to the matching categories.
    ///
    /// Unknown preference keys are logged and ignored, never fatal. Safe to
    /// call again on reload.
    pub fn apply_prefs(&mut self, prefs: &SessionPrefs) {
        for (name, value) in &prefs.preferences {
            match self.find_category(name) {
                Some(cat) => self.categories[cat.0].preference = Some(value.clone()),
                None => warn!("preference for unknown category '{name}' ignored"),
            }
        }
    }

    /// Looks up a category by name.
    pub fn find_category(&self, name: &str) -> Option<CategoryId> {
        self.categories
            .iter()
            .position(|c| c.name == name)
            .map(CategoryId)
    }

    /// Looks up an entity by identifier, optionally restricted to one
    /// category's members.
    pub fn find_entity(&self, id_name: &str, category: Option<&str>) -> Option<EntityId> {
        match category {
            None => self
                .entities
                .iter()
                .position(|e| e.id == id_name)
                .map(EntityId),
            Some(name) => {
                let cat = self.find_category(name)?;
                self.categories[cat.0]
                    .members
                    .iter()
                    .copied()
                    .find(|&e| self.entities[e.0].id == id_name)
            }
        }
    }

    /// Returns the entity for an id. Panics on a dangling id, which cannot
    /// be produced through the public API.
    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }

    /// Returns the category for an id.
    pub fn category(&self, id: CategoryId) -> &Category {
        &self.categories[id.0]
    }

    /// All category ids in seed/creation order.
    pub fn category_ids(&self) -> impl Iterator<Item = CategoryId> {
        (0..self.categories.len()).map(CategoryId)
    }

    /// Binds `entity` as the category's active member.
    ///
    /// The membership invariant is enforced here: binding a non-member is a
    /// logic error and is refused with a warning.
    pub(crate) fn set_active(&mut self, cat: CategoryId, entity: EntityId) {
        if !self.categories[cat.0].members.contains(&entity) {
            warn!(
                "refusing to activate '{}' outside its category '{}'",
                self.entities[entity.0].id, self.categories[cat.0].name
            );
            return;
        }
        self.categories[cat.0].active = Some(entity);
    }

    /// Clears the category's active pointer.
    pub(crate) fn clear_active(&mut self, cat: CategoryId) {
        self.categories[cat.0].active = None;
    }

    /// Marks a default-application category as exported.
    pub(crate) fn mark_exported(&mut self, cat: CategoryId) {
        self.categories[cat.0].exported = true;
    }

    pub(crate) fn is_exported(&self, cat: CategoryId) -> bool {
        self.categories[cat.0].exported
    }

    /// Returns the entity with this identifier, allocating a placeholder if
    /// it does not exist yet (descriptor attributes may arrive before the
    /// entity is complete).
    pub(crate) fn entity_or_insert(&mut self, id_name: &str) -> EntityId {
        if let Some(id) = self.find_entity(id_name, None) {
            return id;
        }
        self.entities.push(Entity::placeholder(id_name));
        EntityId(self.entities.len() - 1)
    }

    /// Adds `entity` to the named category, creating the category if it is
    /// not part of the seed table. An entity already bound elsewhere is
    /// unbound first.
    pub(crate) fn bind_category(&mut self, entity: EntityId, name: &str) {
        if let Some(old) = self.entities[entity.0].category {
            if self.categories[old.0].name == name {
                return;
            }
            self.categories[old.0].members.retain(|&m| m != entity);
            if self.categories[old.0].active == Some(entity) {
                self.categories[old.0].active = None;
            }
            self.entities[entity.0].category = None;
        }

        let cat = match self.find_category(name) {
            Some(cat) => cat,
            None => {
                self.categories
                    .push(Category::new(name, Section::Daemons, true, false));
                CategoryId(self.categories.len() - 1)
            }
        };
        self.categories[cat.0].members.push(entity);
        self.entities[entity.0].category = Some(cat);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionPrefs;
    use crate::model::Preference;

    fn descriptor(id: &str, category: &str, default: bool) -> EntityDescriptor {
        EntityDescriptor {
            id: id.to_string(),
            command: Some(format!("{id} --run")),
            category: Some(category.to_string()),
            default: Some(default),
            ..EntityDescriptor::default()
        }
    }

    #[test]
    fn load_populates_members_in_registration_order() {
        let mut store = ModelStore::new();
        store.load(&[vec![
            descriptor("picom", "compositor", true),
            descriptor("xcompmgr", "compositor", false),
        ]]);

        let cat = store.find_category("compositor").unwrap();
        let ids: Vec<&str> = store
            .category(cat)
            .members()
            .iter()
            .map(|&e| store.entity(e).id())
            .collect();
        assert_eq!(ids, ["picom", "xcompmgr"]);
    }

    #[test]
    fn first_batch_wins_per_identifier() {
        let mut store = ModelStore::new();
        let mut user = descriptor("picom", "compositor", true);
        user.command = Some("picom --user".to_string());
        let mut system = descriptor("picom", "compositor", true);
        system.command = Some("picom --system".to_string());

        store.load(&[vec![user], vec![system]]);

        let ent = store.find_entity("picom", None).unwrap();
        assert_eq!(store.entity(ent).command(), "picom --user");
        // Only one member despite two descriptors.
        let cat = store.find_category("compositor").unwrap();
        assert_eq!(store.category(cat).members().len(), 1);
    }

    #[test]
    fn load_is_idempotent() {
        let mut store = ModelStore::new();
        store.load(&[vec![descriptor("dunst", "notifications", true)]]);
        store.load(&[vec![descriptor("mako", "notifications", true)]]);
        assert!(store.find_entity("mako", None).is_none());
    }

    #[test]
    fn rebinding_moves_entity_between_categories() {
        let mut store = ModelStore::new();
        store.load(&[vec![descriptor("polybar", "dock", true)]]);
        let ent = store.find_entity("polybar", None).unwrap();

        store.bind_category(ent, "status");

        let dock = store.find_category("dock").unwrap();
        let status = store.find_category("status").unwrap();
        assert!(store.category(dock).members().is_empty());
        assert_eq!(store.category(status).members(), &[ent]);
        assert_eq!(store.entity(ent).category(), Some(status));
    }

    #[test]
    fn unknown_category_is_created_on_demand() {
        let mut store = ModelStore::new();
        store.load(&[vec![descriptor("mpd", "music", false)]]);
        let cat = store.find_category("music").unwrap();
        assert_eq!(store.category(cat).members().len(), 1);
        assert!(store.category(cat).fallback_allowed());
    }

    #[test]
    fn set_active_refuses_non_members() {
        let mut store = ModelStore::new();
        store.load(&[vec![
            descriptor("openbox", "window-manager", true),
            descriptor("dunst", "notifications", true),
        ]]);
        let wm = store.find_category("window-manager").unwrap();
        let dunst = store.find_entity("dunst", None).unwrap();

        store.set_active(wm, dunst);
        assert_eq!(store.category(wm).active(), None);

        let openbox = store.find_entity("openbox", None).unwrap();
        store.set_active(wm, openbox);
        assert_eq!(store.category(wm).active(), Some(openbox));
    }

    #[test]
    fn preferences_bind_and_interpret() {
        let mut store = ModelStore::new();
        let prefs = SessionPrefs::default()
            .with_preference("compositor", "none")
            .with_preference("terminal", "alacritty")
            .with_preference("nonsense", "x");
        store.apply_prefs(&prefs);

        let compositor = store.find_category("compositor").unwrap();
        let terminal = store.find_category("terminal").unwrap();
        let wm = store.find_category("window-manager").unwrap();
        assert_eq!(store.category(compositor).preference(), Preference::Disabled);
        assert_eq!(
            store.category(terminal).preference(),
            Preference::Named("alacritty")
        );
        assert_eq!(store.category(wm).preference(), Preference::Unset);
    }
}
