//! # Category: a named functional slot with a resolution policy.
//!
//! A category owns its member list (as indices) and at most one active
//! entity at a time. The active pointer is only ever mutated by the
//! supervisor; the invariant that it refers to a member of the same category
//! is enforced by [`ModelStore`](super::ModelStore).

use crate::config::PREFERENCE_NONE;

use super::entity::EntityId;

/// Index of a category inside the [`ModelStore`](super::ModelStore) arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CategoryId(pub(crate) usize);

/// Which session-config section a category's preference key lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    /// Launched and supervised as background services.
    Daemons,
    /// Resolved and exported as default applications, never launched.
    Applications,
}

/// Interpreted user preference for a category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preference<'a> {
    /// No preference configured; fallback policy applies.
    Unset,
    /// The sentinel `none`: the category is explicitly disabled.
    Disabled,
    /// An explicitly named entity identifier, trusted unconditionally.
    Named(&'a str),
}

/// A named functional slot (e.g. `window-manager`, `terminal`, `applets`).
#[derive(Clone, Debug)]
pub struct Category {
    pub(crate) name: String,
    pub(crate) section: Section,
    /// Member entities in registration order. Owned by the category.
    pub(crate) members: Vec<EntityId>,
    /// Raw preference string from the session config.
    pub(crate) preference: Option<String>,
    /// Whether unresolved preferences may fall back to other members.
    pub(crate) fallback: bool,
    /// Whether the category may legitimately resolve to zero members and
    /// instead launches every healthy member (applets/autostart).
    pub(crate) optional: bool,
    /// Currently active entity; at most one, always a member.
    pub(crate) active: Option<EntityId>,
    /// Set once the category's default application has been exported.
    pub(crate) exported: bool,
}

impl Category {
    pub(crate) fn new(name: &str, section: Section, fallback: bool, optional: bool) -> Self {
        Self {
            name: name.to_string(),
            section,
            members: Vec::new(),
            preference: None,
            fallback,
            optional,
            active: None,
            exported: false,
        }
    }

    /// Category name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Config section this category is keyed under.
    pub fn section(&self) -> Section {
        self.section
    }

    /// Member entities in registration order.
    pub fn members(&self) -> &[EntityId] {
        &self.members
    }

    /// Interprets the raw preference string.
    pub fn preference(&self) -> Preference<'_> {
        match self.preference.as_deref() {
            None => Preference::Unset,
            Some(PREFERENCE_NONE) => Preference::Disabled,
            Some(name) => Preference::Named(name),
        }
    }

    /// Whether fallback resolution is allowed for this category.
    pub fn fallback_allowed(&self) -> bool {
        self.fallback
    }

    /// Whether this is an optional (applets/autostart style) category.
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Currently active entity, if any.
    pub fn active(&self) -> Option<EntityId> {
        self.active
    }
}
