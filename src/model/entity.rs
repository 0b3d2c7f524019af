//! # Entity: one launchable service or application.
//!
//! An [`Entity`] is built from an [`EntityDescriptor`] (the output of an
//! external descriptor parser) and is immutable afterwards, except for being
//! (re)bound to a category while descriptor batches are merged.

use super::category::CategoryId;

/// Index of an entity inside the [`ModelStore`](super::ModelStore) arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityId(pub(crate) usize);

/// Parsed attributes of one service descriptor file.
///
/// Produced by an external parser (one entity per INI-like file, keys
/// `name`, `description`, `command`, `test`, `settings`, `default`,
/// `category`). Unknown keys are the parser's problem; absent keys stay
/// `None` and fall back to defaults on conversion.
#[derive(Clone, Debug, Default)]
pub struct EntityDescriptor {
    /// Unique identifier (the descriptor's section name).
    pub id: String,
    /// Human-readable display name (`name` key).
    pub name: Option<String>,
    /// Free-form description (`description` key).
    pub description: Option<String>,
    /// Launch command, run via `/bin/sh -c` (`command` key).
    pub command: Option<String>,
    /// Health-check command (`test` key); exit 0 means healthy.
    pub test: Option<String>,
    /// Settings/configuration command (`settings` key).
    pub settings: Option<String>,
    /// Soft ranking hint for fallback resolution (`default` key).
    pub default: Option<bool>,
    /// Name of the category this entity joins (`category` key).
    pub category: Option<String>,
}

/// One launchable service/application candidate.
#[derive(Clone, Debug)]
pub struct Entity {
    pub(crate) id: String,
    pub(crate) display_name: String,
    pub(crate) description: String,
    pub(crate) command: String,
    pub(crate) test: Option<String>,
    pub(crate) settings: Option<String>,
    pub(crate) is_default: bool,
    /// Owning category (back-reference as an index, not ownership).
    pub(crate) category: Option<CategoryId>,
}

impl Entity {
    pub(crate) fn placeholder(id: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: "unknown".to_string(),
            description: "unknown".to_string(),
            command: String::new(),
            test: None,
            settings: None,
            is_default: false,
            category: None,
        }
    }

    /// Merges descriptor attributes into this entity. Only keys present in
    /// the descriptor are applied; category binding is handled by the store.
    pub(crate) fn apply(&mut self, d: &EntityDescriptor) {
        if let Some(name) = &d.name {
            self.display_name = name.clone();
        }
        if let Some(desc) = &d.description {
            self.description = desc.clone();
        }
        if let Some(cmd) = &d.command {
            self.command = cmd.clone();
        }
        if let Some(test) = &d.test {
            self.test = Some(test.clone());
        }
        if let Some(settings) = &d.settings {
            self.settings = Some(settings.clone());
        }
        if let Some(default) = d.default {
            self.is_default = default;
        }
    }

    /// Unique identifier within the owning category.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human-readable display name.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Free-form description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Launch command, run via `/bin/sh -c`.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Health-check command, if any.
    pub fn test(&self) -> Option<&str> {
        self.test.as_deref()
    }

    /// Settings command, if any.
    pub fn settings(&self) -> Option<&str> {
        self.settings.as_deref()
    }

    /// Whether this entity is a preferred fallback within its category.
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// Owning category, if bound.
    pub fn category(&self) -> Option<CategoryId> {
        self.category
    }
}
