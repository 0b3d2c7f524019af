//! Entity/Category model: the in-memory graph the supervisor resolves over.
//!
//! Entities and categories live in two flat arenas inside [`ModelStore`];
//! membership and the per-category active pointer are indices
//! ([`EntityId`] / [`CategoryId`]), never references, so there is no cyclic
//! ownership between a category and its members.
//!
//! ## Contents
//! - [`Entity`], [`EntityDescriptor`]: one launchable service/application
//! - [`Category`], [`Preference`], [`Section`]: a named functional slot with
//!   a resolution policy
//! - [`ModelStore`]: arena, lookup, descriptor loading, preference binding

mod category;
mod entity;
mod store;

pub use category::{Category, CategoryId, Preference, Section};
pub use entity::{Entity, EntityDescriptor, EntityId};
pub use store::ModelStore;

/// Category that keeps the session alive: its death ends the session.
pub const WINDOW_MANAGER: &str = "window-manager";
