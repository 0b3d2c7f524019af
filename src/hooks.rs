//! # External collaborators the supervisor calls at defined lifecycle points.
//!
//! Descriptor parsing, config parsing, X11 display/wallpaper/keyboard
//! operations, and notification popups all live outside this crate. The
//! supervisor consumes them through these traits and never cares how they
//! are implemented; `Null*` implementations are provided for embedders that
//! do not need a given hook (and for tests).

use std::io;

use crate::config::SessionPrefs;
use crate::model::EntityDescriptor;

/// Supplies parsed service descriptors, one batch per source.
///
/// Batch order establishes priority: when several sources define the same
/// entity identifier, the first source wins.
pub trait DescriptorSource: Send + Sync {
    /// Returns the parsed descriptors of this source.
    ///
    /// An error makes the supervisor skip the source with a warning; it is
    /// never fatal.
    fn descriptors(&self) -> io::Result<Vec<EntityDescriptor>>;
}

/// Supplies user preferences, re-read on every reload.
pub trait ConfigSource: Send + Sync {
    /// Loads the current preferences.
    ///
    /// On error during reload the supervisor keeps the previous preferences.
    fn load_prefs(&self) -> io::Result<SessionPrefs>;
}

/// Display-side effects the supervisor triggers at lifecycle points:
/// wallpaper, display configuration, keyboard layout, hot-plug detection.
///
/// All methods default to no-ops so implementors only override what their
/// platform supports.
pub trait DisplayHook: Send + Sync {
    /// Applies the configured wallpaper.
    fn load_wallpaper(&self) {}

    /// Persists the current display configuration.
    fn save_display_conf(&self) {}

    /// Applies the stored display configuration.
    fn load_display_conf(&self) {}

    /// Applies a keyboard layout (free-form string, e.g. for `setxkbmap`).
    fn set_keyboard_layout(&self, _layout: &str) {}

    /// Polled by the monitoring loop: whether the screen configuration
    /// changed since the last poll (display hot-plug).
    fn screen_changed(&self) -> bool {
        false
    }
}

/// Surfaces user-facing notifications (e.g. "service X terminated").
pub trait Notifier: Send + Sync {
    /// Shows a notification.
    fn notify(&self, summary: &str, body: &str);
}

/// Display hook that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullDisplayHook;

impl DisplayHook for NullDisplayHook {}

/// Notifier that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _summary: &str, _body: &str) {}
}

/// Config source returning a fixed set of preferences. Useful for embedders
/// that parse configuration once up front (reload then re-reads nothing).
#[derive(Clone, Debug, Default)]
pub struct StaticPrefs(pub SessionPrefs);

impl ConfigSource for StaticPrefs {
    fn load_prefs(&self) -> io::Result<SessionPrefs> {
        Ok(self.0.clone())
    }
}
