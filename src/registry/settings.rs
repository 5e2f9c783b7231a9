//! Thumbnailing policy supplied by the embedding application.
//!
//! The registry never owns global settings. It reads the "disable all" flag
//! and the disabled mime types through [`SettingsProvider`] and subscribes
//! to changes.

use std::collections::HashSet;
use std::sync::{Mutex, RwLock};

/// Callback invoked after a setting changed.
///
/// Returning `false` unsubscribes the callback; subscribers whose owner has
/// gone away use this to stop being called.
pub type SettingsCallback = Box<dyn Fn(&dyn SettingsProvider) -> bool + Send + Sync>;

/// Source of thumbnailing policy.
pub trait SettingsProvider: Send + Sync {
    /// Whether all thumbnailing is disabled.
    fn disabled_all(&self) -> bool;

    /// Mime types for which thumbnailing is disabled.
    fn disabled_types(&self) -> HashSet<String>;

    /// Register a callback run whenever either value changes.
    fn subscribe(&self, callback: SettingsCallback);
}

#[derive(Debug, Default)]
struct Values {
    disabled_all: bool,
    disabled_types: HashSet<String>,
}

/// In-process settings store with change notification.
#[derive(Default)]
pub struct MemorySettings {
    values: RwLock<Values>,
    subscribers: Mutex<Vec<SettingsCallback>>,
}

impl MemorySettings {
    /// Create a store with the given initial values.
    #[must_use]
    pub fn new<I, S>(disabled_all: bool, disabled_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: RwLock::new(Values {
                disabled_all,
                disabled_types: disabled_types.into_iter().map(Into::into).collect(),
            }),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Set the global disable flag and notify subscribers.
    pub fn set_disabled_all(&self, disabled: bool) {
        if let Ok(mut values) = self.values.write() {
            values.disabled_all = disabled;
        }
        self.notify();
    }

    /// Replace the disabled mime types and notify subscribers.
    pub fn set_disabled_types<I, S>(&self, types: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Ok(mut values) = self.values.write() {
            values.disabled_types = types.into_iter().map(Into::into).collect();
        }
        self.notify();
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    fn notify(&self) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|callback| callback(self));
    }
}

impl std::fmt::Debug for MemorySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySettings")
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}

impl SettingsProvider for MemorySettings {
    fn disabled_all(&self) -> bool {
        self.values.read().map(|v| v.disabled_all).unwrap_or(false)
    }

    fn disabled_types(&self) -> HashSet<String> {
        self.values
            .read()
            .map(|v| v.disabled_types.clone())
            .unwrap_or_default()
    }

    fn subscribe(&self, callback: SettingsCallback) {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(callback);
    }
}
