//! Wait queue - Plugins deferred on unmet dependencies

use chrono::{DateTime, Utc};

use super::loader::PluginSource;
use crate::domain::traits::Dependencies;

/// A plugin that could not load because a dependency was missing or too old
#[derive(Debug, Clone)]
pub struct WaitingPlugin {
    /// Where to re-resolve the plugin from
    pub source: PluginSource,
    /// Dependencies as declared when the plugin was deferred
    pub dependencies: Dependencies,
    pub queued_at: DateTime<Utc>,
}

impl WaitingPlugin {
    pub fn new(source: PluginSource, dependencies: Dependencies) -> Self {
        Self {
            source,
            dependencies,
            queued_at: Utc::now(),
        }
    }
}

/// Insertion-ordered map of plugin name to [`WaitingPlugin`]
#[derive(Debug, Default)]
pub struct WaitQueue {
    entries: Vec<(String, WaitingPlugin)>,
}

impl WaitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `name`, overwriting an existing entry in place
    pub fn defer(&mut self, name: impl Into<String>, plugin: WaitingPlugin) {
        let name = name.into();
        match self.entries.iter_mut().find(|(queued, _)| *queued == name) {
            Some((_, entry)) => *entry = plugin,
            None => self.entries.push((name, plugin)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<WaitingPlugin> {
        let index = self.entries.iter().position(|(queued, _)| queued == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn get(&self, name: &str) -> Option<&WaitingPlugin> {
        self.entries
            .iter()
            .find_map(|(queued, entry)| (queued == name).then_some(entry))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Queued names in insertion order
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &WaitingPlugin)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
