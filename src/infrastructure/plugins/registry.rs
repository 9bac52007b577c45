//! Plugin registry - Manages loaded plugins

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

use super::loader::PluginSource;
use crate::domain::traits::Plugin;

/// Loaded plugin instance
pub struct LoadedPlugin {
    plugin: Box<dyn Plugin>,
    config: Value,
    source: PluginSource,
    loaded_at: DateTime<Utc>,
}

impl LoadedPlugin {
    pub fn new(plugin: Box<dyn Plugin>, config: Value, source: PluginSource) -> Self {
        Self {
            plugin,
            config,
            source,
            loaded_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &str {
        self.plugin.name()
    }

    pub fn version(&self) -> &str {
        self.plugin.version()
    }

    /// Get the plugin instance
    pub fn plugin(&self) -> &dyn Plugin {
        self.plugin.as_ref()
    }

    /// Config document the plugin was initialized with
    pub fn config(&self) -> &Value {
        &self.config
    }

    pub fn source(&self) -> &PluginSource {
        &self.source
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

/// Registry for managing loaded plugins
#[derive(Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, LoadedPlugin>,
    order: Vec<String>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loaded plugin. Returns it back if the name is taken.
    pub fn insert(&mut self, plugin: LoadedPlugin) -> Result<(), LoadedPlugin> {
        if self.plugins.contains_key(plugin.name()) {
            return Err(plugin);
        }
        self.order.push(plugin.name().to_string());
        self.plugins.insert(plugin.name().to_string(), plugin);
        Ok(())
    }

    /// Get a plugin by name
    pub fn get(&self, name: &str) -> Option<&LoadedPlugin> {
        self.plugins.get(name)
    }

    /// Check if a plugin is loaded
    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Loaded plugin names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.plugins.keys().cloned().collect();
        names.sort();
        names
    }

    /// Loaded plugins in load order
    pub fn iter(&self) -> impl Iterator<Item = &LoadedPlugin> {
        self.order.iter().filter_map(|name| self.plugins.get(name))
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
