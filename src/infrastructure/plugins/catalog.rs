//! Plugin catalog - Constructors a manifest `export` can name
//!
//! Plugins are compiled into the host; a manifest on disk only selects which
//! registered constructor to run.

use std::collections::HashMap;
use std::sync::Arc;

use crate::application::Bot;
use crate::domain::traits::Plugin;

/// Builds a plugin instance around the host handle
pub type PluginFactory = Arc<dyn Fn(Arc<Bot>) -> Box<dyn Plugin> + Send + Sync>;

#[derive(Clone, Default)]
pub struct PluginCatalog {
    factories: HashMap<String, PluginFactory>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor, replacing any previous one under `export`
    pub fn register<F>(&mut self, export: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(Arc<Bot>) -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        let export = export.into();
        tracing::debug!("Registered plugin export {}", export);
        self.factories.insert(export, Arc::new(factory));
        self
    }

    /// Builder form of [`PluginCatalog::register`]
    pub fn with<F>(mut self, export: impl Into<String>, factory: F) -> Self
    where
        F: Fn(Arc<Bot>) -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        self.register(export, factory);
        self
    }

    pub fn get(&self, export: &str) -> Option<PluginFactory> {
        self.factories.get(export).cloned()
    }

    pub fn contains(&self, export: &str) -> bool {
        self.factories.contains_key(export)
    }

    /// Registered export ids, sorted
    pub fn exports(&self) -> Vec<String> {
        let mut exports: Vec<String> = self.factories.keys().cloned().collect();
        exports.sort();
        exports
    }
}

impl std::fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginCatalog").field("exports", &self.exports()).finish()
    }
}
