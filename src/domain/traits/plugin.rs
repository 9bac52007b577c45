use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::application::errors::BotError;

/// Plugin name -> semver range it must satisfy
pub type Dependencies = BTreeMap<String, String>;

/// Main plugin trait that all plugins must implement
///
/// A plugin is constructed by its catalog factory with the host handle,
/// validated, gated on its dependencies, given its resolved config document
/// and finally initialized exactly once. Handlers are registered from `init`.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique plugin name
    fn name(&self) -> &str;

    /// Semantic version of the plugin
    fn version(&self) -> &str;

    /// Plugins that must be loaded first
    fn dependencies(&self) -> Dependencies {
        Dependencies::new()
    }

    /// Whether the host should load `config/<config_name>.json` for this plugin
    fn auto_load_config(&self) -> bool {
        true
    }

    /// Config document name, defaults to the plugin name
    fn config_name(&self) -> Option<&str> {
        None
    }

    /// Defaults merged under the on-disk config document
    fn default_config(&self) -> Value {
        Value::Object(Map::new())
    }

    /// Register handlers. `config` is the resolved config document, or an
    /// empty object when `auto_load_config` is off.
    async fn init(&mut self, config: &Value) -> Result<(), BotError>;
}
