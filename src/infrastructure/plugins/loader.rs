//! Plugin loader - Resolves, gates and initializes plugins
//!
//! A load attempt resolves the manifest, builds the instance through the
//! catalog, checks its dependencies against the registry, loads its config
//! document and runs `init`. Plugins with unmet dependencies are parked in the
//! [`WaitQueue`] and retried whenever another plugin finishes loading.

use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::catalog::PluginCatalog;
use super::manifest::{resolve_entry, PluginManifest};
use super::registry::{LoadedPlugin, PluginRegistry};
use super::version;
use super::waiting::{WaitQueue, WaitingPlugin};
use crate::application::errors::{BotError, PluginError, UnmetDependency};
use crate::application::Bot;
use crate::domain::traits::{Dependencies, Plugin};
use crate::infrastructure::storage::ConfigStore;

/// Where a plugin comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginSource {
    /// Catalog export loaded without a manifest
    Builtin(String),
    /// Manifest path relative to `base_dir`
    Path { path: String, base_dir: PathBuf },
}

impl fmt::Display for PluginSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginSource::Builtin(export) => write!(f, "builtin:{}", export),
            PluginSource::Path { path, base_dir } => write!(f, "{}", base_dir.join(path).display()),
        }
    }
}

/// Result of one `load_plugin` call
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(String),
    /// Nothing to do, the name is already registered
    AlreadyLoaded(String),
    /// Deferred until its dependencies load
    Pending(String),
    Failed(PluginError),
}

impl LoadOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, LoadOutcome::Failed(_))
    }
}

/// Plugin loader
pub struct PluginLoader {
    bot: Arc<Bot>,
    catalog: PluginCatalog,
    store: ConfigStore,
    base_dir: PathBuf,
    registry: PluginRegistry,
    waiting: WaitQueue,
}

impl PluginLoader {
    pub fn new(bot: Arc<Bot>, catalog: PluginCatalog, base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            bot,
            catalog,
            store: ConfigStore::new(&base_dir),
            base_dir,
            registry: PluginRegistry::new(),
            waiting: WaitQueue::new(),
        }
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn waiting(&self) -> &WaitQueue {
        &self.waiting
    }

    /// Load the plugin whose manifest is found at `path` under `base_dir`
    /// (the host base dir when `None`), then retry every waiting plugin.
    pub async fn load_plugin(&mut self, path: &str, base_dir: Option<&Path>) -> LoadOutcome {
        let source = PluginSource::Path {
            path: path.to_string(),
            base_dir: base_dir.map_or_else(|| self.base_dir.clone(), Path::to_path_buf),
        };
        self.load(source).await
    }

    /// Load a catalog export directly
    pub async fn load_builtin(&mut self, export: &str) -> LoadOutcome {
        self.load(PluginSource::Builtin(export.to_string())).await
    }

    /// Load plugins in order, stopping at the first failure. Deferred and
    /// duplicate plugins do not stop the batch.
    pub async fn load_plugins<I, S>(&mut self, paths: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for path in paths {
            if self.load_plugin(path.as_ref(), None).await.is_failed() {
                return false;
            }
        }
        true
    }

    /// Report plugins still waiting after bootstrap
    pub fn check_waiting_plugins(&self) -> Result<(), BotError> {
        if self.waiting.is_empty() {
            return Ok(());
        }

        for (name, entry) in self.waiting.iter() {
            let unmet = self.unmet_dependencies(&entry.dependencies);
            if unmet.is_empty() {
                tracing::error!("Plugin {} has its dependencies but failed to load", name);
                continue;
            }
            let reasons: Vec<String> = unmet.iter().map(ToString::to_string).collect();
            tracing::error!("Plugin {} is still waiting: {}", name, reasons.join("; "));
        }

        Err(BotError::UnresolvedDependencies(self.waiting.names()))
    }

    async fn load(&mut self, source: PluginSource) -> LoadOutcome {
        let outcome = self.attempt(source).await;
        if let LoadOutcome::Loaded(_) = outcome {
            self.retry_waiting().await;
        }
        outcome
    }

    /// Retry waiting plugins until a full pass loads nothing new. A plugin
    /// that fails is not retried again within the same call.
    async fn retry_waiting(&mut self) {
        let mut failed = HashSet::new();

        loop {
            let mut progressed = false;

            for name in self.waiting.names() {
                if failed.contains(&name) {
                    continue;
                }
                let Some(entry) = self.waiting.get(&name) else {
                    continue;
                };
                if self.check_dependencies(&entry.dependencies).is_err() {
                    continue;
                }

                tracing::debug!("Dependencies of {} are loaded, retrying", name);
                let source = entry.source.clone();
                match self.attempt(source).await {
                    LoadOutcome::Loaded(_) => progressed = true,
                    LoadOutcome::Failed(_) => {
                        failed.insert(name);
                    }
                    LoadOutcome::AlreadyLoaded(_) | LoadOutcome::Pending(_) => {}
                }
            }

            if !progressed {
                break;
            }
        }
    }

    /// One load attempt without the retry pass
    async fn attempt(&mut self, source: PluginSource) -> LoadOutcome {
        tracing::debug!("Loading plugin from {}", source);

        let plugin = match self.instantiate(&source) {
            Ok(plugin) => plugin,
            Err(e) => {
                tracing::error!("Failed to load plugin {}: {}", source, e);
                return LoadOutcome::Failed(e);
            }
        };
        let name = plugin.name().to_string();

        if self.registry.contains(&name) {
            tracing::info!("Plugin {} is already loaded", name);
            self.waiting.remove(&name);
            return LoadOutcome::AlreadyLoaded(name);
        }

        let dependencies = plugin.dependencies();
        if let Err(unmet) = self.check_dependencies(&dependencies) {
            tracing::warn!("Plugin {} deferred: {}", name, unmet);
            self.waiting.defer(name.clone(), WaitingPlugin::new(source, dependencies));
            return LoadOutcome::Pending(name);
        }

        let (plugin, config) = match self.initialize(plugin).await {
            Ok(initialized) => initialized,
            Err(e) => {
                tracing::error!("Failed to load plugin {}: {}", name, e);
                return LoadOutcome::Failed(e);
            }
        };

        tracing::info!("Loaded plugin: {} v{}", name, plugin.version());
        self.waiting.remove(&name);
        if self.registry.insert(LoadedPlugin::new(plugin, config, source)).is_err() {
            tracing::info!("Plugin {} is already loaded", name);
            return LoadOutcome::AlreadyLoaded(name);
        }
        LoadOutcome::Loaded(name)
    }

    /// Resolve the export and construct the instance
    fn instantiate(&self, source: &PluginSource) -> Result<Box<dyn Plugin>, PluginError> {
        let export = match source {
            PluginSource::Builtin(export) => export.clone(),
            PluginSource::Path { path, base_dir } => {
                let entry = resolve_entry(base_dir, path)?;
                PluginManifest::from_file(&entry)?
                    .export
                    .ok_or_else(|| PluginError::Contract(format!("{} has no export", entry.display())))?
            }
        };

        let factory = self
            .catalog
            .get(&export)
            .ok_or_else(|| PluginError::Contract(format!("unknown plugin export '{}'", export)))?;

        let bot = self.bot.clone();
        let plugin = panic::catch_unwind(AssertUnwindSafe(|| factory(bot)))
            .map_err(|_| PluginError::Contract(format!("constructor of '{}' panicked", export)))?;

        if plugin.name().is_empty() {
            return Err(PluginError::Contract(format!("export '{}' has an empty name", export)));
        }
        if plugin.version().is_empty() {
            return Err(PluginError::Contract(format!("plugin {} has an empty version", plugin.name())));
        }
        Ok(plugin)
    }

    /// Load the config document and run `init` on its own task
    async fn initialize(&self, mut plugin: Box<dyn Plugin>) -> Result<(Box<dyn Plugin>, Value), PluginError> {
        let config = if plugin.auto_load_config() {
            let config_name = plugin.config_name().unwrap_or(plugin.name()).to_string();
            self.store.load(&config_name, &plugin.default_config()).await?
        } else {
            Value::Object(Map::new())
        };

        let init_config = config.clone();
        let initialized = tokio::spawn(async move {
            let result = plugin.init(&init_config).await;
            (plugin, result)
        })
        .await;

        match initialized {
            Ok((plugin, Ok(()))) => Ok((plugin, config)),
            Ok((_, Err(e))) => Err(PluginError::Init(e.to_string())),
            Err(e) => Err(PluginError::Init(e.to_string())),
        }
    }

    /// First unmet dependency in name order
    pub fn check_dependencies(&self, dependencies: &Dependencies) -> Result<(), UnmetDependency> {
        match self.unmet_dependencies(dependencies).into_iter().next() {
            Some(unmet) => Err(unmet),
            None => Ok(()),
        }
    }

    fn unmet_dependencies(&self, dependencies: &Dependencies) -> Vec<UnmetDependency> {
        dependencies
            .iter()
            .filter_map(|(name, range)| match self.registry.get(name) {
                None => Some(UnmetDependency::Missing { name: name.clone() }),
                Some(loaded) if !version::satisfies(loaded.version(), range) => Some(UnmetDependency::Version {
                    name: name.clone(),
                    required: range.clone(),
                    installed: loaded.version().to_string(),
                }),
                Some(_) => None,
            })
            .collect()
    }
}
