//! ATRI - The plugin host
//!
//! Composes the transport, the bot and the plugin loader. Bootstrap is
//! `init`, then `load_plugins`, then `check_waiting_plugins`, then `run`.

use std::path::Path;
use std::sync::Arc;

use crate::application::errors::BotError;
use crate::application::Bot;
use crate::domain::traits::{Plugin, Transport};
use crate::infrastructure::config::AtriConfig;
use crate::infrastructure::plugins::{LoadOutcome, LoadedPlugin, PluginCatalog, PluginLoader, WaitQueue};
use crate::plugins::{help, HelpPlugin};

const BANNER: &str = r"
    _  _____ ____  ___
   / \|_   _|  _ \|_ _|
  / _ \ | | | |_) || |
 / ___ \| | |  _ < | |
/_/   \_\_| |_| \_\___|
";

pub struct Atri {
    config: AtriConfig,
    bot: Arc<Bot>,
    loader: PluginLoader,
}

impl Atri {
    /// Build the host and load the built-in `help` plugin unless disabled
    pub async fn init(
        config: AtriConfig,
        transport: Arc<dyn Transport>,
        mut catalog: PluginCatalog,
    ) -> Result<Self, BotError> {
        config.validate()?;

        if !config.disable_banner {
            tracing::info!("{}", BANNER);
        }
        tracing::info!("ATRI v{} starting, base dir {}", env!("CARGO_PKG_VERSION"), config.base_dir.display());

        if !catalog.contains(help::EXPORT) {
            catalog.register(help::EXPORT, |bot: Arc<Bot>| -> Box<dyn Plugin> { Box::new(HelpPlugin::new(bot)) });
        }

        let bot = Arc::new(Bot::new(config.bot_config(), transport));
        let loader = PluginLoader::new(bot.clone(), catalog, config.base_dir.clone());

        let mut atri = Self { config, bot, loader };
        if !atri.config.disable_help_plugin {
            if let LoadOutcome::Failed(e) = atri.loader.load_builtin(help::EXPORT).await {
                return Err(e.into());
            }
        }

        Ok(atri)
    }

    pub fn config(&self) -> &AtriConfig {
        &self.config
    }

    pub fn bot(&self) -> &Arc<Bot> {
        &self.bot
    }

    /// Load a plugin relative to the configured base dir
    pub async fn load_plugin(&mut self, path: &str) -> LoadOutcome {
        self.loader.load_plugin(path, None).await
    }

    /// Load a plugin relative to another base dir
    pub async fn load_plugin_from(&mut self, path: &str, base_dir: &Path) -> LoadOutcome {
        self.loader.load_plugin(path, Some(base_dir)).await
    }

    pub async fn load_plugins<I, S>(&mut self, paths: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.loader.load_plugins(paths).await
    }

    pub fn check_waiting_plugins(&self) -> Result<(), BotError> {
        self.loader.check_waiting_plugins()
    }

    pub fn loaded_plugins(&self) -> impl Iterator<Item = &LoadedPlugin> {
        self.loader.registry().iter()
    }

    pub fn waiting_plugins(&self) -> &WaitQueue {
        self.loader.waiting()
    }

    /// Dispatch transport events until the transport closes
    pub async fn run(&self) -> Result<(), BotError> {
        self.bot.run().await
    }
}
