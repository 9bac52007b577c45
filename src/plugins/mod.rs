//! Plugins shipped with the host
//!
//! `help` is loaded by the host itself; `ping` is a demo loaded through a
//! manifest like any third-party plugin.

pub mod help;
pub mod ping;

use std::sync::Arc;

pub use help::HelpPlugin;
pub use ping::PingPlugin;

use crate::application::Bot;
use crate::domain::traits::Plugin;
use crate::infrastructure::plugins::PluginCatalog;

/// Catalog holding every plugin of this crate
pub fn builtin_catalog() -> PluginCatalog {
    PluginCatalog::new()
        .with(help::EXPORT, |bot: Arc<Bot>| -> Box<dyn Plugin> { Box::new(HelpPlugin::new(bot)) })
        .with(ping::EXPORT, |bot: Arc<Bot>| -> Box<dyn Plugin> { Box::new(PingPlugin::new(bot)) })
}
