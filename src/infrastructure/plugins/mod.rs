//! Plugin system for the ATRI host
//!
//! Plugins are compiled in and registered in a [`PluginCatalog`]. A YAML
//! manifest on disk names the catalog export to load; dependencies between
//! plugins are semver ranges checked by [`version::satisfies`].

pub mod catalog;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod version;
pub mod waiting;

pub use catalog::{PluginCatalog, PluginFactory};
pub use loader::{LoadOutcome, PluginLoader, PluginSource};
pub use manifest::PluginManifest;
pub use registry::{LoadedPlugin, PluginRegistry};
pub use waiting::{WaitQueue, WaitingPlugin};
