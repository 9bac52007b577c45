//! Application layer errors

use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Command error: {0}")]
    Command(String),

    #[error("Plugins still waiting for dependencies: {}", .0.join(", "))]
    UnresolvedDependencies(Vec<String>),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Plugin loading errors
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Plugin entry not found: {0}")]
    NotFound(String),

    #[error("Invalid manifest {path}: {reason}")]
    Manifest { path: String, reason: String },

    #[error("Invalid plugin: {0}")]
    Contract(String),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Init failed: {0}")]
    Init(String),
}

/// Configuration errors, for the host config file and per-plugin documents
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error in {name}: {reason}")]
    Parse { name: String, reason: String },
}

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport closed")]
    Closed,

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a plugin cannot be loaded yet
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnmetDependency {
    #[error("missing dependency {name}")]
    Missing { name: String },

    #[error("dependency {name} version mismatch (required: {required}, installed: {installed})")]
    Version {
        name: String,
        required: String,
        installed: String,
    },
}
