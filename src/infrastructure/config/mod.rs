//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::application::bot::BotConfig;
use crate::application::errors::ConfigError;

/// Host configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AtriConfig {
    /// Root for plugin paths and the `config/` directory
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    /// Single-character command prefixes
    pub prefix: Vec<String>,
    /// Bot administrators
    pub admin_id: Vec<i64>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub disable_help_plugin: bool,
    #[serde(default)]
    pub disable_banner: bool,
    #[serde(default)]
    pub transport: TransportConfig,
    /// Plugin paths loaded at startup, relative to `base_dir`
    #[serde(default)]
    pub plugins: Vec<String>,
}

/// Which transport the binary connects
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    /// stdin / stdout, for development
    Console {
        user_id: i64,
        #[serde(default)]
        group_id: Option<i64>,
    },
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Console {
            user_id: 10001,
            group_id: None,
        }
    }
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for AtriConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            prefix: vec!["/".to_string(), "!".to_string()],
            admin_id: vec![10001],
            debug: false,
            disable_help_plugin: false,
            disable_banner: false,
            transport: TransportConfig::default(),
            plugins: vec!["plugins/ping".to_string()],
        }
    }
}

impl AtriConfig {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            name: path.display().to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse {
            name: "config".to_string(),
            reason: e.to_string(),
        })
    }

    /// Prefixes must be single characters and both lists non-empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefix.is_empty() {
            return Err(ConfigError::MissingField("prefix".to_string()));
        }
        if let Some(prefix) = self.prefix.iter().find(|p| p.chars().count() != 1) {
            return Err(ConfigError::InvalidValue(format!(
                "prefix '{}' must be a single character",
                prefix
            )));
        }
        if self.admin_id.is_empty() {
            return Err(ConfigError::MissingField("admin_id".to_string()));
        }
        Ok(())
    }

    pub fn bot_config(&self) -> BotConfig {
        BotConfig {
            prefix: self.prefix.clone(),
            admin_id: self.admin_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yaml_with_defaults() {
        let config: AtriConfig = serde_yaml::from_str(
            "prefix: ['!']\nadmin_id: [42]\ntransport:\n  kind: console\n  user_id: 7\n",
        )
        .unwrap();

        assert_eq!(config.base_dir, PathBuf::from("."));
        assert!(!config.disable_help_plugin);
        assert!(config.plugins.is_empty());
        assert!(matches!(config.transport, TransportConfig::Console { user_id: 7, group_id: None }));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_prefixes_and_admins() {
        let mut config = AtriConfig::default();
        config.prefix = vec!["!!".to_string()];
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));

        config.prefix.clear();
        assert!(matches!(config.validate(), Err(ConfigError::MissingField(_))));

        let mut config = AtriConfig::default();
        config.admin_id.clear();
        assert!(matches!(config.validate(), Err(ConfigError::MissingField(_))));
    }

    #[test]
    fn default_config_round_trips_through_yaml() {
        let yaml = AtriConfig::default().to_yaml().unwrap();
        let parsed: AtriConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.prefix, AtriConfig::default().prefix);
    }
}
