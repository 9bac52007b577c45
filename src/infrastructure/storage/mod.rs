//! File-based plugin config storage
//!
//! One JSON document per plugin at `<base>/config/<name>.json`, created from
//! the plugin defaults and merge-updated on every load.

use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::application::errors::ConfigError;

/// Directory under the base dir holding plugin documents
pub const CONFIG_DIR: &str = "config";

/// JSON config store
#[derive(Debug, Clone)]
pub struct ConfigStore {
    base_path: PathBuf,
}

impl ConfigStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_dir.as_ref().join(CONFIG_DIR),
        }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", name))
    }

    /// Load `name`, writing `defaults` first when no document exists.
    ///
    /// Keys present in the file win over the defaults; the merged document is
    /// written back before it is returned.
    pub async fn load(&self, name: &str, defaults: &Value) -> Result<Value, ConfigError> {
        tracing::debug!("Loading config {}", name);

        tokio::fs::create_dir_all(&self.base_path).await?;

        let path = self.path_for(name);
        if !tokio::fs::try_exists(&path).await? {
            tokio::fs::write(&path, to_pretty(name, defaults)?).await?;
        }

        let text = tokio::fs::read_to_string(&path).await?;
        let stored: Value = serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        let merged = merge(name, defaults, stored);
        tokio::fs::write(&path, to_pretty(name, &merged)?).await?;

        tracing::debug!("Config {}: {}", name, merged);
        tracing::info!("Config {} loaded", name);
        Ok(merged)
    }
}

/// Overlay `stored` onto `defaults`, one level deep. A stored document that
/// is not an object cannot override object defaults.
fn merge(name: &str, defaults: &Value, stored: Value) -> Value {
    match (defaults, stored) {
        (Value::Object(defaults), Value::Object(stored)) => {
            let mut merged = defaults.clone();
            merged.extend(stored);
            Value::Object(merged)
        }
        (Value::Object(defaults), stored) => {
            tracing::warn!("Config {} is not an object ({}), keeping defaults", name, stored);
            Value::Object(defaults.clone())
        }
        (_, stored) => stored,
    }
}

fn to_pretty(name: &str, document: &Value) -> Result<String, ConfigError> {
    serde_json::to_string_pretty(document).map_err(|e| ConfigError::Parse {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn creates_document_from_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        let defaults = json!({ "default_reply": "pong" });

        let config = store.load("ping", &defaults).await.unwrap();

        assert_eq!(config, defaults);
        let on_disk = std::fs::read_to_string(dir.path().join("config/ping.json")).unwrap();
        assert_eq!(serde_json::from_str::<Value>(&on_disk).unwrap(), defaults);
    }

    #[tokio::test]
    async fn non_object_document_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        std::fs::create_dir_all(dir.path().join("config")).unwrap();
        std::fs::write(store.path_for("ping"), "[]").unwrap();
        let defaults = json!({ "default_reply": "pong" });

        let config = store.load("ping", &defaults).await.unwrap();

        assert_eq!(config, defaults);
        let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(store.path_for("ping")).unwrap()).unwrap();
        assert_eq!(on_disk, defaults);
    }

    #[tokio::test]
    async fn file_values_win_and_defaults_fill_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        std::fs::create_dir_all(dir.path().join("config")).unwrap();
        std::fs::write(store.path_for("ping"), r#"{"default_reply": "pang", "extra": 1}"#).unwrap();

        let config = store
            .load("ping", &json!({ "default_reply": "pong", "times": 3 }))
            .await
            .unwrap();

        assert_eq!(config, json!({ "default_reply": "pang", "extra": 1, "times": 3 }));
        let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(store.path_for("ping")).unwrap()).unwrap();
        assert_eq!(on_disk, config);
    }

    #[tokio::test]
    async fn repeated_loads_are_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        let defaults = json!({ "b": [1, 2], "a": { "nested": true } });

        store.load("doc", &defaults).await.unwrap();
        let first = std::fs::read(store.path_for("doc")).unwrap();
        store.load("doc", &defaults).await.unwrap();
        let second = std::fs::read(store.path_for("doc")).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn malformed_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        std::fs::create_dir_all(dir.path().join("config")).unwrap();
        std::fs::write(store.path_for("broken"), "{ not json").unwrap();

        let err = store.load("broken", &json!({})).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref name, .. } if name == "broken"));
    }
}
