//! Plugin manifest definition and entry resolution

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::application::errors::PluginError;

/// Manifest file looked up inside a plugin directory
pub const MANIFEST_FILE: &str = "plugin.yaml";

/// Extension tried first for a single-file plugin entry
pub const NATIVE_EXTENSION: &str = "yaml";

/// Extension tried when the native one is absent
pub const FALLBACK_EXTENSION: &str = "yml";

/// Plugin metadata
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PluginManifest {
    /// Catalog id of the plugin constructor
    pub export: Option<String>,

    /// Plugin description
    pub description: Option<String>,
}

impl PluginManifest {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PluginError> {
        let path = path.as_ref();
        let manifest_error = |reason: String| PluginError::Manifest {
            path: path.display().to_string(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| manifest_error(e.to_string()))?;
        serde_yaml::from_str(&content).map_err(|e| manifest_error(e.to_string()))
    }
}

/// Find the manifest for `path` under `base_dir`.
///
/// A directory resolves to its [`MANIFEST_FILE`] and nothing else. Otherwise,
/// first hit wins: the exact file, then the path with the native and fallback
/// extensions appended.
pub fn resolve_entry(base_dir: &Path, path: &str) -> Result<PathBuf, PluginError> {
    let target = base_dir.join(path);

    // A directory is the entry even without a manifest inside
    if target.is_dir() {
        let manifest = target.join(MANIFEST_FILE);
        return if manifest.is_file() {
            Ok(manifest)
        } else {
            Err(PluginError::NotFound(manifest.display().to_string()))
        };
    }

    let candidates = [
        target.clone(),
        with_extension(&target, NATIVE_EXTENSION),
        with_extension(&target, FALLBACK_EXTENSION),
    ];

    candidates
        .into_iter()
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| PluginError::NotFound(target.display().to_string()))
}

/// Append rather than replace, so `plugins/ping.v2` becomes `plugins/ping.v2.yaml`
fn with_extension(path: &Path, extension: &str) -> PathBuf {
    let mut appended = path.as_os_str().to_owned();
    appended.push(".");
    appended.push(extension);
    PathBuf::from(appended)
}
