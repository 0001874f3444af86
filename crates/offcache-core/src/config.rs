//! Engine configuration.
//!
//! The configuration names the application's origin, the version this engine
//! instance serves, and the assets to install. It is injected into the engine
//! at construction; nothing reads it from a global.
//!
//! When loaded from disk it lives at `~/.config/offcache/config.json`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::manifest::AssetManifest;
use crate::request::{self, Identifier};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "offcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_STORE_PREFIX: &str = "offcache";

const DEFAULT_FALLBACK_DOCUMENT: &str = "./index.html";

/// Which stores the pruner may delete on activation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PruneScope {
    /// Only stores named with this application's prefix.
    #[default]
    Owned,
    /// Every store except the current one.
    All,
}

fn default_store_prefix() -> String {
    DEFAULT_STORE_PREFIX.to_string()
}

fn default_fallback_document() -> String {
    DEFAULT_FALLBACK_DOCUMENT.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the application. Requests sharing its origin are local.
    pub app_origin: Url,
    pub version: String,
    #[serde(default = "default_store_prefix")]
    pub store_prefix: String,
    /// Document served for local requests when both network and store miss.
    #[serde(default = "default_fallback_document")]
    pub fallback_document: String,
    #[serde(default)]
    pub prune_scope: PruneScope,
    #[serde(default)]
    pub manifest: AssetManifest,
}

impl EngineConfig {
    pub fn new(app_origin: Url, version: impl Into<String>) -> ConfigResult<Self> {
        Self {
            app_origin,
            version: version.into(),
            store_prefix: default_store_prefix(),
            fallback_document: default_fallback_document(),
            prune_scope: PruneScope::default(),
            manifest: AssetManifest::default(),
        }
        .normalized()
    }

    pub fn with_store_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.store_prefix = prefix.into();
        self
    }

    pub fn with_fallback_document(mut self, reference: impl Into<String>) -> Self {
        self.fallback_document = reference.into();
        self
    }

    pub fn with_prune_scope(mut self, scope: PruneScope) -> Self {
        self.prune_scope = scope;
        self
    }

    pub fn with_manifest(mut self, manifest: AssetManifest) -> Self {
        self.manifest = manifest;
        self
    }

    /// Validate the origin and make sure its path ends in `/` so relative
    /// references resolve inside it rather than beside it.
    fn normalized(mut self) -> ConfigResult<Self> {
        if self.app_origin.cannot_be_a_base() {
            return Err(ConfigError::InvalidOrigin {
                origin: self.app_origin.to_string(),
                reason: "not a hierarchical URL".to_string(),
            });
        }
        if !self.app_origin.path().ends_with('/') {
            let path = format!("{}/", self.app_origin.path());
            self.app_origin.set_path(&path);
        }
        self.app_origin.set_query(None);
        self.app_origin.set_fragment(None);
        Ok(self)
    }

    /// Name of the store this engine instance reads and writes.
    pub fn store_name(&self) -> String {
        if self.version.starts_with('v') {
            format!("{}-{}", self.store_prefix, self.version)
        } else {
            format!("{}-v{}", self.store_prefix, self.version)
        }
    }

    /// Whether a store name carries this application's prefix.
    pub fn owns_store(&self, name: &str) -> bool {
        name.strip_prefix(&self.store_prefix)
            .is_some_and(|rest| rest.starts_with('-'))
    }

    pub fn resolve(&self, reference: &str) -> Result<Url, url::ParseError> {
        request::resolve(reference, &self.app_origin)
    }

    /// Identifier of the offline fallback document, if its reference resolves.
    pub fn fallback_identifier(&self) -> Option<Identifier> {
        self.resolve(&self.fallback_document)
            .ok()
            .map(|url| request::identify(&url, &self.app_origin).0)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.normalized()
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn default_path() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::MissingDirectory("config"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn default_cache_dir() -> ConfigResult<PathBuf> {
        let cache_dir = dirs::cache_dir().ok_or(ConfigError::MissingDirectory("cache"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(version: &str) -> EngineConfig {
        EngineConfig::new(Url::parse("https://app.example/pwa").unwrap(), version).unwrap()
    }

    #[test]
    fn test_store_name_from_version() {
        assert_eq!(config("1.2.0").store_name(), "offcache-v1.2.0");
        assert_eq!(config("v2").store_name(), "offcache-v2");
        assert_eq!(config("2").with_store_prefix("app").store_name(), "app-v2");
    }

    #[test]
    fn test_origin_gets_trailing_slash() {
        let cfg = config("1");
        assert_eq!(cfg.app_origin.as_str(), "https://app.example/pwa/");
        assert_eq!(
            cfg.resolve("./index.html").unwrap().as_str(),
            "https://app.example/pwa/index.html"
        );
    }

    #[test]
    fn test_owns_store_requires_prefix_and_separator() {
        let cfg = config("1").with_store_prefix("app");
        assert!(cfg.owns_store("app-v1"));
        assert!(cfg.owns_store("app-v2"));
        assert!(!cfg.owns_store("application-v1"));
        assert!(!cfg.owns_store("other-v1"));
    }

    #[test]
    fn test_fallback_identifier() {
        let cfg = config("1");
        assert_eq!(cfg.fallback_identifier().unwrap().as_str(), "/pwa/index.html");
    }

    #[test]
    fn test_rejects_opaque_origin() {
        let result = EngineConfig::new(Url::parse("mailto:someone@example.com").unwrap(), "1");
        assert!(matches!(result, Err(ConfigError::InvalidOrigin { .. })));
    }

    #[test]
    fn test_load_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"app_origin": "http://localhost:8080", "version": "3"}"#,
        )
        .unwrap();

        let cfg = EngineConfig::load(&path).unwrap();
        assert_eq!(cfg.store_name(), "offcache-v3");
        assert_eq!(cfg.prune_scope, PruneScope::Owned);
        assert_eq!(cfg.manifest, AssetManifest::default());
        assert_eq!(cfg.app_origin.as_str(), "http://localhost:8080/");
    }
}
