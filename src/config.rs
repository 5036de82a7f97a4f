//! Configuration management
//!
//! Settings file format (all fields optional):
//! ```json
//! {
//!   "logFilter": "expense_recon=debug",
//!   "bindAddress": "127.0.0.1:8080",
//!   "aliasFiles": ["aliases/travel.json"],
//!   "aliases": [{ "canonicalName": "Grab", "aliases": ["GRAB"], "category": "Transport" }]
//! }
//! ```
//!
//! The file comes from `--config` or `EXPENSE_RECON_CONFIG`. A missing file
//! means defaults. `EXPENSE_RECON_BIND` and `EXPENSE_RECON_LOG` override the
//! matching fields.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::merchant::{MerchantAliasEntry, MerchantNormalizer};

pub const CONFIG_ENV: &str = "EXPENSE_RECON_CONFIG";
pub const BIND_ENV: &str = "EXPENSE_RECON_BIND";
pub const LOG_ENV: &str = "EXPENSE_RECON_LOG";

pub const DEFAULT_LOG_FILTER: &str = "expense_recon=info";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconConfig {
    /// tracing-subscriber directive(s); `RUST_LOG` still wins at runtime
    pub log_filter: String,

    /// Address the HTTP server listens on
    pub bind_address: String,

    /// JSON alias files appended to the built-in table, in order.
    /// Relative paths resolve against the settings file's directory.
    pub alias_files: Vec<PathBuf>,

    /// Inline alias entries, applied after `alias_files`
    pub aliases: Vec<MerchantAliasEntry>,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            alias_files: Vec::new(),
            aliases: Vec::new(),
        }
    }
}

impl ReconConfig {
    /// Load settings from `path`, falling back to `EXPENSE_RECON_CONFIG`,
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Read a settings file. A missing file yields defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(path = ?path, "settings file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {:?}", path))?;
        let mut config: ReconConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {:?}", path))?;

        if let Some(base) = path.parent() {
            config.alias_files = config
                .alias_files
                .into_iter()
                .map(|file| if file.is_relative() { base.join(file) } else { file })
                .collect();
        }

        Ok(config)
    }

    /// Override fields from an environment lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup(BIND_ENV).filter(|v| !v.trim().is_empty()) {
            self.bind_address = bind;
        }
        if let Some(filter) = lookup(LOG_ENV).filter(|v| !v.trim().is_empty()) {
            self.log_filter = filter;
        }
    }

    /// Built-in alias table extended with the configured files and entries
    pub fn build_normalizer(&self) -> Result<MerchantNormalizer> {
        let normalizer = MerchantNormalizer::with_defaults();

        for file in &self.alias_files {
            normalizer.load_alias_file(file)?;
        }
        normalizer.extend(self.aliases.clone());

        tracing::debug!(entries = normalizer.len(), "merchant alias table ready");
        Ok(normalizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReconConfig::from_file(&dir.path().join("settings.json")).unwrap();

        assert_eq!(config, ReconConfig::default());
        assert_eq!(config.bind_address, "0.0.0.0:3000");
        assert_eq!(config.log_filter, "expense_recon=info");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"bindAddress": "127.0.0.1:8080"}"#).unwrap();

        let config = ReconConfig::from_file(&path).unwrap();

        assert_eq!(config.bind_address, "127.0.0.1:8080");
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert!(config.aliases.is_empty());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let err = ReconConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse settings file"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ReconConfig::default();
        config.apply_overrides(|key| match key {
            BIND_ENV => Some("127.0.0.1:9000".to_string()),
            LOG_ENV => Some("  ".to_string()),
            _ => None,
        });

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_build_normalizer_with_files_and_inline_aliases() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("travel.json"),
            r#"[{"canonicalName":"Grab","aliases":["GRABTAXI"],"category":"Transport"}]"#,
        )
        .unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{
                "aliasFiles": ["travel.json"],
                "aliases": [{"canonicalName":"Starbucks","aliases":["STARBKS"]}]
            }"#,
        )
        .unwrap();

        let config = ReconConfig::from_file(&path).unwrap();
        assert_eq!(config.alias_files, vec![dir.path().join("travel.json")]);

        let normalizer = config.build_normalizer().unwrap();
        assert_eq!(normalizer.len(), 14);
        assert_eq!(normalizer.normalize("GRABTAXI 8812"), "Grab");
        assert_eq!(normalizer.normalize("STARBKS RESERVE"), "Starbucks");
        assert_eq!(normalizer.category_of("STARBKS"), Some("Meals".to_string()));
    }

    #[test]
    fn test_build_normalizer_missing_alias_file() {
        let config = ReconConfig {
            alias_files: vec![PathBuf::from("/nonexistent/aliases.json")],
            ..ReconConfig::default()
        };

        let err = config.build_normalizer().unwrap_err();
        assert!(err.to_string().contains("Failed to read alias file"));
    }
}
