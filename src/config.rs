use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result, anyhow};

use crate::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Environment variables checked for the credential, in order
const API_KEY_ENV_VARS: &[&str] = &["API_KEY", "GEMINI_API_KEY"];

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        let config = Self::load_from(&config_path)?;
        Ok(config.with_env_overrides(|name| std::env::var(name).ok()))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("Malformed config file {}", path.display()))?;
        Ok(config)
    }

    /// The first non-empty credential variable wins over the file
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .find(|value| !value.trim().is_empty())
        {
            self.api_key = Some(key);
        }
        self
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("plant-pal").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
        assert_eq!(config.model(), DEFAULT_MODEL);
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert!(config.api_key().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"api_key":"file-key","model":"gemini-1.5-pro"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_key(), Some("file-key"));
        assert_eq!(config.model(), "gemini-1.5-pro");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let config = Config {
            api_key: Some("file-key".to_string()),
            ..Config::new()
        }
        .with_env_overrides(env(&[("GEMINI_API_KEY", "env-key")]));
        assert_eq!(config.api_key(), Some("env-key"));
    }

    #[test]
    fn test_api_key_var_takes_precedence() {
        let config = Config::new()
            .with_env_overrides(env(&[("API_KEY", "primary"), ("GEMINI_API_KEY", "secondary")]));
        assert_eq!(config.api_key(), Some("primary"));
    }

    #[test]
    fn test_empty_env_does_not_clobber_file() {
        let config = Config {
            api_key: Some("file-key".to_string()),
            ..Config::new()
        }
        .with_env_overrides(env(&[("API_KEY", "")]));
        assert_eq!(config.api_key(), Some("file-key"));
    }

    #[test]
    fn test_blank_key_reads_as_absent() {
        let config = Config {
            api_key: Some("  ".to_string()),
            ..Config::new()
        };
        assert!(config.api_key().is_none());
    }
}
