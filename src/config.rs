// ============================================
// config.rs - Configuration Management
// ============================================
// Loads configuration from YAML file
// Supports environment variable substitution

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::LeafError;

const API_KEY_PLACEHOLDER: &str = "YOUR_GEMINI_API_KEY_HERE";

lazy_static! {
    static ref ENV_VAR: Regex = Regex::new(r"\$\{([^}]+)\}").expect("valid regex");
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gemini_api_key: String,

    /// Default `lat,lon` for weather-based recommendations and forecasts.
    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_retry_count")]
    pub retry_count: usize,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    pub file: Option<String>,
    #[serde(default)]
    pub json_format: bool,
    #[serde(default = "default_true")]
    pub timestamps: bool,
    #[serde(default)]
    pub caller_info: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_path")]
    pub path: String,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_share_base_url")]
    pub share_base_url: String,
}

// Default value functions
fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_gemini_model() -> String { "gemini-2.5-flash".to_string() }
fn default_temperature() -> f32 { 0.4 }
fn default_max_tokens() -> usize { 8192 }
fn default_retry_count() -> usize { 3 }
fn default_retry_delay() -> u64 { 2 }
fn default_history_path() -> String { "~/.local/share/leafdoc/history.db".to_string() }
fn default_max_entries() -> usize { 12 }
fn default_output_dir() -> String { ".".to_string() }
fn default_share_base_url() -> String { "https://leafdoc.app/".to_string() }

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: default_gemini_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            retry_count: default_retry_count(),
            retry_delay: default_retry_delay(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
            json_format: false,
            timestamps: true,
            caller_info: false,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: default_history_path(),
            max_entries: default_max_entries(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            share_base_url: default_share_base_url(),
        }
    }
}

impl Config {
    /// `~/.config/leafdoc/config.yaml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| expand_tilde(Path::new("~/.config")))
            .join("leafdoc")
            .join("config.yaml")
    }

    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let expanded_path = expand_tilde(path.as_ref());

        let contents = std::fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {:?}", expanded_path))?;

        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let contents = substitute_env_vars(contents);

        let mut config: Config =
            serde_yaml::from_str(&contents).context("Failed to parse config file")?;

        if config.gemini_api_key.is_empty() {
            config.gemini_api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();
        }

        Ok(config)
    }

    /// Like `load`, but a missing file yields the defaults with the API key
    /// taken from `GEMINI_API_KEY`.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(expand_tilde)
            .unwrap_or_else(Self::default_path);

        if path.exists() {
            return Self::load(&path);
        }

        debug!("No config file at {:?}, using defaults", path);
        Ok(Self {
            gemini_api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            ..Self::default()
        })
    }

    /// The configured key, rejecting the template placeholder and any
    /// `${VAR}` left behind by an unset environment variable.
    pub fn require_api_key(&self) -> Result<&str, LeafError> {
        let key = self.gemini_api_key.trim();
        if key.is_empty() || key == API_KEY_PLACEHOLDER || ENV_VAR.is_match(key) {
            return Err(LeafError::ApiKeyMissing);
        }
        Ok(key)
    }

    /// Get log file path with expansion
    pub fn log_file_path(&self) -> Option<PathBuf> {
        self.logging.file.as_ref().map(|p| expand_tilde(Path::new(p)))
    }

    pub fn history_path(&self) -> PathBuf {
        expand_tilde(Path::new(&self.history.path))
    }

    pub fn output_dir(&self) -> PathBuf {
        expand_tilde(Path::new(&self.export.output_dir))
    }
}

/// Expand ~ to home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    if path.starts_with("~") {
        if let Some(home) = dirs::home_dir() {
            let path_str = path.to_string_lossy();
            let expanded = path_str.replacen('~', &home.to_string_lossy(), 1);
            return PathBuf::from(expanded);
        }
    }
    path.to_path_buf()
}

/// Substitute environment variables in format ${VAR_NAME}.
/// Unset variables are left as written.
fn substitute_env_vars(text: &str) -> String {
    ENV_VAR
        .replace_all(text, |cap: &regex::Captures| {
            std::env::var(&cap[1]).unwrap_or_else(|_| cap[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("LEAFDOC_TEST_VAR", "hello");
        let result = substitute_env_vars("Value is ${LEAFDOC_TEST_VAR}!");
        assert_eq!(result, "Value is hello!");
    }

    #[test]
    fn test_unset_env_var_left_alone() {
        let result = substitute_env_vars("key: ${LEAFDOC_SURELY_UNSET_VAR}");
        assert_eq!(result, "key: ${LEAFDOC_SURELY_UNSET_VAR}");
    }

    #[test]
    fn test_expand_tilde() {
        let path = Path::new("~/test");
        let expanded = expand_tilde(path);
        assert!(!expanded.to_string_lossy().contains('~'));
        assert_eq!(expand_tilde(Path::new("/tmp/x")), PathBuf::from("/tmp/x"));
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gemini.model, "gemini-2.5-flash");
        assert_eq!(config.history.max_entries, 12);
        assert_eq!(config.export.output_dir, ".");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_partial_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "gemini_api_key: abc123\nlocation: \"51.5,-0.1\"\ngemini:\n  temperature: 0.9\nhistory:\n  max_entries: 5"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.gemini_api_key, "abc123");
        assert_eq!(config.location.as_deref(), Some("51.5,-0.1"));
        assert_eq!(config.gemini.temperature, 0.9);
        assert_eq!(config.gemini.model, "gemini-2.5-flash");
        assert_eq!(config.history.max_entries, 5);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(Some(&dir.path().join("none.yaml"))).unwrap();
        assert_eq!(config.gemini.max_tokens, 8192);
    }

    #[test]
    fn test_require_api_key() {
        let mut config = Config::default();
        config.gemini_api_key = API_KEY_PLACEHOLDER.to_string();
        assert!(matches!(config.require_api_key(), Err(LeafError::ApiKeyMissing)));

        config.gemini_api_key = "  ".to_string();
        assert!(config.require_api_key().is_err());

        config.gemini_api_key = "real-key".to_string();
        assert_eq!(config.require_api_key().unwrap(), "real-key");
    }

    #[test]
    fn test_unset_env_var_key_is_missing() {
        let config =
            Config::from_yaml("gemini_api_key: \"${LEAFDOC_SURELY_UNSET_KEY}\"").unwrap();
        assert_eq!(config.gemini_api_key, "${LEAFDOC_SURELY_UNSET_KEY}");
        assert!(matches!(config.require_api_key(), Err(LeafError::ApiKeyMissing)));
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(Config::from_yaml("gemini: [unclosed").is_err());
    }
}
