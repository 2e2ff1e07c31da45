//! Bootstrap configuration loading and resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`AVD_*`)
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: the service starts on compiled
//! defaults and logs a warning. An explicitly requested file that does not
//! exist is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable holding the API key
pub const ENV_API_KEY: &str = "AVD_API_KEY";
/// Environment variable pointing at a TOML config file
pub const ENV_CONFIG_PATH: &str = "AVD_CONFIG";
/// Environment variable overriding the model directory
pub const ENV_MODEL_DIR: &str = "AVD_MODEL_DIR";

/// Bootstrap configuration loaded from TOML file
///
/// These settings cannot change while the service runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Shared API key expected in the `x-api-key` header
    #[serde(default)]
    pub api_key: Option<String>,

    /// Upper bound on request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Embedding model and scorer weights
    #[serde(default)]
    pub model: ModelConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            api_key: None,
            max_body_bytes: default_max_body_bytes(),
            model: ModelConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Locations of the pre-trained encoder and the scorer head
///
/// File names are relative to `model_dir` unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Directory holding the model files (default: OS data dir + `avd/models`)
    #[serde(default)]
    pub model_dir: Option<PathBuf>,

    /// HuggingFace-style encoder `config.json`
    #[serde(default = "default_encoder_config")]
    pub encoder_config: PathBuf,

    /// Encoder weights (safetensors)
    #[serde(default = "default_encoder_weights")]
    pub encoder_weights: PathBuf,

    /// Scorer head weights (safetensors)
    #[serde(default = "default_scorer_weights")]
    pub scorer_weights: PathBuf,

    /// Hidden layer widths of the scorer head
    #[serde(default = "default_scorer_hidden")]
    pub scorer_hidden: Vec<usize>,

    /// Tensor name prefix inside the encoder weights (e.g. "wav2vec2")
    #[serde(default)]
    pub weight_prefix: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: None,
            encoder_config: default_encoder_config(),
            encoder_weights: default_encoder_weights(),
            scorer_weights: default_scorer_weights(),
            scorer_hidden: default_scorer_hidden(),
            weight_prefix: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_encoder_config() -> PathBuf {
    PathBuf::from("config.json")
}

fn default_encoder_weights() -> PathBuf {
    PathBuf::from("model.safetensors")
}

fn default_scorer_weights() -> PathBuf {
    PathBuf::from("scorer.safetensors")
}

fn default_scorer_hidden() -> Vec<usize> {
    vec![256, 64]
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Fully resolved model file locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub encoder_config: PathBuf,
    pub encoder_weights: PathBuf,
    pub scorer_weights: PathBuf,
}

impl ModelConfig {
    /// Resolve file locations against the model directory
    ///
    /// `dir_override` (CLI/ENV tier) takes precedence over `model_dir`.
    pub fn resolve_paths(&self, dir_override: Option<&Path>) -> ModelPaths {
        let dir = dir_override
            .map(Path::to_path_buf)
            .or_else(|| self.model_dir.clone())
            .unwrap_or_else(default_model_dir);

        ModelPaths {
            encoder_config: dir.join(&self.encoder_config),
            encoder_weights: dir.join(&self.encoder_weights),
            scorer_weights: dir.join(&self.scorer_weights),
        }
    }
}

/// OS-dependent default model directory
pub fn default_model_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("avd").join("models"))
        .unwrap_or_else(|| PathBuf::from("./avd_models"))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Locate the TOML config file
///
/// Order: explicit path, `AVD_CONFIG`, `~/.config/avd/config.toml`,
/// `/etc/avd/config.toml` (Linux only).
pub fn locate_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join("avd").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/avd/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load the TOML config, falling back to compiled defaults
///
/// An explicit path (argument or `AVD_CONFIG`) must exist; implicit
/// locations are optional.
pub fn load_or_default(explicit: Option<&Path>) -> Result<TomlConfig> {
    let requested = explicit.is_some() || std::env::var(ENV_CONFIG_PATH).is_ok();

    match locate_config_file(explicit) {
        Some(path) if path.exists() => {
            info!("Loading configuration from {}", path.display());
            load_toml_config(&path)
        }
        Some(path) if requested => Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        ))),
        _ => {
            warn!("No config file found, using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve the API key from the 3 configurable tiers
///
/// **Priority:** CLI → ENV → TOML. There is no compiled default: a
/// service without a key refuses to start.
pub fn resolve_api_key(cli_key: Option<&str>, toml_config: &TomlConfig) -> Result<String> {
    let env_key = std::env::var(ENV_API_KEY).ok();
    let candidates = [
        ("command line", cli_key.map(str::to_string)),
        ("environment", env_key),
        ("TOML", toml_config.api_key.clone()),
    ];

    let sources: Vec<&str> = candidates
        .iter()
        .filter(|(_, key)| key.as_deref().is_some_and(is_valid_key))
        .map(|(source, _)| *source)
        .collect();

    if sources.len() > 1 {
        warn!(
            "API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    for (source, key) in candidates {
        if let Some(key) = key.filter(|k| is_valid_key(k)) {
            info!("API key loaded from {}", source);
            return Ok(key);
        }
    }

    Err(Error::Config(format!(
        "API key not configured. Configure using one of:\n\
         1. Command line: --api-key your-key\n\
         2. Environment: {}=your-key\n\
         3. TOML config: api_key = \"your-key\"",
        ENV_API_KEY
    )))
}

/// Log level for the default tracing filter: command line, else TOML
///
/// Resolved ahead of [`ServiceConfig`] so the subscriber exists before
/// resolution logs anything. `RUST_LOG` still takes precedence at filter
/// construction.
pub fn resolve_log_level(cli_level: Option<&str>, toml_config: &TomlConfig) -> String {
    cli_level
        .map(str::to_string)
        .unwrap_or_else(|| toml_config.logging.level.clone())
}

/// Resolved service configuration handed to the binary
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_address: String,
    pub port: u16,
    pub api_key: String,
    pub max_body_bytes: usize,
    pub model_paths: ModelPaths,
    pub scorer_hidden: Vec<usize>,
    pub weight_prefix: Option<String>,
}

/// Command-line overrides (tier 1); `None` means "not given"
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub api_key: Option<String>,
    pub model_dir: Option<PathBuf>,
}

impl ServiceConfig {
    /// Merge command-line overrides, environment and TOML into one config
    pub fn resolve(overrides: &ConfigOverrides, toml_config: TomlConfig) -> Result<Self> {
        let api_key = resolve_api_key(overrides.api_key.as_deref(), &toml_config)?;

        let env_model_dir = std::env::var(ENV_MODEL_DIR).ok().map(PathBuf::from);
        let model_dir = overrides.model_dir.clone().or(env_model_dir);
        let model_paths = toml_config.model.resolve_paths(model_dir.as_deref());

        if toml_config.model.scorer_hidden.iter().any(|&w| w == 0) {
            return Err(Error::Config(
                "model.scorer_hidden widths must be positive".to_string(),
            ));
        }
        if toml_config.max_body_bytes == 0 {
            return Err(Error::Config("max_body_bytes must be positive".to_string()));
        }

        Ok(Self {
            bind_address: overrides
                .bind_address
                .clone()
                .unwrap_or(toml_config.bind_address),
            port: overrides.port.unwrap_or(toml_config.port),
            api_key,
            max_body_bytes: toml_config.max_body_bytes,
            model_paths,
            scorer_hidden: toml_config.model.scorer_hidden,
            weight_prefix: toml_config.model.weight_prefix,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.model.scorer_hidden, vec![256, 64]);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn model_paths_join_directory() {
        let model = ModelConfig {
            model_dir: Some(PathBuf::from("/opt/avd")),
            ..Default::default()
        };
        let paths = model.resolve_paths(None);
        assert_eq!(paths.encoder_config, PathBuf::from("/opt/avd/config.json"));
        assert_eq!(paths.scorer_weights, PathBuf::from("/opt/avd/scorer.safetensors"));

        let overridden = model.resolve_paths(Some(Path::new("/srv/models")));
        assert_eq!(
            overridden.encoder_weights,
            PathBuf::from("/srv/models/model.safetensors")
        );
    }

    #[test]
    fn absolute_file_names_win_over_directory() {
        let model = ModelConfig {
            model_dir: Some(PathBuf::from("/opt/avd")),
            scorer_weights: PathBuf::from("/elsewhere/head.safetensors"),
            ..Default::default()
        };
        let paths = model.resolve_paths(None);
        assert_eq!(paths.scorer_weights, PathBuf::from("/elsewhere/head.safetensors"));
    }

    #[test]
    fn whitespace_key_is_invalid() {
        assert!(!is_valid_key("   "));
        assert!(is_valid_key("secret"));
    }
}
