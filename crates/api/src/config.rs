//! Gateway configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional file,
//! then `FLOWGUARD_*` environment variables.

use crate::gateway::ErrorPolicy;
use config::{Config, ConfigError, Environment, File};
use inference_engine::{LoadOptions, ModelFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;

/// Prefix for environment overrides (`FLOWGUARD_MODEL_PATH`, ...)
pub const ENV_PREFIX: &str = "FLOWGUARD";

/// Variable naming the optional configuration file
pub const CONFIG_FILE_ENV: &str = "FLOWGUARD_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "flowguard.toml";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Listen address
    pub bind_addr: String,

    /// Serialized model artifact
    pub model_path: PathBuf,

    /// Ordered feature-schema file paired with the model
    pub schema_path: PathBuf,

    /// Artifact format; inferred from the extension when unset
    #[serde(default)]
    pub model_format: Option<ModelFormat>,

    /// ONNX output carrying the score
    pub onnx_output_index: usize,

    /// Count rejected requests (bad shape, bad values, bad body) in `errors_total`
    pub count_validation_errors: bool,

    /// Maximum log level (trace, debug, info, warn, error)
    pub log_level: String,

    pub log_format: LogFormat,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            model_path: PathBuf::from("model.json"),
            schema_path: PathBuf::from("feature_schema.json"),
            model_format: None,
            onnx_output_index: 0,
            count_validation_errors: false,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl GatewayConfig {
    /// Load from the process environment and the configured file
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(Some(Path::new(&file)), Environment::with_prefix(ENV_PREFIX))
    }

    /// Load from an explicit file (optional on disk) and environment source
    pub fn load_from(file: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mut builder = Config::builder()
            .set_default("bind_addr", defaults.bind_addr)?
            .set_default("model_path", defaults.model_path.to_string_lossy().into_owned())?
            .set_default("schema_path", defaults.schema_path.to_string_lossy().into_owned())?
            .set_default("onnx_output_index", defaults.onnx_output_index as i64)?
            .set_default("count_validation_errors", defaults.count_validation_errors)?
            .set_default("log_level", defaults.log_level)?
            .set_default("log_format", "text")?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }

        let config: Self = builder.add_source(env).build()?.try_deserialize()?;
        config.max_level()?;
        Ok(config)
    }

    /// Parsed `log_level`
    pub fn max_level(&self) -> Result<Level, ConfigError> {
        self.log_level.parse::<Level>().map_err(|_| {
            ConfigError::Message(format!(
                "invalid log_level '{}' (expected trace, debug, info, warn or error)",
                self.log_level
            ))
        })
    }

    /// Artifact loading options
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            format: self.model_format,
            onnx_output_index: self.onnx_output_index,
        }
    }

    /// Error counting policy
    pub fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::from_flag(self.count_validation_errors)
    }
}
