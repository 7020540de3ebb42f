//! Configuration loading and resolution for Guru services
//!
//! Settings are resolved once at startup into an immutable [`GuruConfig`]
//! that is passed explicitly into every component that needs it. Resolution
//! follows the priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`GURU_*`)
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default HTTP listen port for guru-ia
pub const DEFAULT_PORT: u16 = 8361;
/// Default number of pipeline workers draining the job queue
pub const DEFAULT_WORKERS: usize = 4;
/// Default Azure OpenAI API version
pub const DEFAULT_API_VERSION: &str = "2024-02-01";
/// Default model deployment name
pub const DEFAULT_DEPLOYMENT: &str = "gpt-4o";

/// TOML configuration file contents (all fields optional)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub port: Option<u16>,
    pub database_path: Option<String>,
    pub prompts_dir: Option<String>,
    pub reference_dir: Option<String>,
    pub workers: Option<usize>,
    #[serde(default)]
    pub model: ModelToml,
    #[serde(default)]
    pub callback: CallbackToml,
}

/// `[model]` section of the TOML config
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelToml {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub deployment: Option<String>,
    pub api_version: Option<String>,
}

/// `[callback]` section of the TOML config
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackToml {
    pub api_key: Option<String>,
}

/// Resolved model provider settings
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Azure OpenAI resource endpoint, e.g. `https://myresource.openai.azure.com`
    pub endpoint: String,
    /// API key sent in the `api-key` request header
    pub api_key: String,
    /// Deployment name addressed in the request path
    pub deployment: String,
    /// API version query parameter
    pub api_version: String,
}

/// Resolved webhook callback settings
#[derive(Debug, Clone)]
pub struct CallbackConfig {
    /// Value of the `Boom724ExternalApiKey` header sent with every callback
    pub api_key: String,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct GuruConfig {
    pub port: u16,
    pub database_path: PathBuf,
    pub prompts_dir: PathBuf,
    pub reference_dir: PathBuf,
    pub workers: usize,
    pub model: ModelConfig,
    pub callback: CallbackConfig,
}

/// Command-line overrides (highest priority tier)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub port: Option<u16>,
}

impl GuruConfig {
    /// Resolve configuration from process environment and TOML file.
    ///
    /// Fails fast on missing required model settings: a service that cannot
    /// reach its model provider must not accept submissions.
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self> {
        let toml_config = load_toml_config(overrides.config_path.as_deref())?;
        resolve_with(overrides, toml_config, |name| std::env::var(name).ok())
    }
}

/// Locate and parse the TOML config file.
///
/// Search order: explicit path (CLI), `GURU_CONFIG` env var,
/// `./guru-ia.toml`, `~/.config/guru/guru-ia.toml`. A missing file yields
/// defaults; a file that exists but fails to parse is a hard error.
pub fn load_toml_config(explicit_path: Option<&Path>) -> Result<TomlConfig> {
    let candidate = explicit_path
        .map(PathBuf::from)
        .or_else(|| std::env::var("GURU_CONFIG").ok().map(PathBuf::from))
        .or_else(|| {
            let local = PathBuf::from("guru-ia.toml");
            local.exists().then_some(local)
        })
        .or_else(|| {
            dirs::config_dir()
                .map(|d| d.join("guru").join("guru-ia.toml"))
                .filter(|p| p.exists())
        });

    let Some(path) = candidate else {
        return Ok(TomlConfig::default());
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    tracing::info!("Configuration loaded from {}", path.display());
    Ok(config)
}

/// Resolve configuration against an injectable environment lookup.
///
/// Split out from [`GuruConfig::resolve`] so tests can supply a synthetic
/// environment without mutating process state.
pub fn resolve_with(
    overrides: ConfigOverrides,
    toml_config: TomlConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<GuruConfig> {
    let port = overrides
        .port
        .or_else(|| env("GURU_PORT").and_then(|v| v.parse().ok()))
        .or(toml_config.port)
        .unwrap_or(DEFAULT_PORT);

    let database_path = env("GURU_DATABASE_PATH")
        .or(toml_config.database_path)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("guru.db"));

    let prompts_dir = env("GURU_PROMPTS_DIR")
        .or(toml_config.prompts_dir)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("prompts"));

    let reference_dir = env("GURU_REFERENCE_DIR")
        .or(toml_config.reference_dir)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("reference"));

    let workers = env("GURU_WORKERS")
        .and_then(|v| v.parse().ok())
        .or(toml_config.workers)
        .unwrap_or(DEFAULT_WORKERS)
        .max(1);

    let endpoint = require(
        env("GURU_MODEL_ENDPOINT").or(toml_config.model.endpoint),
        "model endpoint",
        "GURU_MODEL_ENDPOINT",
        "[model] endpoint",
    )?;
    let model_api_key = require(
        env("GURU_MODEL_API_KEY").or(toml_config.model.api_key),
        "model API key",
        "GURU_MODEL_API_KEY",
        "[model] api_key",
    )?;

    let model = ModelConfig {
        endpoint: endpoint.trim_end_matches('/').to_string(),
        api_key: model_api_key,
        deployment: env("GURU_MODEL_DEPLOYMENT")
            .or(toml_config.model.deployment)
            .unwrap_or_else(|| DEFAULT_DEPLOYMENT.to_string()),
        api_version: env("GURU_MODEL_API_VERSION")
            .or(toml_config.model.api_version)
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
    };

    let callback = CallbackConfig {
        api_key: env("GURU_CALLBACK_API_KEY")
            .or(toml_config.callback.api_key)
            .unwrap_or_default(),
    };

    Ok(GuruConfig {
        port,
        database_path,
        prompts_dir,
        reference_dir,
        workers,
        model,
        callback,
    })
}

/// Validate a required setting, producing an actionable error when absent
fn require(
    value: Option<String>,
    what: &str,
    env_name: &str,
    toml_key: &str,
) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::Config(format!(
            "{} not configured. Please configure using one of:\n\
             1. Environment: {}=...\n\
             2. TOML config: guru-ia.toml ({})",
            what, env_name, toml_key
        ))),
    }
}
