//! Config struct and loading logic.
//!
//! Priority (highest to lowest):
//! 1. CLI flags (applied by the binary)
//! 2. Environment variables
//! 3. `gpgenie.toml` in the working directory, or the file given by `--config`
//! 4. `~/.config/gpgenie/config.toml` (global defaults)
//! 5. Built-in defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::constants::{
    CONFIG_DIR, CONFIG_FILENAME, DEFAULT_DATABASE_URL, ENV_DATABASE_URL, ENV_ENCRYPTION_KEY,
};
use crate::env::Env;
use crate::models::Identity;
use crate::pipeline::PipelineConfig;
use crate::repository::Backend;
use crate::scoring::{AcceptancePolicy, PolicyError};

/// Errors during config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to read encryption key file {path}: {source}")]
    ReadKeyFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: acceptance.{0}")]
    Policy(#[from] PolicyError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub generation: GenerationConfig,
    pub acceptance: AcceptancePolicy,
    pub encryption: EncryptionConfig,
    pub logging: LoggingConfig,
}

/// Where accepted keys are stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `sqlite` or `postgres`. Detected from `url` when unset.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub backend: Option<Backend>,
    /// SQLite database path (or `:memory:`), or a `postgres://` URL.
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: None,
            url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl DatabaseConfig {
    pub fn resolved_backend(&self) -> Backend {
        self.backend.unwrap_or_else(|| Backend::from_url(&self.url))
    }
}

/// Pipeline sizing and the identity stamped on generated keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub total_keys: u64,
    pub generator_workers: usize,
    pub scorer_workers: usize,
    pub batch_size: usize,
    pub queue_depth: usize,
    pub name: String,
    pub comment: String,
    pub email: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        let pipeline = PipelineConfig::default();
        let identity = Identity::default();
        Self {
            total_keys: pipeline.total_keys,
            generator_workers: pipeline.generator_workers,
            scorer_workers: pipeline.scorer_workers,
            batch_size: pipeline.batch_size,
            queue_depth: pipeline.queue_depth,
            name: identity.name,
            comment: identity.comment,
            email: identity.email,
        }
    }
}

/// Encryption of private keys at rest.
///
/// Either a symmetric key (`key_file` or `GPGENIE_ENCRYPTION_KEY`) or an
/// OpenPGP recipient certificate (`public_key_path`), never both.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// File holding the 64-character hex key.
    pub key_file: Option<PathBuf>,
    /// Armored OpenPGP certificate to encrypt private keys to.
    pub public_key_path: Option<PathBuf>,
    /// Hex key from the environment. Never read from or written to files.
    #[serde(skip)]
    pub key: Option<String>,
}

impl std::fmt::Debug for EncryptionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionConfig")
            .field("key_file", &self.key_file)
            .field("public_key_path", &self.public_key_path)
            .field("key", &self.key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// How private keys get sealed before they are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptionSource {
    None,
    /// 64-character hex key for XChaCha20-Poly1305.
    Symmetric(String),
    /// Armored certificate of the OpenPGP recipient.
    Recipient(PathBuf),
}

/// Log filter used when neither `GPGENIE_LOG` nor `RUST_LOG` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration with proper layering.
    ///
    /// `explicit` is the `--config` path; when given it replaces the local
    /// `gpgenie.toml` lookup in `work_dir` and must exist.
    pub fn load(explicit: Option<&Path>, work_dir: &Path, env: &Env) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Layer 4: global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                config.merge(global);
            }
        }

        // Layer 3: local or explicit config
        match explicit {
            Some(path) => config.merge(Self::load_file(path)?),
            None => {
                let local_path = work_dir.join(CONFIG_FILENAME);
                if local_path.exists() {
                    config.merge(Self::load_file(&local_path)?);
                }
            }
        }

        // Layer 2: environment variables
        config.apply_env_vars(env);

        Ok(config)
    }

    /// Load a config from a specific file.
    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the global config file path.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR).join("config.toml"))
    }

    /// Merge another config into this one (other takes precedence for non-default values).
    fn merge(&mut self, other: Config) {
        if other.database.backend.is_some() {
            self.database.backend = other.database.backend;
        }
        if other.database.url != DatabaseConfig::default().url {
            self.database.url = other.database.url;
        }

        let default_gen = GenerationConfig::default();
        let generation = other.generation;
        if generation.total_keys != default_gen.total_keys {
            self.generation.total_keys = generation.total_keys;
        }
        if generation.generator_workers != default_gen.generator_workers {
            self.generation.generator_workers = generation.generator_workers;
        }
        if generation.scorer_workers != default_gen.scorer_workers {
            self.generation.scorer_workers = generation.scorer_workers;
        }
        if generation.batch_size != default_gen.batch_size {
            self.generation.batch_size = generation.batch_size;
        }
        if generation.queue_depth != default_gen.queue_depth {
            self.generation.queue_depth = generation.queue_depth;
        }
        if generation.name != default_gen.name {
            self.generation.name = generation.name;
        }
        if generation.comment != default_gen.comment {
            self.generation.comment = generation.comment;
        }
        if generation.email != default_gen.email {
            self.generation.email = generation.email;
        }

        let default_policy = AcceptancePolicy::default();
        let policy = other.acceptance;
        if policy.min_score != default_policy.min_score {
            self.acceptance.min_score = policy.min_score;
        }
        if policy.score_comparison != default_policy.score_comparison {
            self.acceptance.score_comparison = policy.score_comparison;
        }
        if policy.max_unique_digits != default_policy.max_unique_digits {
            self.acceptance.max_unique_digits = policy.max_unique_digits;
        }
        if policy.unique_comparison != default_policy.unique_comparison {
            self.acceptance.unique_comparison = policy.unique_comparison;
        }
        if policy.combine != default_policy.combine {
            self.acceptance.combine = policy.combine;
        }

        if other.encryption.key_file.is_some() {
            self.encryption.key_file = other.encryption.key_file;
        }
        if other.encryption.public_key_path.is_some() {
            self.encryption.public_key_path = other.encryption.public_key_path;
        }

        if other.logging.level != LoggingConfig::default().level {
            self.logging.level = other.logging.level;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_vars(&mut self, env: &Env) {
        if let Some(url) = env.var(ENV_DATABASE_URL) {
            self.database.url = url;
        }
        if let Some(key) = env.var(ENV_ENCRYPTION_KEY) {
            self.encryption.key = Some(key.trim().to_string());
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let generation = &self.generation;
        let zero = [
            ("generation.total_keys", generation.total_keys == 0),
            ("generation.generator_workers", generation.generator_workers == 0),
            ("generation.scorer_workers", generation.scorer_workers == 0),
            ("generation.batch_size", generation.batch_size == 0),
            ("generation.queue_depth", generation.queue_depth == 0),
        ];
        if let Some((name, _)) = zero.iter().find(|(_, is_zero)| *is_zero) {
            return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
        }
        self.acceptance.validate()?;
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Invalid("database.url must not be empty".to_string()));
        }
        let encryption = &self.encryption;
        if encryption.public_key_path.is_some()
            && (encryption.key.is_some() || encryption.key_file.is_some())
        {
            return Err(ConfigError::Invalid(
                "encryption.public_key_path cannot be combined with a symmetric encryption key"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            total_keys: self.generation.total_keys,
            generator_workers: self.generation.generator_workers,
            scorer_workers: self.generation.scorer_workers,
            batch_size: self.generation.batch_size,
            queue_depth: self.generation.queue_depth,
            policy: self.acceptance,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity::new(
            &self.generation.name,
            &self.generation.comment,
            &self.generation.email,
        )
    }

    /// Which encryptor `generate` should use.
    pub fn encryption_source(&self) -> Result<EncryptionSource, ConfigError> {
        if let Some(path) = &self.encryption.public_key_path {
            return Ok(EncryptionSource::Recipient(path.clone()));
        }
        Ok(match self.encryption_key()? {
            Some(key) => EncryptionSource::Symmetric(key),
            None => EncryptionSource::None,
        })
    }

    /// The hex encryption key: the environment wins over `key_file`.
    /// `None` means private keys are stored unencrypted.
    pub fn encryption_key(&self) -> Result<Option<String>, ConfigError> {
        if let Some(key) = &self.encryption.key {
            return Ok(Some(key.clone()));
        }
        match &self.encryption.key_file {
            Some(path) => {
                let content =
                    std::fs::read_to_string(path).map_err(|e| ConfigError::ReadKeyFile {
                        path: path.clone(),
                        source: e,
                    })?;
                Ok(Some(content.trim().to_string()))
            }
            None => Ok(None),
        }
    }
}
