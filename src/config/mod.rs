//! Configuration loading and layering.
//!
//! Handles `gpgenie.toml` loading, environment variable resolution,
//! validation and the conversion into pipeline settings.

pub mod loader;

pub use loader::{
    Config, ConfigError, DatabaseConfig, EncryptionConfig, EncryptionSource, GenerationConfig,
    LoggingConfig,
};
