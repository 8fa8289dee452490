//! App-wide constants.
//!
//! Centralises the tool name, config paths, environment variable names,
//! and scoring parameters so a rename only requires changing this file.

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "gpgenie";

/// Crate version, as reported by `gpgenie version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Local config filename, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "gpgenie.toml";

/// Directory name under `~/.config/` for global config.
pub const CONFIG_DIR: &str = "gpgenie";

/// SQLite database used when nothing else is configured.
pub const DEFAULT_DATABASE_URL: &str = "gpgenie.db";

/// Directory `export` writes into when `--output-dir` is omitted.
pub const DEFAULT_EXPORT_DIR: &str = "exported_keys";

/// Number of trailing fingerprint characters that are scored.
pub const SCORED_SUFFIX_LEN: usize = 16;

// ── Environment variable names ──────────────────────────────────────

pub const ENV_DATABASE_URL: &str = "GPGENIE_DATABASE_URL";
pub const ENV_ENCRYPTION_KEY: &str = "GPGENIE_ENCRYPTION_KEY";
pub const ENV_LOG: &str = "GPGENIE_LOG";
