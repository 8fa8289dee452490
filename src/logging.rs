//! Structured log output on stderr.
//!
//! Filter resolution, first match wins: `--verbose` (debug), `GPGENIE_LOG`,
//! `RUST_LOG`, then the `[logging] level` config value.

use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;

use crate::constants::ENV_LOG;
use crate::env::Env;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{directive}': {source}")]
    Filter {
        directive: String,
        source: ParseError,
    },

    #[error("failed to install log subscriber: {0}")]
    Install(#[from] TryInitError),
}

/// Pick the filter directive to use.
pub fn resolve_directive(verbose: bool, config_level: &str, env: &Env) -> String {
    if verbose {
        return "debug".to_string();
    }
    env.var(ENV_LOG)
        .or_else(|| env.var("RUST_LOG"))
        .unwrap_or_else(|| config_level.to_string())
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(directive: &str) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_new(directive).map_err(|source| LoggingError::Filter {
        directive: directive.to_string(),
        source,
    })?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .try_init()?;
    Ok(())
}
