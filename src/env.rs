//! Environment variable abstraction for testability.
//!
//! The binary reads through [`Env::real()`]; tests build an [`Env::mock()`]
//! so config layering can be exercised without touching the process
//! environment.

use std::collections::HashMap;
use std::str::FromStr;

/// Environment variable reader.
#[derive(Clone, Debug, Default)]
pub struct Env {
    overrides: Option<HashMap<String, String>>,
}

impl Env {
    /// Read from the real process environment.
    pub fn real() -> Self {
        Self { overrides: None }
    }

    /// Read from an explicit set of key-value pairs only.
    #[cfg(test)]
    pub fn mock(vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        Self {
            overrides: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Look up a variable. Empty values count as unset.
    pub fn var(&self, name: &str) -> Option<String> {
        let value = match &self.overrides {
            Some(map) => map.get(name).cloned(),
            None => std::env::var(name).ok(),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    /// Look up and parse a variable.
    ///
    /// Returns `Ok(None)` when the variable is unset and `Err` with the raw
    /// value when it is set but does not parse.
    pub fn parsed<T: FromStr>(&self, name: &str) -> Result<Option<T>, String> {
        match self.var(name) {
            Some(raw) => raw.trim().parse().map(Some).map_err(|_| raw),
            None => Ok(None),
        }
    }
}
