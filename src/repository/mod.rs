//! Persistence of accepted keys.
//!
//! Writes go through [`KeyRepository`] and [`KeyTransaction`]: the saver
//! opens one transaction per batch, inserts the batch and commits it, or
//! rolls it back on failure. Reads for the reporting commands go through
//! [`KeyQueries`]. [`SqliteKeyStore`] and, with the `postgres` feature,
//! [`PgKeyStore`] implement both; [`KeyStore`] picks one at runtime.

#[cfg(feature = "postgres")]
pub mod postgres;
pub mod schema;
pub mod sqlite;

#[cfg(feature = "postgres")]
pub use postgres::PgKeyStore;
pub use sqlite::SqliteKeyStore;

use diesel::result::DatabaseErrorKind;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::entity::fingerprint::FINGERPRINT_LEN;
use crate::models::KeyRecord;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("failed to open database '{url}': {source}")]
    Connect {
        url: String,
        #[source]
        source: diesel::ConnectionError,
    },

    #[error("duplicate fingerprint in batch insert")]
    DuplicateFingerprint(#[source] diesel::result::Error),

    #[error("invalid fingerprint suffix '{0}': expected 1 to 40 hex digits")]
    InvalidSuffix(String),

    #[error("fingerprint suffix '{suffix}' matches {count} keys; use a longer suffix")]
    AmbiguousSuffix { suffix: String, count: usize },

    #[error("database backend '{0}' is not compiled in; rebuild with `--features {0}`")]
    UnsupportedBackend(Backend),

    #[error("database error: {0}")]
    Query(#[from] diesel::result::Error),
}

/// Database engine behind a [`KeyStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Backend {
    Sqlite,
    Postgres,
}

impl Backend {
    /// `postgres://` and `postgresql://` URLs select PostgreSQL; anything
    /// else is a SQLite path.
    pub fn from_url(url: &str) -> Self {
        let url = url.trim_start();
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Backend::Postgres
        } else {
            Backend::Sqlite
        }
    }

    pub fn is_compiled_in(self) -> bool {
        match self {
            Backend::Sqlite => true,
            Backend::Postgres => cfg!(feature = "postgres"),
        }
    }
}

/// A key store on whichever backend the configuration names.
#[derive(Debug)]
pub enum KeyStore {
    Sqlite(SqliteKeyStore),
    #[cfg(feature = "postgres")]
    Postgres(PgKeyStore),
}

macro_rules! dispatch {
    ($store:expr, $inner:ident => $body:expr) => {
        match $store {
            KeyStore::Sqlite($inner) => $body,
            #[cfg(feature = "postgres")]
            KeyStore::Postgres($inner) => $body,
        }
    };
}

impl KeyStore {
    /// Open the store at `url`. `backend` overrides detection from the URL.
    pub fn open(backend: Option<Backend>, url: &str) -> Result<Self, RepositoryError> {
        let backend = backend.unwrap_or_else(|| Backend::from_url(url));
        tracing::debug!(%backend, "selected key store backend");
        match backend {
            Backend::Sqlite => Ok(KeyStore::Sqlite(SqliteKeyStore::open(url)?)),
            #[cfg(feature = "postgres")]
            Backend::Postgres => Ok(KeyStore::Postgres(PgKeyStore::open(url)?)),
            #[cfg(not(feature = "postgres"))]
            Backend::Postgres => Err(RepositoryError::UnsupportedBackend(Backend::Postgres)),
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            KeyStore::Sqlite(_) => Backend::Sqlite,
            #[cfg(feature = "postgres")]
            KeyStore::Postgres(_) => Backend::Postgres,
        }
    }
}

impl KeyRepository for KeyStore {
    fn begin_transaction(&mut self) -> Result<Box<dyn KeyTransaction + '_>, RepositoryError> {
        dispatch!(self, store => store.begin_transaction())
    }
}

impl KeyQueries for KeyStore {
    fn top_by_score(&mut self, limit: usize) -> Result<Vec<KeyRecord>, RepositoryError> {
        dispatch!(self, store => store.top_by_score(limit))
    }

    fn by_uniqueness_ascending(&mut self, limit: usize) -> Result<Vec<KeyRecord>, RepositoryError> {
        dispatch!(self, store => store.by_uniqueness_ascending(limit))
    }

    fn by_fingerprint_suffix(&mut self, suffix: &str) -> Result<Option<KeyRecord>, RepositoryError> {
        dispatch!(self, store => store.by_fingerprint_suffix(suffix))
    }

    fn score_stats(&mut self) -> Result<ColumnStats, RepositoryError> {
        dispatch!(self, store => store.score_stats())
    }

    fn uniqueness_stats(&mut self) -> Result<ColumnStats, RepositoryError> {
        dispatch!(self, store => store.uniqueness_stats())
    }

    fn component_averages(&mut self) -> Result<ComponentAverages, RepositoryError> {
        dispatch!(self, store => store.component_averages())
    }

    fn score_uniqueness_correlation(&mut self) -> Result<f64, RepositoryError> {
        dispatch!(self, store => store.score_uniqueness_correlation())
    }

    fn count(&mut self) -> Result<i64, RepositoryError> {
        dispatch!(self, store => store.count())
    }
}

/// Write side: hands out transactions. Confined to the saver.
pub trait KeyRepository: Send {
    fn begin_transaction(&mut self) -> Result<Box<dyn KeyTransaction + '_>, RepositoryError>;
}

/// One open transaction. Dropping it without committing rolls it back.
pub trait KeyTransaction {
    /// Insert every record; returns the number of rows written. A duplicate
    /// fingerprint is an error.
    fn batch_insert(&mut self, records: &[KeyRecord]) -> Result<usize, RepositoryError>;

    fn commit(self: Box<Self>) -> Result<(), RepositoryError>;

    fn rollback(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Read side used by the reporting, export and analysis commands.
pub trait KeyQueries {
    /// Highest total score first.
    fn top_by_score(&mut self, limit: usize) -> Result<Vec<KeyRecord>, RepositoryError>;

    /// Fewest distinct digits first, ties broken by higher score.
    fn by_uniqueness_ascending(&mut self, limit: usize) -> Result<Vec<KeyRecord>, RepositoryError>;

    /// The single key whose fingerprint ends with `suffix` (case-insensitive).
    fn by_fingerprint_suffix(&mut self, suffix: &str) -> Result<Option<KeyRecord>, RepositoryError>;

    fn score_stats(&mut self) -> Result<ColumnStats, RepositoryError>;

    fn uniqueness_stats(&mut self) -> Result<ColumnStats, RepositoryError>;

    fn component_averages(&mut self) -> Result<ComponentAverages, RepositoryError>;

    /// Pearson correlation between total score and unique digit count.
    /// Zero when there are fewer than two rows or either column is constant.
    fn score_uniqueness_correlation(&mut self) -> Result<f64, RepositoryError>;

    fn count(&mut self) -> Result<i64, RepositoryError>;
}

/// Count, mean and range of one numeric column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ColumnStats {
    pub count: i64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Mean of each score component over all stored keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ComponentAverages {
    pub repeat: f64,
    pub increasing: f64,
    pub decreasing: f64,
    pub magic: f64,
}

/// Rows per INSERT statement; keeps bind parameters under every backend's limit.
pub(crate) const INSERT_CHUNK: usize = 1_000;

/// Unique violations become [`RepositoryError::DuplicateFingerprint`].
pub(crate) fn insert_error(e: diesel::result::Error) -> RepositoryError {
    match e {
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            RepositoryError::DuplicateFingerprint(e)
        }
        other => RepositoryError::Query(other),
    }
}

/// Validate and normalize a user supplied fingerprint suffix.
pub fn normalize_suffix(suffix: &str) -> Result<String, RepositoryError> {
    let trimmed = suffix.trim();
    if trimmed.is_empty() || trimmed.len() > FINGERPRINT_LEN || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RepositoryError::InvalidSuffix(suffix.to_string()));
    }
    Ok(trimmed.to_ascii_uppercase())
}

/// Pearson correlation from raw sums; 0 when undefined.
pub(crate) fn pearson(n: f64, sum_x: f64, sum_y: f64, sum_xx: f64, sum_yy: f64, sum_xy: f64) -> f64 {
    if n < 2.0 {
        return 0.0;
    }
    let cov = n * sum_xy - sum_x * sum_y;
    let var_x = n * sum_xx - sum_x * sum_x;
    let var_y = n * sum_yy - sum_y * sum_y;
    if var_x <= 0.0 || var_y <= 0.0 {
        return 0.0;
    }
    (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_normalization() {
        assert_eq!(normalize_suffix(" abc123 ").unwrap(), "ABC123");
        assert!(matches!(
            normalize_suffix(""),
            Err(RepositoryError::InvalidSuffix(_))
        ));
        assert!(normalize_suffix("12%").is_err());
        assert!(normalize_suffix(&"A".repeat(41)).is_err());
        assert!(normalize_suffix(&"A".repeat(40)).is_ok());
    }

    #[test]
    fn backend_follows_url_scheme() {
        assert_eq!(Backend::from_url("postgres://u:p@db/keys"), Backend::Postgres);
        assert_eq!(Backend::from_url("postgresql://db/keys"), Backend::Postgres);
        assert_eq!(Backend::from_url("gpgenie.db"), Backend::Sqlite);
        assert_eq!(Backend::from_url(":memory:"), Backend::Sqlite);
        assert_eq!(Backend::from_url("/var/lib/gpgenie/keys.db"), Backend::Sqlite);
        assert_eq!("Postgres".parse::<Backend>().unwrap(), Backend::Postgres);
        assert!(Backend::Sqlite.is_compiled_in());
    }

    #[test]
    fn explicit_backend_overrides_url() {
        let store = KeyStore::open(Some(Backend::Sqlite), ":memory:").unwrap();
        assert_eq!(store.backend(), Backend::Sqlite);
        let store = KeyStore::open(None, ":memory:").unwrap();
        assert_eq!(store.backend(), Backend::Sqlite);
    }

    #[cfg(not(feature = "postgres"))]
    #[test]
    fn postgres_needs_the_feature() {
        let err = KeyStore::open(None, "postgres://localhost/keys").unwrap_err();
        assert!(matches!(err, RepositoryError::UnsupportedBackend(Backend::Postgres)));
        assert!(err.to_string().contains("--features postgres"));
        assert!(!Backend::Postgres.is_compiled_in());
    }

    #[test]
    fn key_store_delegates_reads_and_writes() {
        let mut store = KeyStore::open(None, ":memory:").unwrap();
        let record = KeyRecord::new(
            &format!("{}8888888888888888", "0".repeat(24)),
            "public",
            "private",
            &crate::models::Score::default(),
        );
        let mut tx = store.begin_transaction().unwrap();
        assert_eq!(tx.batch_insert(std::slice::from_ref(&record)).unwrap(), 1);
        tx.commit().unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.by_fingerprint_suffix("8888").unwrap(), Some(record));
    }

    #[test]
    fn pearson_of_perfect_line() {
        // (1,2) (2,4) (3,6)
        let r = pearson(3.0, 6.0, 12.0, 14.0, 56.0, 28.0);
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_degenerate_cases() {
        assert_eq!(pearson(0.0, 0.0, 0.0, 0.0, 0.0, 0.0), 0.0);
        assert_eq!(pearson(1.0, 5.0, 3.0, 25.0, 9.0, 15.0), 0.0);
        // constant y
        assert_eq!(pearson(3.0, 6.0, 3.0, 14.0, 3.0, 6.0), 0.0);
    }
}
