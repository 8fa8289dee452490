//! SQLite-backed key store using diesel.

use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use super::schema::{self, AveragesRow, StatsRow, SumsRow, key_records};
use super::{
    ColumnStats, ComponentAverages, KeyQueries, KeyRepository, KeyTransaction, RepositoryError,
    insert_error, normalize_suffix,
};
use crate::models::KeyRecord;

/// A single SQLite connection holding the `key_records` table.
pub struct SqliteKeyStore {
    conn: SqliteConnection,
    url: String,
}

impl std::fmt::Debug for SqliteKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteKeyStore").field("url", &self.url).finish()
    }
}

impl SqliteKeyStore {
    /// Open (or create) the database at `url` and make sure the schema exists.
    pub fn open(url: &str) -> Result<Self, RepositoryError> {
        tracing::debug!(url, "opening key store");
        let conn = SqliteConnection::establish(url).map_err(|source| RepositoryError::Connect {
            url: url.to_string(),
            source,
        })?;
        let mut store = Self {
            conn,
            url: url.to_string(),
        };
        store.configure()?;
        store.initialize_schema()?;
        Ok(store)
    }

    /// Private in-memory database, mostly for tests.
    pub fn in_memory() -> Result<Self, RepositoryError> {
        Self::open(":memory:")
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn configure(&mut self) -> Result<(), RepositoryError> {
        diesel::sql_query("PRAGMA journal_mode=WAL;").execute(&mut self.conn)?;
        diesel::sql_query("PRAGMA busy_timeout=30000;").execute(&mut self.conn)?;
        Ok(())
    }

    fn initialize_schema(&mut self) -> Result<(), RepositoryError> {
        for statement in schema::CREATE_STATEMENTS {
            diesel::sql_query(*statement).execute(&mut self.conn)?;
        }
        tracing::debug!("key store schema ready");
        Ok(())
    }

    fn column_stats(&mut self, column: &str) -> Result<ColumnStats, RepositoryError> {
        let row: StatsRow =
            diesel::sql_query(schema::column_stats_query(column)).get_result(&mut self.conn)?;
        Ok(row.into())
    }
}

impl KeyRepository for SqliteKeyStore {
    fn begin_transaction(&mut self) -> Result<Box<dyn KeyTransaction + '_>, RepositoryError> {
        AnsiTransactionManager::begin_transaction(&mut self.conn)?;
        Ok(Box::new(SqliteTransaction {
            conn: &mut self.conn,
            finished: false,
        }))
    }
}

/// Open transaction on a [`SqliteKeyStore`]. Rolls back on drop unless
/// committed or rolled back explicitly.
struct SqliteTransaction<'a> {
    conn: &'a mut SqliteConnection,
    finished: bool,
}

impl KeyTransaction for SqliteTransaction<'_> {
    fn batch_insert(&mut self, records: &[KeyRecord]) -> Result<usize, RepositoryError> {
        let mut inserted = 0;
        for chunk in records.chunks(super::INSERT_CHUNK) {
            inserted += diesel::insert_into(key_records::table)
                .values(chunk)
                .execute(&mut *self.conn)
                .map_err(insert_error)?;
        }
        Ok(inserted)
    }

    fn commit(mut self: Box<Self>) -> Result<(), RepositoryError> {
        // a failed commit leaves `finished` unset so drop rolls back
        AnsiTransactionManager::commit_transaction(&mut *self.conn)?;
        self.finished = true;
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> Result<(), RepositoryError> {
        self.finished = true;
        AnsiTransactionManager::rollback_transaction(&mut *self.conn)?;
        Ok(())
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("transaction dropped without commit, rolling back");
            if let Err(e) = AnsiTransactionManager::rollback_transaction(&mut *self.conn) {
                tracing::error!(error = %e, "rollback of abandoned transaction failed");
            }
        }
    }
}

impl KeyQueries for SqliteKeyStore {
    fn top_by_score(&mut self, limit: usize) -> Result<Vec<KeyRecord>, RepositoryError> {
        use schema::key_records::dsl::*;

        let records = key_records
            .select(KeyRecord::as_select())
            .order((score.desc(), fingerprint.asc()))
            .limit(limit as i64)
            .load(&mut self.conn)?;
        Ok(records)
    }

    fn by_uniqueness_ascending(&mut self, limit: usize) -> Result<Vec<KeyRecord>, RepositoryError> {
        use schema::key_records::dsl::*;

        let records = key_records
            .select(KeyRecord::as_select())
            .order((unique_digit_count.asc(), score.desc(), fingerprint.asc()))
            .limit(limit as i64)
            .load(&mut self.conn)?;
        Ok(records)
    }

    fn by_fingerprint_suffix(&mut self, suffix: &str) -> Result<Option<KeyRecord>, RepositoryError> {
        use schema::key_records::dsl::*;

        let suffix = normalize_suffix(suffix)?;
        let mut matches = key_records
            .select(KeyRecord::as_select())
            .filter(fingerprint.like(format!("%{suffix}")))
            .limit(2)
            .load(&mut self.conn)?;

        match matches.len() {
            0 | 1 => Ok(matches.pop()),
            _ => {
                let count = key_records
                    .filter(fingerprint.like(format!("%{suffix}")))
                    .count()
                    .get_result::<i64>(&mut self.conn)?;
                Err(RepositoryError::AmbiguousSuffix {
                    suffix,
                    count: count as usize,
                })
            }
        }
    }

    fn score_stats(&mut self) -> Result<ColumnStats, RepositoryError> {
        self.column_stats("score")
    }

    fn uniqueness_stats(&mut self) -> Result<ColumnStats, RepositoryError> {
        self.column_stats("unique_digit_count")
    }

    fn component_averages(&mut self) -> Result<ComponentAverages, RepositoryError> {
        let row: AveragesRow =
            diesel::sql_query(schema::COMPONENT_AVERAGES_QUERY).get_result(&mut self.conn)?;
        Ok(row.into())
    }

    fn score_uniqueness_correlation(&mut self) -> Result<f64, RepositoryError> {
        let row: SumsRow =
            diesel::sql_query(schema::CORRELATION_SUMS_QUERY).get_result(&mut self.conn)?;
        Ok(row.pearson())
    }

    fn count(&mut self) -> Result<i64, RepositoryError> {
        use schema::key_records::dsl::*;

        Ok(key_records.count().get_result(&mut self.conn)?)
    }
}
