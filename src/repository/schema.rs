//! Table definition for persisted keys, plus the DDL and aggregate queries
//! shared by every backend.

use diesel::QueryableByName;
use diesel::sql_types::{BigInt, Double};

diesel::table! {
    key_records (fingerprint) {
        fingerprint -> Text,
        public_key -> Text,
        private_key -> Text,
        repeat_score -> Integer,
        increasing_score -> Integer,
        decreasing_score -> Integer,
        magic_score -> Integer,
        score -> Integer,
        unique_digit_count -> Integer,
    }
}

/// DDL applied when a store is opened. Idempotent. Valid for both SQLite and
/// PostgreSQL.
pub(crate) const CREATE_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS key_records (
        fingerprint TEXT PRIMARY KEY NOT NULL,
        public_key TEXT NOT NULL,
        private_key TEXT NOT NULL,
        repeat_score INTEGER NOT NULL,
        increasing_score INTEGER NOT NULL,
        decreasing_score INTEGER NOT NULL,
        magic_score INTEGER NOT NULL,
        score INTEGER NOT NULL,
        unique_digit_count INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_key_records_score ON key_records (score)",
    "CREATE INDEX IF NOT EXISTS idx_key_records_unique_digit_count ON key_records (unique_digit_count)",
];

// Aggregates cast to DOUBLE PRECISION: REAL affinity on SQLite, float8 on
// PostgreSQL. Both decode as `Double`.

pub(crate) fn column_stats_query(column: &str) -> String {
    format!(
        "SELECT COUNT(*) AS count, \
         CAST(COALESCE(AVG({column}), 0) AS DOUBLE PRECISION) AS mean, \
         CAST(COALESCE(MIN({column}), 0) AS DOUBLE PRECISION) AS min, \
         CAST(COALESCE(MAX({column}), 0) AS DOUBLE PRECISION) AS max \
         FROM key_records"
    )
}

pub(crate) const COMPONENT_AVERAGES_QUERY: &str = "\
    SELECT CAST(COALESCE(AVG(repeat_score), 0) AS DOUBLE PRECISION) AS repeat, \
    CAST(COALESCE(AVG(increasing_score), 0) AS DOUBLE PRECISION) AS increasing, \
    CAST(COALESCE(AVG(decreasing_score), 0) AS DOUBLE PRECISION) AS decreasing, \
    CAST(COALESCE(AVG(magic_score), 0) AS DOUBLE PRECISION) AS magic \
    FROM key_records";

pub(crate) const CORRELATION_SUMS_QUERY: &str = "\
    SELECT CAST(COUNT(*) AS DOUBLE PRECISION) AS n, \
    CAST(COALESCE(SUM(score), 0) AS DOUBLE PRECISION) AS sum_x, \
    CAST(COALESCE(SUM(unique_digit_count), 0) AS DOUBLE PRECISION) AS sum_y, \
    CAST(COALESCE(SUM(CAST(score AS DOUBLE PRECISION) * score), 0) AS DOUBLE PRECISION) AS sum_xx, \
    CAST(COALESCE(SUM(CAST(unique_digit_count AS DOUBLE PRECISION) * unique_digit_count), 0) AS DOUBLE PRECISION) AS sum_yy, \
    CAST(COALESCE(SUM(CAST(score AS DOUBLE PRECISION) * unique_digit_count), 0) AS DOUBLE PRECISION) AS sum_xy \
    FROM key_records";

#[derive(QueryableByName)]
pub(crate) struct StatsRow {
    #[diesel(sql_type = BigInt)]
    pub count: i64,
    #[diesel(sql_type = Double)]
    pub mean: f64,
    #[diesel(sql_type = Double)]
    pub min: f64,
    #[diesel(sql_type = Double)]
    pub max: f64,
}

#[derive(QueryableByName)]
pub(crate) struct AveragesRow {
    #[diesel(sql_type = Double)]
    pub repeat: f64,
    #[diesel(sql_type = Double)]
    pub increasing: f64,
    #[diesel(sql_type = Double)]
    pub decreasing: f64,
    #[diesel(sql_type = Double)]
    pub magic: f64,
}

#[derive(QueryableByName)]
pub(crate) struct SumsRow {
    #[diesel(sql_type = Double)]
    pub n: f64,
    #[diesel(sql_type = Double)]
    pub sum_x: f64,
    #[diesel(sql_type = Double)]
    pub sum_y: f64,
    #[diesel(sql_type = Double)]
    pub sum_xx: f64,
    #[diesel(sql_type = Double)]
    pub sum_yy: f64,
    #[diesel(sql_type = Double)]
    pub sum_xy: f64,
}

impl From<StatsRow> for super::ColumnStats {
    fn from(row: StatsRow) -> Self {
        Self {
            count: row.count,
            mean: row.mean,
            min: row.min,
            max: row.max,
        }
    }
}

impl From<AveragesRow> for super::ComponentAverages {
    fn from(row: AveragesRow) -> Self {
        Self {
            repeat: row.repeat,
            increasing: row.increasing,
            decreasing: row.decreasing,
            magic: row.magic,
        }
    }
}

impl SumsRow {
    pub fn pearson(&self) -> f64 {
        super::pearson(self.n, self.sum_x, self.sum_y, self.sum_xx, self.sum_yy, self.sum_xy)
    }
}
