//! Persisted key record and its display projection.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::score::Score;
use crate::repository::schema::key_records;

/// One accepted key as stored in the `key_records` table.
///
/// Created by the saver when a batch is flushed; never updated.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable,
)]
#[diesel(table_name = key_records)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct KeyRecord {
    pub fingerprint: String,
    pub public_key: String,
    /// Armored private key, or its ciphertext when an encryptor was configured.
    pub private_key: String,
    pub repeat_score: i32,
    pub increasing_score: i32,
    pub decreasing_score: i32,
    pub magic_score: i32,
    /// Sum of the four score components.
    pub score: i32,
    pub unique_digit_count: i32,
}

impl KeyRecord {
    pub fn new(fingerprint: &str, public_key: &str, private_key: &str, score: &Score) -> Self {
        let mut record = Self::default();
        record.fill(fingerprint, public_key, private_key, score);
        record
    }

    /// Overwrite every field in place, reusing the existing string buffers.
    pub fn fill(&mut self, fingerprint: &str, public_key: &str, private_key: &str, score: &Score) {
        self.fingerprint.clear();
        self.fingerprint.push_str(fingerprint);
        self.public_key.clear();
        self.public_key.push_str(public_key);
        self.private_key.clear();
        self.private_key.push_str(private_key);
        self.repeat_score = score.repeat;
        self.increasing_score = score.increasing;
        self.decreasing_score = score.decreasing;
        self.magic_score = score.magic;
        self.score = score.total();
        self.unique_digit_count = score.unique_digits;
    }

    /// Reset to the empty state while keeping allocations.
    pub fn clear(&mut self) {
        self.fingerprint.clear();
        self.public_key.clear();
        self.private_key.clear();
        self.repeat_score = 0;
        self.increasing_score = 0;
        self.decreasing_score = 0;
        self.magic_score = 0;
        self.score = 0;
        self.unique_digit_count = 0;
    }

    /// The score components as a [`Score`].
    pub fn components(&self) -> Score {
        Score {
            repeat: self.repeat_score,
            increasing: self.increasing_score,
            decreasing: self.decreasing_score,
            magic: self.magic_score,
            unique_digits: self.unique_digit_count,
        }
    }

    /// The trailing part of the fingerprint that was scored.
    pub fn scored_suffix(&self) -> &str {
        crate::entity::fingerprint::scored_suffix(&self.fingerprint)
    }
}

/// Key listing entry without any key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeySummary {
    pub fingerprint: String,
    pub suffix: String,
    pub score: i32,
    pub unique_digit_count: i32,
    pub repeat_score: i32,
    pub increasing_score: i32,
    pub decreasing_score: i32,
    pub magic_score: i32,
}

impl From<&KeyRecord> for KeySummary {
    fn from(record: &KeyRecord) -> Self {
        Self {
            fingerprint: record.fingerprint.clone(),
            suffix: record.scored_suffix().to_string(),
            score: record.score,
            unique_digit_count: record.unique_digit_count,
            repeat_score: record.repeat_score,
            increasing_score: record.increasing_score,
            decreasing_score: record.decreasing_score,
            magic_score: record.magic_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_score() -> Score {
        Score {
            repeat: 1024,
            increasing: 0,
            decreasing: 0,
            magic: -100,
            unique_digits: 2,
        }
    }

    #[test]
    fn new_derives_total() {
        let record = KeyRecord::new("AB", "pub", "priv", &sample_score());
        assert_eq!(record.score, 924);
        assert_eq!(record.unique_digit_count, 2);
        assert_eq!(record.components(), sample_score());
    }

    #[test]
    fn fill_replaces_previous_contents() {
        let mut record = KeyRecord::new("OLD-FINGERPRINT", "old pub", "old priv", &sample_score());
        record.fill("NEW", "p", "s", &Score::default());
        assert_eq!(record.fingerprint, "NEW");
        assert_eq!(record.public_key, "p");
        assert_eq!(record.private_key, "s");
        assert_eq!(record.score, 0);
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut record = KeyRecord::new(&"F".repeat(40), "pub", "priv", &sample_score());
        let capacity = record.fingerprint.capacity();
        record.clear();
        assert_eq!(record, KeyRecord::default());
        assert_eq!(record.fingerprint.capacity(), capacity);
    }

    #[test]
    fn summary_drops_key_material() {
        let fp = format!("{}{}", "0".repeat(24), "8888888888888888");
        let record = KeyRecord::new(&fp, "pub", "priv", &sample_score());
        let summary = KeySummary::from(&record);
        assert_eq!(summary.suffix, "8888888888888888");
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("priv"));
    }
}
