//! Configurable acceptance predicate.
//!
//! A candidate is kept when `(total <score_comparison> min_score)
//! <combine> (unique <unique_comparison> max_unique_digits)` holds. Both
//! comparison operators and the combinator are configuration, so either
//! historical variant of the rule can be expressed.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::models::Score;

/// Highest possible distinct digit count of a 16-character suffix.
pub const MAX_UNIQUE_DIGITS: i32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("max_unique_digits must be between 0 and {max}, got {value}")]
    UniqueDigitsOutOfRange { value: i32, max: i32 },
}

/// Binary integer comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Comparison {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl Comparison {
    /// Evaluate `lhs <op> rhs`.
    pub fn holds(self, lhs: i32, rhs: i32) -> bool {
        match self {
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }
}

/// How the score and uniqueness tests are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Combinator {
    And,
    Or,
}

/// The `accept(total_score, unique_count)` predicate applied by scorers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptancePolicy {
    pub min_score: i32,
    pub score_comparison: Comparison,
    pub max_unique_digits: i32,
    pub unique_comparison: Comparison,
    pub combine: Combinator,
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self {
            min_score: 200,
            score_comparison: Comparison::Gt,
            max_unique_digits: 5,
            unique_comparison: Comparison::Le,
            combine: Combinator::Or,
        }
    }
}

impl AcceptancePolicy {
    pub fn accept(&self, total_score: i32, unique_count: i32) -> bool {
        let score_ok = self.score_comparison.holds(total_score, self.min_score);
        let unique_ok = self.unique_comparison.holds(unique_count, self.max_unique_digits);
        match self.combine {
            Combinator::And => score_ok && unique_ok,
            Combinator::Or => score_ok || unique_ok,
        }
    }

    pub fn accepts(&self, score: &Score) -> bool {
        self.accept(score.total(), score.unique_digits)
    }

    /// Reject bounds that can never be meaningful for a 16-digit suffix.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if !(0..=MAX_UNIQUE_DIGITS).contains(&self.max_unique_digits) {
            return Err(PolicyError::UniqueDigitsOutOfRange {
                value: self.max_unique_digits,
                max: MAX_UNIQUE_DIGITS,
            });
        }
        Ok(())
    }

    /// Human-readable form, e.g. `score > 200 or unique <= 5`.
    pub fn describe(&self) -> String {
        format!(
            "score {} {} {} unique {} {}",
            self.score_comparison.symbol(),
            self.min_score,
            self.combine,
            self.unique_comparison.symbol(),
            self.max_unique_digits
        )
    }
}
