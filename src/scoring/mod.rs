//! Fingerprint vanity scoring.
//!
//! [`ScoreTables`] holds the character map and run cost tables. It is built
//! once at startup and shared by reference (usually behind an `Arc`) with
//! every scorer worker, so scoring itself is a pure function of the input.
//!
//! Three run trackers walk the input independently:
//!
//! - **repeat**: the same digit value over and over (`888`)
//! - **increasing**: each digit one above the previous, `F` wrapping to `0`
//! - **decreasing**: each digit one below the previous, `0` wrapping to `F`
//!
//! Each tracker keeps the highest cost of any run it saw. Characters outside
//! the hex alphabet close every open run and are otherwise ignored.

pub mod policy;

pub use policy::{AcceptancePolicy, Combinator, Comparison, PolicyError};

use crate::models::Score;

/// Shortest repeat run that earns a cost.
pub const MIN_REPEAT_LEN: usize = 3;

/// Shortest ascending or descending run that earns a cost.
pub const MIN_SEQUENCE_LEN: usize = 4;

/// Penalty applied when the input contains `49`.
pub const MAGIC_PENALTY: i32 = -100;

const MAGIC_PATTERN: &str = "49";

/// Run lengths covered by the precomputed tables (index = length).
const TABLE_LEN: usize = 17;

const COST_UNIT: i32 = 16;

/// Immutable lookup tables for the scoring engine.
#[derive(Debug, Clone)]
pub struct ScoreTables {
    /// Byte to digit value, `-1` for anything outside `0-9A-Fa-f`.
    char_values: [i8; 256],
    repeat_costs: [i32; TABLE_LEN],
    sequence_costs: [i32; TABLE_LEN],
}

impl Default for ScoreTables {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreTables {
    pub fn new() -> Self {
        let mut char_values = [-1i8; 256];
        for (value, byte) in (b'0'..=b'9').enumerate() {
            char_values[byte as usize] = value as i8;
        }
        for (offset, byte) in (b'A'..=b'F').enumerate() {
            char_values[byte as usize] = 10 + offset as i8;
            char_values[byte.to_ascii_lowercase() as usize] = 10 + offset as i8;
        }

        let mut repeat_costs = [0; TABLE_LEN];
        let mut sequence_costs = [0; TABLE_LEN];
        for len in 0..TABLE_LEN {
            repeat_costs[len] = repeat_cost_formula(len);
            sequence_costs[len] = sequence_cost_formula(len);
        }

        Self {
            char_values,
            repeat_costs,
            sequence_costs,
        }
    }

    /// Digit value of a hex character, case-insensitive.
    pub fn digit_value(&self, byte: u8) -> Option<u8> {
        let value = self.char_values[byte as usize];
        (value >= 0).then_some(value as u8)
    }

    /// Cost of a repeat run of `len` characters.
    pub fn repeat_cost(&self, len: usize) -> i32 {
        match self.repeat_costs.get(len) {
            Some(cost) => *cost,
            None => repeat_cost_formula(len),
        }
    }

    /// Cost of an ascending or descending run of `len` characters.
    pub fn sequence_cost(&self, len: usize) -> i32 {
        match self.sequence_costs.get(len) {
            Some(cost) => *cost,
            None => sequence_cost_formula(len),
        }
    }

    /// Score a fingerprint suffix.
    ///
    /// Normally called with the 16-character tail of a fingerprint, but any
    /// length is accepted; runs longer than the tables fall back to the
    /// closed-form cost.
    pub fn calculate_score(&self, input: &str) -> Score {
        let mut repeat = RunTracker::default();
        let mut increasing = RunTracker::default();
        let mut decreasing = RunTracker::default();
        let mut unique_mask: u16 = 0;
        let mut prev: Option<u8> = None;

        for &byte in input.as_bytes() {
            let Some(value) = self.digit_value(byte) else {
                repeat.close(|len| self.repeat_cost(len));
                increasing.close(|len| self.sequence_cost(len));
                decreasing.close(|len| self.sequence_cost(len));
                prev = None;
                continue;
            };
            unique_mask |= 1 << value;

            match prev {
                Some(p) => {
                    repeat.advance(value == p, |len| self.repeat_cost(len));
                    increasing.advance(value == (p + 1) % 16, |len| self.sequence_cost(len));
                    decreasing.advance(value == (p + 15) % 16, |len| self.sequence_cost(len));
                }
                None => {
                    repeat.len = 1;
                    increasing.len = 1;
                    decreasing.len = 1;
                }
            }
            prev = Some(value);
        }

        repeat.close(|len| self.repeat_cost(len));
        increasing.close(|len| self.sequence_cost(len));
        decreasing.close(|len| self.sequence_cost(len));

        Score {
            repeat: repeat.best,
            increasing: increasing.best,
            decreasing: decreasing.best,
            magic: if input.contains(MAGIC_PATTERN) {
                MAGIC_PENALTY
            } else {
                0
            },
            unique_digits: unique_mask.count_ones() as i32,
        }
    }
}

/// `floor(len^1.5) * 16` for runs of at least [`MIN_REPEAT_LEN`], else 0.
pub fn repeat_cost_formula(len: usize) -> i32 {
    if len < MIN_REPEAT_LEN {
        return 0;
    }
    floor_pow_three_halves(len) * COST_UNIT
}

/// `floor((len - 1)^1.5) * 16` for runs of at least [`MIN_SEQUENCE_LEN`], else 0.
pub fn sequence_cost_formula(len: usize) -> i32 {
    if len < MIN_SEQUENCE_LEN {
        return 0;
    }
    floor_pow_three_halves(len - 1) * COST_UNIT
}

/// `floor(n^1.5)`, computed as the integer square root of `n^3`.
fn floor_pow_three_halves(n: usize) -> i32 {
    let n = n as u64;
    n.pow(3).isqrt() as i32
}

#[derive(Debug, Default)]
struct RunTracker {
    len: usize,
    best: i32,
}

impl RunTracker {
    fn advance(&mut self, continues: bool, cost: impl Fn(usize) -> i32) {
        if continues {
            self.len += 1;
        } else {
            self.close(cost);
            self.len = 1;
        }
    }

    fn close(&mut self, cost: impl Fn(usize) -> i32) {
        if self.len > 0 {
            self.best = self.best.max(cost(self.len));
        }
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn score(input: &str) -> Score {
        ScoreTables::new().calculate_score(input)
    }

    fn expected(repeat: i32, increasing: i32, decreasing: i32, magic: i32, unique: i32) -> Score {
        Score {
            repeat,
            increasing,
            decreasing,
            magic,
            unique_digits: unique,
        }
    }

    #[test]
    fn literal_scenarios() {
        assert_eq!(score("8888888888888888"), expected(1024, 0, 0, 0, 1));
        assert_eq!(score("0123456789ABCDEF"), expected(0, 928, 0, 0, 16));
        assert_eq!(score("FEDCBA9876543210"), expected(0, 0, 928, 0, 16));
        assert_eq!(score("1929394959697989"), expected(0, 0, 0, -100, 9));
    }

    #[test]
    fn cost_tables_match_known_values() {
        let tables = ScoreTables::new();
        assert_eq!(tables.repeat_cost(2), 0);
        assert_eq!(tables.repeat_cost(3), 80);
        assert_eq!(tables.repeat_cost(4), 128);
        assert_eq!(tables.repeat_cost(5), 176);
        assert_eq!(tables.repeat_cost(6), 224);
        assert_eq!(tables.repeat_cost(16), 1024);
        assert_eq!(tables.sequence_cost(3), 0);
        assert_eq!(tables.sequence_cost(4), 80);
        assert_eq!(tables.sequence_cost(7), 224);
        assert_eq!(tables.sequence_cost(8), 288);
        assert_eq!(tables.sequence_cost(16), 928);
    }

    #[test]
    fn tables_agree_with_floating_point_formula() {
        let tables = ScoreTables::new();
        for len in MIN_REPEAT_LEN..=16 {
            let float = (len as f64).powf(1.5).floor() as i32 * 16;
            assert_eq!(tables.repeat_cost(len), float, "repeat len {len}");
        }
        for len in MIN_SEQUENCE_LEN..=16 {
            let float = ((len - 1) as f64).powf(1.5).floor() as i32 * 16;
            assert_eq!(tables.sequence_cost(len), float, "sequence len {len}");
        }
    }

    #[test]
    fn costs_are_monotonic() {
        let tables = ScoreTables::new();
        for len in MIN_REPEAT_LEN..40 {
            assert!(tables.repeat_cost(len + 1) >= tables.repeat_cost(len));
        }
        for len in MIN_SEQUENCE_LEN..40 {
            assert!(tables.sequence_cost(len + 1) >= tables.sequence_cost(len));
        }
    }

    #[test]
    fn long_runs_fall_back_to_formula() {
        let tables = ScoreTables::new();
        assert_eq!(tables.repeat_cost(25), 125 * 16);
        assert_eq!(score(&"7".repeat(25)).repeat, 125 * 16);
    }

    #[test]
    fn seven_ascending_digits() {
        assert_eq!(score("0123456").increasing, 224);
        assert_eq!(score("x0123456x").increasing, 224);
    }

    #[test]
    fn increasing_wraps_from_f_to_zero() {
        assert_eq!(score("CDEF0123").increasing, 288);
        assert_eq!(score("CDEF0123").decreasing, 0);
    }

    #[test]
    fn decreasing_wraps_from_zero_to_f() {
        assert_eq!(score("3210FEDC").decreasing, 288);
        assert_eq!(score("3210FEDC").increasing, 0);
    }

    #[test]
    fn short_runs_score_nothing() {
        let s = score("8812");
        assert_eq!(s.repeat, 0);
        assert_eq!(s.increasing, 0);
        assert_eq!(score("012").increasing, 0);
        assert_eq!(score("0123").increasing, 80);
    }

    #[test]
    fn open_run_at_end_is_scored() {
        assert_eq!(score("1357AAAA").repeat, 128);
        assert_eq!(score("97310123").increasing, 80);
    }

    #[test]
    fn best_run_wins() {
        // a run of three then a run of five
        assert_eq!(score("111922222").repeat, 176);
        assert_eq!(score("22222911").repeat, 176);
    }

    #[test]
    fn magic_penalty_is_independent() {
        assert_eq!(score("0000000000000049").magic, -100);
        assert_eq!(score("0000000000000049").repeat, score("0000000000000048").repeat);
        assert_eq!(score("0000000000000094").magic, 0);
        assert_eq!(score("4x9").magic, 0);
    }

    #[test]
    fn mixed_case_scores_like_uppercase() {
        let upper = "ABCDEF0123AAAA49";
        let lower = upper.to_ascii_lowercase();
        assert_eq!(score(upper), score(&lower));
        assert_eq!(score("aAaA").repeat, 128);
        assert_eq!(score("aBcDeF").increasing, score("ABCDEF").increasing);
    }

    #[test]
    fn non_hex_breaks_runs_and_is_not_counted() {
        let s = score("888x888");
        assert_eq!(s.repeat, 80);
        assert_eq!(s.unique_digits, 1);
        assert_eq!(score("0123-4567").increasing, 80);
        assert_eq!(score("zzzz"), Score::default());
    }

    #[test]
    fn empty_and_short_inputs() {
        assert_eq!(score(""), Score::default());
        assert_eq!(score("4"), expected(0, 0, 0, 0, 1));
        assert_eq!(score("49"), expected(0, 0, 0, -100, 2));
    }

    #[test]
    fn unique_count_matches_distinct_digits() {
        let tables = ScoreTables::new();
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        for _ in 0..2_000 {
            let mut input = String::with_capacity(16);
            for _ in 0..16 {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                let digit = (state >> 60) as u32;
                input.push(char::from_digit(digit, 16).unwrap().to_ascii_uppercase());
            }

            let first = tables.calculate_score(&input);
            let mut distinct: Vec<char> = input.chars().collect();
            distinct.sort_unstable();
            distinct.dedup();

            assert!((1..=16).contains(&first.unique_digits));
            assert_eq!(first.unique_digits as usize, distinct.len(), "input {input}");
            assert_eq!(first.magic == MAGIC_PENALTY, input.contains("49"));
            assert_eq!(tables.calculate_score(&input), first, "deterministic for {input}");
        }
    }
}
