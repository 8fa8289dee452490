//! Fingerprint helpers.

use sequoia_openpgp::packet::Key;
use sequoia_openpgp::packet::key::{KeyParts, KeyRole};

use crate::constants::SCORED_SUFFIX_LEN;

/// Length of a v4 fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 40;

/// The v4 OpenPGP fingerprint of `key` as uppercase hex without spaces.
pub fn of_key<P: KeyParts, R: KeyRole>(key: &Key<P, R>) -> String {
    key.fingerprint().to_hex()
}

/// The last [`SCORED_SUFFIX_LEN`] characters, or the whole input when it is
/// shorter than that.
pub fn scored_suffix(fingerprint: &str) -> &str {
    let start = fingerprint.len().saturating_sub(SCORED_SUFFIX_LEN);
    fingerprint.get(start..).unwrap_or(fingerprint)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use sequoia_openpgp::packet::key::{Key4, PrimaryRole, SecretParts};

    use super::*;

    fn key(seed: u8, created_at: u64) -> Key<SecretParts, PrimaryRole> {
        let ctime = UNIX_EPOCH + Duration::from_secs(created_at);
        Key::from(Key4::<SecretParts, PrimaryRole>::import_secret_ed25519(&[seed; 32], ctime).unwrap())
    }

    #[test]
    fn fingerprint_is_40_uppercase_hex() {
        let fp = of_key(&key(7, 1_700_000_000));
        assert_eq!(fp.len(), FINGERPRINT_LEN);
        assert!(fp.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn fingerprint_depends_on_time_and_key() {
        let base = of_key(&key(1, 1));
        assert_eq!(base, of_key(&key(1, 1)));
        assert_ne!(base, of_key(&key(1, 2)));
        assert_ne!(base, of_key(&key(2, 1)));
    }

    #[test]
    fn public_half_has_the_same_fingerprint() {
        let secret = key(3, 1_700_000_000);
        let public = secret.clone().parts_into_public();
        assert_eq!(of_key(&secret), of_key(&public));
    }

    #[test]
    fn suffix_is_last_sixteen() {
        let fp = of_key(&key(0, 42));
        assert_eq!(scored_suffix(&fp), &fp[24..]);
        assert_eq!(scored_suffix(&fp).len(), 16);
        assert_eq!(scored_suffix("ABC"), "ABC");
    }
}
