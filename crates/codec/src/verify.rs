//! Integrity and freshness checks.

use hmac::Mac;

use crate::key::SigningKey;
use crate::token::{TAG_LEN, VERSION};

/// Compute the HMAC-SHA256 tag over `message`.
pub fn sign(key: &SigningKey, message: &[u8]) -> [u8; TAG_LEN] {
    let mut mac = key.mac();
    mac.update(message);
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    tag
}

/// Recompute the tag over `message` and compare it to `presented` in constant time.
pub fn verify(key: &SigningKey, message: &[u8], presented: &[u8]) -> bool {
    let mut mac = key.mac();
    mac.update(message);
    mac.verify_slice(presented).is_ok()
}

/// `true` if a token stamped at `timestamp` is still acceptable at `now`.
///
/// A `ttl_seconds` of zero or less disables the check. Timestamps ahead of
/// `now` are accepted.
pub fn check_freshness(timestamp: u64, ttl_seconds: i64, now: u64) -> bool {
    if ttl_seconds <= 0 {
        return true;
    }
    // ttl_seconds > 0 here, so the cast is lossless.
    now <= timestamp.saturating_add(ttl_seconds as u64)
}

/// `true` if `version` is the supported sentinel.
pub fn check_version(version: u8) -> bool {
    version == VERSION
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::SecretKey;

    fn signing_key(fill: u8) -> SigningKey {
        let (signing, _) = SecretKey::from_slice(&[fill; 32])
            .unwrap()
            .split();
        signing
    }

    #[test]
    fn verify_accepts_own_tag() {
        let key = signing_key(1);
        let tag = sign(&key, b"message");
        assert!(verify(&key, b"message", &tag));
    }

    #[test]
    fn verify_rejects_other_message_or_key() {
        let key = signing_key(1);
        let tag = sign(&key, b"message");
        assert!(!verify(&key, b"messagf", &tag));
        assert!(!verify(&signing_key(2), b"message", &tag));
    }

    #[test]
    fn verify_rejects_truncated_tag() {
        let key = signing_key(1);
        let tag = sign(&key, b"message");
        assert!(!verify(&key, b"message", &tag[..31]));
        assert!(!verify(&key, b"message", &[]));
    }

    #[test]
    fn signing_uses_only_the_first_half() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        a[20] = 1;
        b[20] = 2;
        let (ka, _) = SecretKey::from_slice(&a).unwrap().split();
        let (kb, _) = SecretKey::from_slice(&b).unwrap().split();
        assert_eq!(sign(&ka, b"m"), sign(&kb, b"m"));
    }

    #[test]
    fn freshness_disabled_for_non_positive_ttl() {
        assert!(check_freshness(0, 0, u64::MAX));
        assert!(check_freshness(0, -1, u64::MAX));
        assert!(check_freshness(u64::MAX, i64::MIN, 0));
    }

    #[test]
    fn freshness_boundary_is_inclusive() {
        let now = 1_700_000_000;
        assert!(check_freshness(now - 60, 60, now));
        assert!(!check_freshness(now - 61, 60, now));
    }

    #[test]
    fn future_timestamps_are_accepted() {
        assert!(check_freshness(2_000_000_000, 1, 1_000_000_000));
    }

    #[test]
    fn freshness_does_not_overflow() {
        assert!(check_freshness(u64::MAX, i64::MAX, u64::MAX));
        assert!(check_freshness(u64::MAX - 1, 1, u64::MAX));
    }

    #[test]
    fn only_0x80_is_supported() {
        assert!(check_version(0x80));
        assert!(!check_version(0x81));
        assert!(!check_version(0x00));
    }
}
