use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn tag(key: &[u8], value: &str) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(value.as_bytes());
    Some(mac.finalize().into_bytes().to_vec())
}

/// Compares a submitted passkey against the configured one without leaking
/// timing. Both sides are MACed first so differing lengths compare the same way.
pub fn passkey_matches(configured: &str, submitted: &str, key: &[u8]) -> bool {
    let Some(expected) = tag(key, configured) else {
        return false;
    };

    match HmacSha256::new_from_slice(key) {
        Ok(mut mac) => {
            mac.update(submitted.as_bytes());
            mac.verify_slice(&expected).is_ok()
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_passkey() {
        assert!(passkey_matches("123456", "123456", b"k"));
    }

    #[test]
    fn mismatched_passkeys() {
        assert!(!passkey_matches("123456", "123457", b"k"));
        assert!(!passkey_matches("123456", "1234567", b"k"));
        assert!(!passkey_matches("123456", "", b"k"));
    }
}
