//! HOTP / TOTP token derivation (RFC 4226, RFC 6238).
//!
//! HMAC-SHA1, 30 second steps counted from the Unix epoch, 6 decimal digits:
//! the parameters every mainstream authenticator app uses by default.

use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

pub const STEP_SECS: i64 = 30;
pub const DIGITS: usize = 6;

/// HOTP value for `counter`, truncated to [`DIGITS`] digits.
pub fn hotp(secret: &[u8], counter: u64) -> u32 {
    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // dynamic truncation
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);

    binary % 10u32.pow(DIGITS as u32)
}

/// Time step containing `unix_secs`
pub fn time_step(unix_secs: i64) -> i64 {
    unix_secs.div_euclid(STEP_SECS)
}

/// Zero-padded token for time step `t`
pub fn token_for_step(secret: &[u8], t: i64) -> String {
    format!("{:0width$}", hotp(secret, t as u64), width = DIGITS)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC_SECRET: &[u8] = b"12345678901234567890";

    #[test]
    fn rfc4226_vectors() {
        let expected = [755224, 287082, 359152, 969429, 338314];
        for (counter, want) in expected.iter().enumerate() {
            assert_eq!(hotp(RFC_SECRET, counter as u64), *want);
        }
    }

    #[test]
    fn rfc6238_sha1_vectors_truncated_to_six_digits() {
        assert_eq!(token_for_step(RFC_SECRET, time_step(59)), "287082");
        assert_eq!(token_for_step(RFC_SECRET, time_step(1_111_111_109)), "081804");
        assert_eq!(token_for_step(RFC_SECRET, time_step(1_234_567_890)), "005924");
    }

    #[test]
    fn step_boundaries() {
        assert_eq!(time_step(0), 0);
        assert_eq!(time_step(29), 0);
        assert_eq!(time_step(30), 1);
    }
}
