//! Session authentication for the vulnsrv core.
//!
//! Two separate mechanisms live here:
//!
//! - The **session MAC**: an opaque token binding a claimed identity
//!   and an issuance timestamp to the per-run secret. The digest is
//!   `SHA-256(secret || payload)` over the cleartext payload — the
//!   plain keyed-hash construction, NOT an HMAC. That makes the token
//!   forgeable via hash length extension, which is exactly what the
//!   companion attack exercise demonstrates. Do not "fix" this
//!   construction; the weakness is the product requirement, and the
//!   attack tooling depends on the exact byte layout and on
//!   [`SECRET_LEN`].
//! - The **session identity**: a random URL-safe bearer token that
//!   doubles as the CSRF secret; state-mutating requests must echo it
//!   back as an explicit parameter.
//!
//! Token wire format: `hex(digest) + "!" + payload` where `payload` is
//! the form-encoded `user=<identity>&time=<unix timestamp>`.

use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Length of the per-run secret in raw bytes.
///
/// Published on purpose: the length-extension exercise needs to know
/// how many unknown bytes precede the payload.
pub const SECRET_LEN: usize = 32;

/// The per-run session-MAC secret.
pub type Secret = [u8; SECRET_LEN];

/// Separator between the hex digest and the cleartext payload.
pub const TOKEN_SEPARATOR: u8 = b'!';

/// Generates a fresh per-run secret.
pub fn generate_secret() -> Secret {
    let mut secret = [0u8; SECRET_LEN];
    rand::thread_rng().fill_bytes(&mut secret);
    secret
}

/// The identity and timestamp recovered from a valid token.
///
/// `time` stays a string: a token forged by length extension carries
/// glue-padding bytes inside the time value, so it is not generally
/// numeric. Display-side consumers render it verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The claimed identity.
    pub user: String,
    /// The claimed issuance timestamp, as decoded text.
    pub time: String,
}

/// Issues a session token for `identity` at `timestamp`.
pub fn issue_token(secret: &Secret, identity: &str, timestamp: u64) -> String {
    let payload = format!("user={}&time={timestamp}", urlencoding::encode(identity));
    let digest = keyed_digest(secret, payload.as_bytes());
    format!("{digest}!{payload}")
}

/// Verifies a session token against the current secret.
///
/// The token is split on the last `!`; the digest is recomputed over
/// `secret || payload` and compared exactly. Comparison is not
/// constant-time, matching the reference behavior. Returns `None` for
/// any mismatch or malformed token; verification failure is a
/// recoverable outcome, never a fault.
///
/// The payload is raw bytes, not UTF-8: forged tokens embed hash
/// padding in the middle of the payload.
pub fn verify_token(secret: &Secret, token: &[u8]) -> Option<Session> {
    let sep = token.iter().rposition(|&b| b == TOKEN_SEPARATOR)?;
    let presented = std::str::from_utf8(&token[..sep]).ok()?;
    let payload = &token[sep + 1..];
    if presented != keyed_digest(secret, payload) {
        return None;
    }
    let fields = parse_form_payload(payload);
    Some(Session {
        user: fields.get("user")?.clone(),
        time: fields.get("time")?.clone(),
    })
}

/// `hex(SHA-256(secret || payload))`, lowercase.
fn keyed_digest(secret: &[u8], payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    hasher.update(payload);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Parses form-encoded payload bytes into a key/value map.
///
/// Pairs split on `&`, each pair on its first `=`; `+` decodes as
/// space, `%XX` percent-decodes, and invalid UTF-8 sequences are
/// dropped. Duplicate keys keep the LAST occurrence — this is what
/// lets a forged `...&user=admin` suffix override the original
/// identity, so it is pinned by tests.
fn parse_form_payload(payload: &[u8]) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for pair in payload.split(|&b| b == b'&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = match pair.iter().position(|&b| b == b'=') {
            Some(idx) => (&pair[..idx], &pair[idx + 1..]),
            None => (pair, [].as_slice()),
        };
        fields.insert(decode_component(key), decode_component(value));
    }
    fields
}

fn decode_component(raw: &[u8]) -> String {
    let plus_mapped: Vec<u8> = raw
        .iter()
        .map(|&b| if b == b'+' { b' ' } else { b })
        .collect();
    let decoded = urlencoding::decode_binary(&plus_mapped);
    utf8_ignoring_invalid(&decoded)
}

/// Decodes UTF-8, silently dropping invalid sequences.
///
/// `from_utf8_lossy` would insert U+FFFD instead; the reference decoder
/// drops, and the difference is visible in the `time` field of forged
/// tokens.
fn utf8_ignoring_invalid(mut bytes: &[u8]) -> String {
    let mut out = String::new();
    while !bytes.is_empty() {
        match std::str::from_utf8(bytes) {
            Ok(s) => {
                out.push_str(s);
                break;
            }
            Err(err) => {
                let (valid, rest) = bytes.split_at(err.valid_up_to());
                if let Ok(s) = std::str::from_utf8(valid) {
                    out.push_str(s);
                }
                match err.error_len() {
                    Some(len) => bytes = &rest[len..],
                    None => break,
                }
            }
        }
    }
    out
}

/// Generates a fresh session identifier: 16 random bytes, URL-safe
/// base64 without padding. Doubles as the CSRF secret.
pub fn new_session_id() -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;

    let mut raw = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut raw);
    URL_SAFE_NO_PAD.encode(raw)
}

/// Checks the CSRF token a state-mutating request presented against the
/// caller's session identifier.
pub fn csrf_token_matches(session_id: &str, presented: &str) -> bool {
    !session_id.is_empty() && session_id == presented
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_secret() -> Secret {
        [0x42u8; SECRET_LEN]
    }

    #[test]
    fn issue_verify_roundtrip() {
        let secret = test_secret();
        let token = issue_token(&secret, "Gast", 1234567890);
        let session = verify_token(&secret, token.as_bytes()).unwrap();
        assert_eq!(session.user, "Gast");
        assert_eq!(session.time, "1234567890");
    }

    #[test]
    fn token_wire_format() {
        let token = issue_token(&test_secret(), "Gast", 1234567890);
        let (digest, payload) = token.split_once('!').unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
        assert_eq!(payload, "user=Gast&time=1234567890");
    }

    #[test]
    fn reject_tampered_digest() {
        let secret = test_secret();
        let mut token = issue_token(&secret, "Gast", 1).into_bytes();
        token[0] = if token[0] == b'0' { b'1' } else { b'0' };
        assert!(verify_token(&secret, &token).is_none());
    }

    #[test]
    fn reject_wrong_secret() {
        let token = issue_token(&test_secret(), "Gast", 1);
        assert!(verify_token(&[0u8; SECRET_LEN], token.as_bytes()).is_none());
    }

    #[test]
    fn reject_missing_separator() {
        assert!(verify_token(&test_secret(), b"no separator here").is_none());
    }

    #[test]
    fn payload_duplicate_keys_last_wins() {
        let fields = parse_form_payload(b"user=Gast&time=1&user=admin");
        assert_eq!(fields["user"], "admin");
    }

    #[test]
    fn payload_plus_and_percent_decoding() {
        let fields = parse_form_payload(b"a=x+y&b=%41%42&c=100%25");
        assert_eq!(fields["a"], "x y");
        assert_eq!(fields["b"], "AB");
        assert_eq!(fields["c"], "100%");
    }

    #[test]
    fn payload_invalid_utf8_dropped() {
        // 0x80 is never a valid UTF-8 lead byte; it must vanish, not
        // turn into U+FFFD.
        let fields = parse_form_payload(b"time=123\x80\x00\x01456");
        assert_eq!(fields["time"], "123\u{0}\u{1}456");
    }

    #[test]
    fn payload_pair_without_equals() {
        let fields = parse_form_payload(b"flag&user=x");
        assert_eq!(fields["flag"], "");
        assert_eq!(fields["user"], "x");
    }

    #[test]
    fn identity_with_reserved_chars_roundtrips() {
        let secret = test_secret();
        let token = issue_token(&secret, "a&b=c d", 7);
        let session = verify_token(&secret, token.as_bytes()).unwrap();
        assert_eq!(session.user, "a&b=c d");
    }

    #[test]
    fn session_ids_are_urlsafe_and_distinct() {
        let a = new_session_id();
        let b = new_session_id();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        // 16 bytes -> 22 base64 chars without padding.
        assert_eq!(a.len(), 22);
    }

    #[test]
    fn csrf_check() {
        assert!(csrf_token_matches("abc", "abc"));
        assert!(!csrf_token_matches("abc", "abd"));
        assert!(!csrf_token_matches("", ""));
    }

    proptest! {
        #[test]
        fn any_identity_roundtrips(identity in "[ -~]{0,40}", timestamp in any::<u64>()) {
            let secret = test_secret();
            let token = issue_token(&secret, &identity, timestamp);
            let session = verify_token(&secret, token.as_bytes()).unwrap();
            prop_assert_eq!(session.user, identity);
            prop_assert_eq!(session.time, timestamp.to_string());
        }
    }
}
