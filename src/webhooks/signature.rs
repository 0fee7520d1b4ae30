//! HMAC-SHA256 verification of GitHub webhook deliveries.
//!
//! GitHub signs the raw request body with the webhook secret and sends the
//! result as `X-Hub-Signature-256: sha256=<hex>`. The body must be verified
//! before it is parsed.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const PREFIX: &str = "sha256=";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header does not start with {PREFIX}")]
    MissingPrefix,

    #[error("signature is not valid hex")]
    InvalidHex,

    #[error("webhook secret rejected by HMAC")]
    InvalidKey,

    #[error("signature does not match payload")]
    Mismatch,
}

/// Decodes the digest bytes from an `X-Hub-Signature-256` header value.
///
/// ```
/// use board_sync::webhooks::decode_signature_header;
///
/// assert_eq!(decode_signature_header("sha256=0aff").unwrap(), vec![0x0a, 0xff]);
/// assert!(decode_signature_header("sha1=0aff").is_err());
/// assert!(decode_signature_header("sha256=zz").is_err());
/// ```
pub fn decode_signature_header(header: &str) -> Result<Vec<u8>, SignatureError> {
    let digest = header
        .strip_prefix(PREFIX)
        .ok_or(SignatureError::MissingPrefix)?;
    hex::decode(digest).map_err(|_| SignatureError::InvalidHex)
}

fn mac_for(secret: &[u8], payload: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(payload);
    Ok(mac)
}

/// Produces the header value GitHub would send for `payload`.
///
/// Used by tests and by anything that needs to replay a delivery.
pub fn sign_payload(payload: &[u8], secret: &[u8]) -> Result<String, SignatureError> {
    let digest = mac_for(secret, payload)?.finalize().into_bytes();
    Ok(format!("{PREFIX}{}", hex::encode(digest)))
}

/// Checks `header` against the HMAC of `payload`. The digest comparison is
/// constant time.
///
/// ```
/// use board_sync::webhooks::{sign_payload, verify_signature};
///
/// let header = sign_payload(b"{}", b"secret").unwrap();
/// assert!(verify_signature(b"{}", &header, b"secret").is_ok());
/// assert!(verify_signature(b"{}", &header, b"other").is_err());
/// ```
pub fn verify_signature(payload: &[u8], header: &str, secret: &[u8]) -> Result<(), SignatureError> {
    let expected = decode_signature_header(header)?;
    mac_for(secret, payload)?
        .verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ─── Unit Tests ───────────────────────────────────────────────────────────

    #[test]
    fn decodes_uppercase_hex() {
        assert_eq!(
            decode_signature_header("sha256=ABCD").unwrap(),
            vec![0xab, 0xcd]
        );
    }

    #[test]
    fn rejects_odd_length_hex() {
        assert_eq!(
            decode_signature_header("sha256=abc"),
            Err(SignatureError::InvalidHex)
        );
    }

    #[test]
    fn rejects_empty_header() {
        assert_eq!(decode_signature_header(""), Err(SignatureError::MissingPrefix));
    }

    #[test]
    fn signed_header_has_full_digest() {
        let header = sign_payload(b"payload", b"secret").unwrap();
        assert_eq!(header.len(), PREFIX.len() + 64);
    }

    #[test]
    fn known_digest() {
        // printf 'Hello, World!' | openssl dgst -sha256 -hmac "It's a Secret to Everybody"
        let header = sign_payload(b"Hello, World!", b"It's a Secret to Everybody").unwrap();
        assert_eq!(
            header,
            "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17"
        );
    }

    #[test]
    fn tampered_body_is_a_mismatch() {
        let header = sign_payload(br#"{"action":"opened"}"#, b"secret").unwrap();
        assert_eq!(
            verify_signature(br#"{"action":"closed"}"#, &header, b"secret"),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn truncated_digest_is_a_mismatch() {
        let header = sign_payload(b"body", b"secret").unwrap();
        assert_eq!(
            verify_signature(b"body", &header[..header.len() - 2], b"secret"),
            Err(SignatureError::Mismatch)
        );
    }

    // ─── Property Tests ───────────────────────────────────────────────────────

    proptest! {
        #[test]
        fn sign_then_verify(payload: Vec<u8>, secret: Vec<u8>) {
            let header = sign_payload(&payload, &secret).unwrap();
            prop_assert!(verify_signature(&payload, &header, &secret).is_ok());
        }

        #[test]
        fn other_secret_fails(payload: Vec<u8>, a: Vec<u8>, b: Vec<u8>) {
            prop_assume!(a != b);
            let header = sign_payload(&payload, &a).unwrap();
            prop_assert!(verify_signature(&payload, &header, &b).is_err());
        }

        #[test]
        fn arbitrary_headers_never_panic(header: String, payload: Vec<u8>) {
            let _ = verify_signature(&payload, &header, b"secret");
        }
    }
}
