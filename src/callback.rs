//! Verification of signed webhook callbacks.
//!
//! The API signs every callback by joining the `key=value` pairs of all
//! fields except `hash` in byte-wise sorted order with `\n`, then computing
//! HMAC-SHA256 over that string with `SHA-256(api_token)` as the key. The
//! digest is delivered lowercase hex encoded in the `hash` field.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::{PayWithTerraError, Result};

/// Reserved callback field carrying the signature.
pub const HASH_FIELD: &str = "hash";

type HmacSha256 = Hmac<Sha256>;

/// Builds the string the signature is computed over. `hash` is skipped.
pub fn canonical_string<'a, I>(fields: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut pairs: Vec<String> = fields
        .into_iter()
        .filter(|(key, _)| key.as_str() != HASH_FIELD)
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    pairs.sort_unstable();
    pairs.join("\n")
}

/// HMAC key material: the raw SHA-256 digest of the API token.
pub fn signing_key(token: &str) -> [u8; 32] {
    let mut key = [0u8; 32];
    key.copy_from_slice(&Sha256::digest(token.as_bytes()));
    key
}

/// Computes the lowercase hex signature the API would attach to `fields`.
pub fn sign<'a, I>(token: &str, fields: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let message = canonical_string(fields);
    let mut mac = match HmacSha256::new_from_slice(&signing_key(token)) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC accepts keys of any length"),
    };
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Checks the `hash` of an inbound callback payload.
///
/// On success the payload is returned without its `hash` field. A missing
/// `hash` or any difference from the recomputed signature (including letter
/// case) fails with [`PayWithTerraError::SignatureMismatch`].
pub fn verify<I, K, V>(token: &str, payload: I) -> Result<BTreeMap<String, String>>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut fields: BTreeMap<String, String> = payload
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect();

    let Some(supplied) = fields.remove(HASH_FIELD) else {
        #[cfg(feature = "tracing")]
        tracing::debug!("callback rejected: no hash field");
        return Err(PayWithTerraError::SignatureMismatch);
    };

    let expected = sign(token, &fields);
    if !bool::from(expected.as_bytes().ct_eq(supplied.as_bytes())) {
        #[cfg(feature = "tracing")]
        tracing::debug!(fields = fields.len(), "callback rejected: signature mismatch");
        return Err(PayWithTerraError::SignatureMismatch);
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use hmac::{Hmac, Mac};
    use sha2::{Digest, Sha256};

    use super::{canonical_string, sign, signing_key, verify};
    use crate::PayWithTerraError;

    const TOKEN: &str = "test-api-token";

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    fn reference_hash(token: &str, message: &str) -> String {
        let key = Sha256::digest(token.as_bytes());
        let mut mac = Hmac::<Sha256>::new_from_slice(&key).expect("any key length is valid");
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn canonical_string_sorts_pairs_not_keys() {
        // "a-b=2" sorts before "a=1" because '-' < '=' even though "a" < "a-b".
        let payload = fields(&[("a", "1"), ("a-b", "2"), ("hash", "ignored")]);
        assert_eq!(canonical_string(&payload), "a-b=2\na=1");
    }

    #[test]
    fn canonical_string_of_empty_payload_is_empty() {
        assert_eq!(canonical_string(&fields(&[("hash", "x")])), "");
    }

    #[test]
    fn signing_key_is_raw_sha256_of_token() {
        let key = signing_key(TOKEN);
        assert_eq!(key.len(), 32);
        assert_eq!(key.as_slice(), Sha256::digest(TOKEN.as_bytes()).as_slice());
    }

    #[test]
    fn sign_matches_reference_computation() {
        let payload = fields(&[("uuid", "abc"), ("memo", "x")]);
        assert_eq!(sign(TOKEN, &payload), reference_hash(TOKEN, "memo=x\nuuid=abc"));
    }

    #[test]
    fn verify_accepts_valid_hash_and_strips_it() {
        let hash = reference_hash(TOKEN, "memo=x\nuuid=abc");
        let payload = vec![("uuid", "abc"), ("memo", "x"), ("hash", hash.as_str())];

        let verified = verify(TOKEN, payload).expect("signature must verify");

        assert_eq!(verified, fields(&[("uuid", "abc"), ("memo", "x")]));
    }

    #[test]
    fn verify_rejects_every_single_character_mutation() {
        let hash = reference_hash(TOKEN, "memo=x\nuuid=abc");
        for index in 0..hash.len() {
            let mut mutated = hash.clone().into_bytes();
            mutated[index] = if mutated[index] == b'0' { b'1' } else { b'0' };
            let mutated = String::from_utf8(mutated).expect("hex stays ascii");
            let payload = vec![("uuid", "abc"), ("memo", "x"), ("hash", mutated.as_str())];

            assert!(matches!(
                verify(TOKEN, payload),
                Err(PayWithTerraError::SignatureMismatch)
            ));
        }
    }

    #[test]
    fn verify_rejects_uppercase_hex() {
        let hash = reference_hash(TOKEN, "memo=x\nuuid=abc").to_uppercase();
        let payload = vec![("uuid", "abc"), ("memo", "x"), ("hash", hash.as_str())];
        assert!(verify(TOKEN, payload).is_err());
    }

    #[test]
    fn verify_rejects_tampered_field() {
        let hash = reference_hash(TOKEN, "memo=x\nuuid=abc");
        let payload = vec![("uuid", "abd"), ("memo", "x"), ("hash", hash.as_str())];
        assert!(matches!(
            verify(TOKEN, payload),
            Err(PayWithTerraError::SignatureMismatch)
        ));
    }

    #[test]
    fn verify_rejects_other_token() {
        let hash = reference_hash("another-token", "memo=x\nuuid=abc");
        let payload = vec![("uuid", "abc"), ("memo", "x"), ("hash", hash.as_str())];
        assert!(verify(TOKEN, payload).is_err());
    }

    #[test]
    fn verify_rejects_missing_hash() {
        let payload = vec![("uuid", "abc"), ("memo", "x")];
        assert!(matches!(
            verify(TOKEN, payload),
            Err(PayWithTerraError::SignatureMismatch)
        ));
    }
}
