// Cryptographic utilities: per-purpose key derivation, authenticated
// encryption of cookie payloads, and random token generation

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use hkdf::Hkdf;
use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Nonce size for AES-256-GCM encryption (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Encryption key size for AES-256 (256 bits)
pub const ENCRYPTION_KEY_SIZE: usize = 32;

/// GCM authentication tag size
pub const TAG_SIZE: usize = 16;

/// Derived key material for a single purpose
pub type EncryptionKey = [u8; ENCRYPTION_KEY_SIZE];

/// What a derived key is used for.
///
/// Each purpose gets its own HKDF label so a ciphertext produced for one
/// cookie cannot be replayed as another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPurpose {
    SessionCookie,
    TransientState,
}

impl KeyPurpose {
    #[must_use]
    pub const fn label(self) -> &'static [u8] {
        match self {
            Self::SessionCookie => b"oidc-session session cookie",
            Self::TransientState => b"oidc-session transient state",
        }
    }
}

/// Derive a 32-byte AES key from a configured secret using HKDF-SHA256
/// (RFC 5869) with an empty salt and the purpose label as `info`.
#[must_use]
pub fn derive_encryption_key(secret: &[u8], purpose: KeyPurpose) -> EncryptionKey {
    let mut okm = [0u8; ENCRYPTION_KEY_SIZE];
    Hkdf::<Sha256>::new(None, secret)
        .expand(purpose.label(), &mut okm)
        .unwrap_or_else(|_| unreachable!("32 bytes is within the HKDF-SHA256 output limit"));
    okm
}

/// Derive one key per configured secret, preserving order (newest first).
#[must_use]
pub fn derive_keys(secrets: &[String], purpose: KeyPurpose) -> Vec<EncryptionKey> {
    secrets
        .iter()
        .map(|secret| derive_encryption_key(secret.as_bytes(), purpose))
        .collect()
}

/// Generate a base64url-encoded string of `length` random bytes
#[must_use]
pub fn generate_random_token(length: usize) -> String {
    let mut bytes = vec![0u8; length];
    rand::rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Anti-CSRF `state` value: 24 bytes (192 bits) of entropy, 32 characters.
#[must_use]
pub fn generate_state() -> String {
    generate_random_token(24)
}

/// OIDC `nonce` value bound into the ID token.
#[must_use]
pub fn generate_nonce() -> String {
    generate_random_token(24)
}

/// PKCE code verifier, 64 URL-safe characters (RFC 7636 allows 43-128).
#[must_use]
pub fn generate_code_verifier() -> String {
    generate_random_token(48)
}

/// S256 code challenge: `BASE64URL(SHA256(verifier))`
#[must_use]
pub fn code_challenge(verifier: &str) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Compare two secrets without leaking the position of the first mismatch.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

/// Encrypt any serializable value with AES-256-GCM.
///
/// Returns base64url(nonce || ciphertext || tag).
///
/// # Errors
///
/// Returns an error if serialization or encryption fails
pub fn encrypt_data<T: Serialize>(data: &T, key: &EncryptionKey) -> Result<String> {
    let json_data = serde_json::to_vec(data).context("Failed to serialize data")?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let ciphertext = cipher
        .encrypt(nonce, json_data.as_slice())
        .map_err(|e| anyhow!("AES encryption failed: {e}"))?;

    let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);

    Ok(general_purpose::URL_SAFE_NO_PAD.encode(&combined))
}

/// Authenticate and decrypt a value produced by [`encrypt_data`], returning
/// the raw plaintext bytes.
///
/// # Errors
///
/// Returns an error if:
/// - Base64 decoding fails
/// - The payload is shorter than nonce + tag
/// - The authentication tag does not verify under `key`
pub fn open_data(encrypted_data: &str, key: &EncryptionKey) -> Result<Vec<u8>> {
    let combined = general_purpose::URL_SAFE_NO_PAD
        .decode(encrypted_data)
        .context("Failed to decode base64 data")?;

    if combined.len() < NONCE_SIZE + TAG_SIZE {
        return Err(anyhow!("Invalid data length"));
    }

    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| anyhow!("AES decryption failed: {e}"))
}

/// Decrypt and deserialize a value produced by [`encrypt_data`]
///
/// # Errors
///
/// Returns an error if decryption or deserialization fails
pub fn decrypt_data<T: DeserializeOwned>(encrypted_data: &str, key: &EncryptionKey) -> Result<T> {
    let plaintext = open_data(encrypted_data, key)?;
    serde_json::from_slice(&plaintext).context("Failed to deserialize data from decrypted JSON")
}

/// Try every key in order and return the first value that both
/// authenticates and deserializes.
///
/// Each key is an independent trial; the index of the key that succeeded
/// is returned alongside the value so callers can tell a rotated key from
/// the current one.
#[must_use]
pub fn decrypt_with_keys<T: DeserializeOwned>(
    encrypted_data: &str,
    keys: &[EncryptionKey],
) -> Option<(usize, T)> {
    for (index, key) in keys.iter().enumerate() {
        match decrypt_data::<T>(encrypted_data, key) {
            Ok(value) => return Some((index, value)),
            Err(e) => log::trace!("Key #{index} rejected payload: {e}"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Payload {
        sub: String,
        n: u32,
    }

    fn sample() -> Payload {
        Payload {
            sub: "user-1".to_string(),
            n: 7,
        }
    }

    #[test]
    fn test_derived_keys_differ_by_purpose() {
        let session = derive_encryption_key(b"a long enough secret", KeyPurpose::SessionCookie);
        let transient = derive_encryption_key(b"a long enough secret", KeyPurpose::TransientState);
        assert_ne!(session, transient);
    }

    #[test]
    fn test_session_key_derivation_is_stable() {
        // Changing this value invalidates every issued session cookie
        let key = derive_encryption_key(b"secret-one", KeyPurpose::SessionCookie);
        let hex: String = key.iter().map(|b| format!("{b:02x}")).collect();
        assert_eq!(
            hex,
            "f451ac2aa3c69639ce0471cd5d7be5d49f5a7224d10315b5ffb9ca6e1c368083"
        );
    }

    #[test]
    fn test_derived_keys_are_deterministic() {
        let k1 = derive_encryption_key(b"secret-one", KeyPurpose::SessionCookie);
        let k2 = derive_encryption_key(b"secret-one", KeyPurpose::SessionCookie);
        let k3 = derive_encryption_key(b"secret-two", KeyPurpose::SessionCookie);
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
    }

    #[test]
    fn test_encrypt_decrypt() {
        let key = derive_encryption_key(b"secret-one", KeyPurpose::SessionCookie);
        let encrypted = encrypt_data(&sample(), &key).unwrap();
        assert!(encrypted
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        let decrypted: Payload = decrypt_data(&encrypted, &key).unwrap();
        assert_eq!(decrypted, sample());
    }

    #[test]
    fn test_encryption_uses_fresh_nonce() {
        let key = derive_encryption_key(b"secret-one", KeyPurpose::SessionCookie);
        let a = encrypt_data(&sample(), &key).unwrap();
        let b = encrypt_data(&sample(), &key).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_cross_purpose_ciphertext_rejected() {
        let session = derive_encryption_key(b"secret-one", KeyPurpose::SessionCookie);
        let transient = derive_encryption_key(b"secret-one", KeyPurpose::TransientState);
        let encrypted = encrypt_data(&sample(), &transient).unwrap();
        assert!(decrypt_data::<Payload>(&encrypted, &session).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let key = derive_encryption_key(b"secret-one", KeyPurpose::SessionCookie);
        let encrypted = encrypt_data(&sample(), &key).unwrap();
        let mut bytes = general_purpose::URL_SAFE_NO_PAD.decode(&encrypted).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = general_purpose::URL_SAFE_NO_PAD.encode(bytes);
        assert!(open_data(&tampered, &key).is_err());
    }

    #[test]
    fn test_short_or_garbage_input_rejected() {
        let key = derive_encryption_key(b"secret-one", KeyPurpose::SessionCookie);
        assert!(open_data("", &key).is_err());
        assert!(open_data("not base64 !!", &key).is_err());
        assert!(open_data("AAAA", &key).is_err());
    }

    #[test]
    fn test_decrypt_with_keys_tries_each_key() {
        let old = derive_encryption_key(b"old-secret", KeyPurpose::SessionCookie);
        let new = derive_encryption_key(b"new-secret", KeyPurpose::SessionCookie);
        let encrypted = encrypt_data(&sample(), &old).unwrap();

        let (index, value) = decrypt_with_keys::<Payload>(&encrypted, &[new, old]).unwrap();
        assert_eq!(index, 1);
        assert_eq!(value, sample());

        assert!(decrypt_with_keys::<Payload>(&encrypted, &[new]).is_none());
    }

    #[test]
    fn test_code_challenge_rfc7636_vector() {
        // Appendix B of RFC 7636
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            code_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_random_tokens() {
        assert_eq!(generate_state().len(), 32);
        assert_eq!(generate_code_verifier().len(), 64);
        assert_ne!(generate_nonce(), generate_nonce());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(!constant_time_eq("", "a"));
    }
}
