//! Authenticated encryption and detached signatures for entry payloads.
//!
//! Payloads are sealed with AES-256-GCM under a key derived from the
//! credential passphrase and the entry timestamp, and signed (in plaintext
//! form) with the author's Ed25519 key. The signer's X.509 certificate rides
//! along on the entry so any reader holding the passphrase can validate it.
//!
//! # Envelope
//!
//! ```text
//! key material = HKDF-SHA256(ikm = passphrase, salt = RFC 3339 nanos timestamp)
//! nonce        = HMAC-SHA256(mac_key, plaintext)[..12]
//! ciphertext   = nonce || AES-256-GCM(enc_key, nonce, plaintext)
//! ```
//!
//! The nonce is synthetic, so sealing is deterministic: the same plaintext,
//! time and passphrase always produce the same bytes. Content references of
//! re-persisted entries stay stable, and two different plaintexts can never
//! share a nonce under one key.
//!
//! # Sub-modules
//!
//! - [`cert`]: certificate encoding and public-key extraction.

pub mod cert;

use aes_gcm::{Aes256Gcm, Nonce};
use aes_gcm::aead::{Aead, KeyInit};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

/// Identifier recorded on every entry and snapshot sealed by this module.
pub const ALGO_AES256_GCM_HKDF_SHA256: &str = "aes256gcm-hkdf-sha256";

const NONCE_LEN: usize = 12;
const KEY_INFO: &[u8] = b"otlog/v1/aes-256-gcm";
const MAC_INFO: &[u8] = b"otlog/v1/synthetic-nonce";

type HmacSha256 = Hmac<Sha256>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the envelope primitives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// Ciphertext malformed, truncated, or failed authentication.
    #[error("{0}")]
    Decrypt(String),

    /// Signature malformed or not valid for the payload.
    #[error("{0}")]
    Signature(String),

    /// Certificate malformed, of the wrong key type, or not trusted.
    #[error("{0}")]
    Certificate(String),

    /// Key derivation could not produce the requested material.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
}

// ---------------------------------------------------------------------------
// Key schedule
// ---------------------------------------------------------------------------

struct SealingKeys {
    enc: Zeroizing<[u8; 32]>,
    mac: Zeroizing<[u8; 32]>,
}

fn time_salt(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn derive_keys(time: &DateTime<Utc>, passphrase: &str) -> Result<SealingKeys, CryptoError> {
    let salt = time_salt(time);
    let hk = Hkdf::<Sha256>::new(Some(salt.as_bytes()), passphrase.as_bytes());

    let mut enc = Zeroizing::new([0u8; 32]);
    let mut mac = Zeroizing::new([0u8; 32]);
    hk.expand(KEY_INFO, &mut enc[..])
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    hk.expand(MAC_INFO, &mut mac[..])
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    Ok(SealingKeys { enc, mac })
}

fn synthetic_nonce(mac_key: &[u8; 32], plaintext: &[u8]) -> Result<[u8; NONCE_LEN], CryptoError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    mac.update(plaintext);
    let digest = mac.finalize().into_bytes();

    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&digest[..NONCE_LEN]);
    Ok(nonce)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Seal `plaintext` under a key derived from `time` and `passphrase`.
///
/// # Errors
///
/// Returns [`CryptoError::KeyDerivation`] if the key schedule fails, or
/// [`CryptoError::Decrypt`] if the cipher rejects the input.
pub fn encrypt(
    plaintext: &[u8],
    time: &DateTime<Utc>,
    passphrase: &str,
) -> Result<Vec<u8>, CryptoError> {
    let keys = derive_keys(time, passphrase)?;
    let nonce = synthetic_nonce(&keys.mac, plaintext)?;

    let cipher = Aes256Gcm::new_from_slice(&keys.enc[..])
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    let sealed = cipher
        .encrypt(&Nonce::from(nonce), plaintext)
        .map_err(|e| CryptoError::Decrypt(format!("encryption failed: {e}")))?;

    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Open a ciphertext produced by [`encrypt`].
///
/// # Errors
///
/// Returns [`CryptoError::Decrypt`] when the input is too short, the
/// authentication tag does not verify, or the synthetic nonce does not match
/// the recovered plaintext.
pub fn decrypt(
    ciphertext: &[u8],
    time: &DateTime<Utc>,
    passphrase: &str,
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < NONCE_LEN {
        return Err(CryptoError::Decrypt(format!(
            "ciphertext too short: {} bytes",
            ciphertext.len()
        )));
    }

    let keys = derive_keys(time, passphrase)?;
    let (nonce_bytes, sealed) = ciphertext.split_at(NONCE_LEN);
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(&keys.enc[..])
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    let plaintext = cipher
        .decrypt(&Nonce::from(nonce), sealed)
        .map_err(|_| CryptoError::Decrypt("authentication tag mismatch".to_string()))?;

    if synthetic_nonce(&keys.mac, &plaintext)? != nonce {
        return Err(CryptoError::Decrypt("nonce does not match payload".to_string()));
    }

    Ok(plaintext)
}

/// Sign `plaintext`, returning the base64 encoded signature.
#[must_use]
pub fn sign(plaintext: &[u8], key: &SigningKey) -> String {
    let signature: Signature = key.sign(plaintext);
    STANDARD.encode(signature.to_bytes())
}

/// Verify a base64 signature over `plaintext`.
///
/// # Errors
///
/// Returns [`CryptoError::Signature`] if the signature is not base64, has
/// the wrong length, or does not verify under `key`.
pub fn verify(signature: &str, plaintext: &[u8], key: &VerifyingKey) -> Result<(), CryptoError> {
    let raw = STANDARD
        .decode(signature)
        .map_err(|e| CryptoError::Signature(format!("signature is not base64: {e}")))?;
    let signature = Signature::from_slice(&raw)
        .map_err(|e| CryptoError::Signature(format!("malformed signature: {e}")))?;

    key.verify_strict(plaintext, &signature)
        .map_err(|_| CryptoError::Signature("signature does not match payload".to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
