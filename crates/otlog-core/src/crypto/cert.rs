//! Signer certificates carried on entries as base64 DER.
//!
//! Only the subject public key is consumed: it must be an Ed25519 key
//! (OID `1.3.101.112`). Validity periods and issuer chains are not checked
//! here; trust decisions belong to [`crate::credentials::Credentials::check_certificate`].

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::VerifyingKey;
use x509_parser::prelude::parse_x509_certificate;

use super::CryptoError;

const ED25519_OID: &str = "1.3.101.112";

/// Encode DER certificate bytes for the entry `pk` field.
#[must_use]
pub fn encode(der: &[u8]) -> String {
    STANDARD.encode(der)
}

/// Decode the entry `pk` field back into DER bytes.
///
/// # Errors
///
/// Returns [`CryptoError::Certificate`] if the field is not base64.
pub fn decode(encoded: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(encoded)
        .map_err(|e| CryptoError::Certificate(format!("certificate is not base64: {e}")))
}

/// Extract the Ed25519 verifying key from a DER certificate.
///
/// # Errors
///
/// Returns [`CryptoError::Certificate`] if the DER does not parse, the key is
/// not Ed25519, or the key bytes are not a valid curve point.
pub fn verifying_key(der: &[u8]) -> Result<VerifyingKey, CryptoError> {
    let (_, cert) = parse_x509_certificate(der)
        .map_err(|e| CryptoError::Certificate(format!("malformed certificate: {e}")))?;
    let spki = cert.public_key();

    let oid = spki.algorithm.algorithm.to_id_string();
    if oid != ED25519_OID {
        return Err(CryptoError::Certificate(format!(
            "unsupported key algorithm {oid}, expected Ed25519"
        )));
    }

    let raw: &[u8] = spki.subject_public_key.data.as_ref();
    let bytes: [u8; 32] = raw.try_into().map_err(|_| {
        CryptoError::Certificate(format!("Ed25519 key has {} bytes, expected 32", raw.len()))
    })?;

    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| CryptoError::Certificate(format!("invalid Ed25519 key: {e}")))
}

/// Decode a base64 certificate and extract its verifying key.
///
/// # Errors
///
/// Same as [`decode`] and [`verifying_key`].
pub fn verifying_key_from_base64(encoded: &str) -> Result<VerifyingKey, CryptoError> {
    verifying_key(&decode(encoded)?)
}
