//! Credential collaborator: passphrase, signing key, signer certificate.
//!
//! The log never stores credentials on entries. Every operation that seals,
//! opens or signs receives a [`Credentials`] implementation explicitly.

use std::fs;
use std::path::Path;

use ed25519_dalek::pkcs8::DecodePrivateKey;
use ed25519_dalek::{SigningKey, VerifyingKey};
use tracing::debug;
use zeroize::Zeroizing;

use crate::crypto::{CryptoError, cert};
use crate::error::{LogError, Result};

/// Capability consumed by entry and snapshot sealing.
pub trait Credentials {
    /// Current passphrase. Empty means unusable.
    fn passphrase(&self) -> &str;

    /// Key used to sign plaintext payloads.
    fn signing_key(&self) -> &SigningKey;

    /// The signer's certificate as base64 DER.
    fn certificate(&self) -> String;

    /// Trust hook invoked with the certificate embedded on an entry before
    /// its signature is accepted.
    ///
    /// CA chain validation is not implemented; the default accepts every
    /// well-formed certificate.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Certificate`] to reject the signer.
    fn check_certificate(&self, _der: &[u8], _key: &VerifyingKey) -> std::result::Result<(), CryptoError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StaticCredentials
// ---------------------------------------------------------------------------

/// In-process credentials built from a passphrase, key and certificate.
pub struct StaticCredentials {
    passphrase: Zeroizing<String>,
    signing_key: SigningKey,
    certificate_der: Vec<u8>,
    pinned: Vec<VerifyingKey>,
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("has_passphrase", &!self.passphrase.is_empty())
            .field("verifying_key", &self.signing_key.verifying_key())
            .field("pinned", &self.pinned.len())
            .finish_non_exhaustive()
    }
}

impl StaticCredentials {
    /// Build credentials, checking that the certificate carries the public
    /// half of `signing_key`.
    ///
    /// An empty passphrase is accepted here; entry creation rejects it.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Signature`] if the certificate is malformed or
    /// belongs to another key.
    pub fn new(
        passphrase: impl Into<String>,
        signing_key: SigningKey,
        certificate_der: Vec<u8>,
    ) -> Result<Self> {
        let cert_key = cert::verifying_key(&certificate_der)?;
        if cert_key != signing_key.verifying_key() {
            return Err(LogError::Signature(
                "certificate does not match signing key".to_string(),
            ));
        }

        Ok(Self {
            passphrase: Zeroizing::new(passphrase.into()),
            signing_key,
            certificate_der,
            pinned: Vec::new(),
        })
    }

    /// Build credentials from a stored [`Identity`].
    ///
    /// # Errors
    ///
    /// Same as [`Identity::signing_key`] and [`StaticCredentials::new`].
    pub fn from_identity(passphrase: impl Into<String>, identity: &Identity) -> Result<Self> {
        Self::new(
            passphrase,
            identity.signing_key()?,
            identity.certificate_der.clone(),
        )
    }

    /// Only accept entries signed by one of `keys`.
    ///
    /// An empty list restores the accept-all default.
    #[must_use]
    pub fn with_pinned_keys(mut self, keys: Vec<VerifyingKey>) -> Self {
        self.pinned = keys;
        self
    }

    /// Raw DER of the signer certificate.
    #[must_use]
    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate_der
    }
}

impl Credentials for StaticCredentials {
    fn passphrase(&self) -> &str {
        &self.passphrase
    }

    fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    fn certificate(&self) -> String {
        cert::encode(&self.certificate_der)
    }

    fn check_certificate(&self, _der: &[u8], key: &VerifyingKey) -> std::result::Result<(), CryptoError> {
        if self.pinned.is_empty() || self.pinned.contains(key) {
            Ok(())
        } else {
            Err(CryptoError::Certificate(
                "signer is not among the pinned keys".to_string(),
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A PKCS#8 Ed25519 key with its self-signed certificate.
pub struct Identity {
    key_der: Zeroizing<Vec<u8>>,
    /// DER encoded X.509 certificate.
    pub certificate_der: Vec<u8>,
}

impl Identity {
    /// Generate a fresh key and a self-signed certificate for `common_name`.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Signature`] if key or certificate generation fails.
    pub fn generate(common_name: &str) -> Result<Self> {
        let gen_err = |e: rcgen::Error| LogError::Signature(format!("identity generation: {e}"));

        let key_pair = rcgen::KeyPair::generate_for(&rcgen::PKCS_ED25519).map_err(gen_err)?;
        let mut params =
            rcgen::CertificateParams::new(vec![common_name.to_string()]).map_err(gen_err)?;
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, common_name);
        let cert = params.self_signed(&key_pair).map_err(gen_err)?;

        debug!(common_name, "generated signing identity");

        Ok(Self {
            key_der: Zeroizing::new(key_pair.serialize_der()),
            certificate_der: cert.der().to_vec(),
        })
    }

    /// Decode the Ed25519 signing key.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Signature`] if the PKCS#8 document is not an
    /// Ed25519 key.
    pub fn signing_key(&self) -> Result<SigningKey> {
        SigningKey::from_pkcs8_der(&self.key_der)
            .map_err(|e| LogError::Signature(format!("invalid PKCS#8 key: {e}")))
    }

    /// Read a key and certificate written by [`Identity::save`].
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Storage`] if either file cannot be read.
    pub fn load(key_path: &Path, cert_path: &Path) -> Result<Self> {
        Ok(Self {
            key_der: Zeroizing::new(fs::read(key_path)?),
            certificate_der: fs::read(cert_path)?,
        })
    }

    /// Write the key and certificate as raw DER files.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Storage`] if a directory or file cannot be written.
    pub fn save(&self, key_path: &Path, cert_path: &Path) -> Result<()> {
        for path in [key_path, cert_path] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(key_path, self.key_der.as_slice())?;
        fs::write(cert_path, &self.certificate_der)?;
        Ok(())
    }
}
