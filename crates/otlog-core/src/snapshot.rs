//! Sealed materializations of a record set.
//!
//! A snapshot is encrypted with the same envelope as entry payloads but is
//! not signed: it is only ever reached through the link on a signed entry,
//! and the AEAD tag binds it to the passphrase.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::Context;
use crate::credentials::Credentials;
use crate::crypto::{self, ALGO_AES256_GCM_HKDF_SHA256};
use crate::error::{LogError, Result};
use crate::model::{Link, Records};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "t")]
    pub time: DateTime<Utc>,
    #[serde(rename = "c")]
    pub crypto_alg: String,
    #[serde(rename = "d")]
    data: String,
}

impl Snapshot {
    /// Seal `records` under the credential passphrase.
    ///
    /// # Errors
    ///
    /// [`LogError::MissingCredentials`], [`LogError::Serialization`] or a
    /// crypto failure.
    pub fn seal(records: &Records, credentials: &dyn Credentials) -> Result<Self> {
        let passphrase = credentials.passphrase();
        if passphrase.is_empty() {
            return Err(LogError::MissingCredentials);
        }

        let time = Utc::now();
        let plaintext = serde_json::to_vec(records).map_err(LogError::Serialization)?;
        let ciphertext = crypto::encrypt(&plaintext, &time, passphrase)?;

        Ok(Self {
            time,
            crypto_alg: ALGO_AES256_GCM_HKDF_SHA256.to_string(),
            data: STANDARD.encode(ciphertext),
        })
    }

    /// Seal and persist `records`, returning the link to store on an entry.
    ///
    /// # Errors
    ///
    /// See [`Snapshot::seal`]; storage failures.
    pub fn create(ctx: &Context<'_>, records: &Records) -> Result<Link> {
        let snapshot = Self::seal(records, ctx.credentials)?;
        let reference = ctx.store.save_snapshot(&snapshot)?;
        debug!(%reference, records = records.len(), "snapshot created");
        Ok(Link::new(reference))
    }

    /// Load the snapshot stored under `reference`. Records stay sealed.
    ///
    /// # Errors
    ///
    /// Storage and integrity failures.
    pub fn recover(ctx: &Context<'_>, reference: &str) -> Result<Self> {
        ctx.store.get_snapshot(reference)
    }

    /// Load the snapshot behind `reference` and open its records.
    ///
    /// Decryption failures become [`LogError::Integrity`] naming `reference`.
    ///
    /// # Errors
    ///
    /// Storage, integrity and decoding failures.
    pub fn load_records(ctx: &Context<'_>, reference: &str) -> Result<Records> {
        Self::recover(ctx, reference)?
            .records(ctx.credentials)
            .map_err(|e| match e {
                LogError::Decryption(_) => LogError::integrity(reference, e),
                other => other,
            })
    }

    /// Open the sealed records.
    ///
    /// # Errors
    ///
    /// [`LogError::Decryption`] when the passphrase or ciphertext is wrong,
    /// [`LogError::Deserialization`] when the plaintext is not a record set.
    pub fn records(&self, credentials: &dyn Credentials) -> Result<Records> {
        let passphrase = credentials.passphrase();
        if passphrase.is_empty() {
            return Err(LogError::MissingCredentials);
        }
        if self.crypto_alg != ALGO_AES256_GCM_HKDF_SHA256 {
            return Err(LogError::Decryption(format!(
                "unsupported algorithm '{}'",
                self.crypto_alg
            )));
        }

        let ciphertext = STANDARD
            .decode(&self.data)
            .map_err(|e| LogError::Decryption(format!("snapshot is not base64: {e}")))?;
        let plaintext = crypto::decrypt(&ciphertext, &self.time, passphrase)?;
        serde_json::from_slice(&plaintext).map_err(LogError::Deserialization)
    }

    /// Serialize to the persisted JSON form.
    ///
    /// # Errors
    ///
    /// [`LogError::Serialization`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(LogError::Serialization)
    }

    /// Decode persisted bytes.
    ///
    /// # Errors
    ///
    /// [`LogError::Deserialization`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(LogError::Deserialization)
    }
}
