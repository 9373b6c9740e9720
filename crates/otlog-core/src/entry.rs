//! Log entries: one encrypted, signed DAG node.
//!
//! An [`Entry`] is created in plaintext, sealed by one of the `encrypt_*`
//! methods, persisted through a [`Storage`](crate::store::Storage) and later
//! fetched back by content reference. Fetch always decrypts and re-validates
//! the signature before returning, so a caller never holds an unvalidated
//! entry obtained from a store.
//!
//! # State
//!
//! The persisted payload `d` is either base64 ciphertext (encrypted state)
//! or the plaintext string. The state flag is in-memory only. Entries
//! decoded from bytes start encrypted.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::context::Context;
use crate::credentials::Credentials;
use crate::crypto::{self, ALGO_AES256_GCM_HKDF_SHA256, cert};
use crate::error::{LogError, Result};
use crate::model::{EntryDiff, Link, Operation};

/// One node of the log DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Creation time; also salts the payload key.
    #[serde(rename = "t")]
    pub time: DateTime<Utc>,

    /// Stable node identifier.
    pub id: Uuid,

    /// Algorithm that sealed `data`.
    #[serde(rename = "c")]
    pub crypto_alg: String,

    /// Base64 DER certificate of the signer.
    #[serde(rename = "pk", default)]
    pub public_cert: String,

    /// Base64 signature over the plaintext payload.
    #[serde(rename = "s", default)]
    pub signature: String,

    /// Materialized state at this node.
    #[serde(rename = "sn", default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Link>,

    #[serde(rename = "d", default)]
    data: String,

    #[serde(rename = "o")]
    pub operation: Operation,

    /// Zero (root), one, or two (merge) parents.
    #[serde(rename = "p", default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<Link>,

    #[serde(skip)]
    encrypted: bool,

    /// Ciphertext the current plaintext was recovered from. Lets a fetched
    /// entry be persisted again byte-for-byte, whoever signed it.
    #[serde(skip)]
    sealed: Option<String>,
}

impl Entry {
    /// Create an unencrypted `UpSert` entry stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::MissingCredentials`] if `credentials` has an empty
    /// passphrase.
    pub fn new(parent: Option<Link>, credentials: &dyn Credentials) -> Result<Self> {
        if credentials.passphrase().is_empty() {
            return Err(LogError::MissingCredentials);
        }

        Ok(Self {
            time: Utc::now(),
            id: Uuid::new_v4(),
            crypto_alg: ALGO_AES256_GCM_HKDF_SHA256.to_string(),
            public_cert: String::new(),
            signature: String::new(),
            snapshot: None,
            data: String::new(),
            operation: Operation::UpSert,
            parents: parent.into_iter().collect(),
            encrypted: false,
            sealed: None,
        })
    }

    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// The raw payload field: ciphertext when encrypted, plaintext otherwise.
    #[must_use]
    pub fn raw_data(&self) -> &str {
        &self.data
    }

    /// Parent references in stored order.
    pub fn parent_refs(&self) -> impl Iterator<Item = &str> {
        self.parents.iter().map(Link::as_str)
    }

    // -----------------------------------------------------------------------
    // Sealing
    // -----------------------------------------------------------------------

    /// Alias for [`Entry::encrypt_string`].
    ///
    /// # Errors
    ///
    /// See [`Entry::encrypt_string`].
    pub fn encrypt(&mut self, data: &str, credentials: &dyn Credentials) -> Result<()> {
        self.encrypt_string(data, credentials)
    }

    /// Seal `data` as the payload and sign it.
    ///
    /// # Errors
    ///
    /// [`LogError::MissingCredentials`] or a crypto failure.
    pub fn encrypt_string(&mut self, data: &str, credentials: &dyn Credentials) -> Result<()> {
        self.seal(data.as_bytes(), credentials)
    }

    /// Serialize `value` to JSON and seal it as the payload.
    ///
    /// # Errors
    ///
    /// [`LogError::Serialization`] if `value` cannot be encoded.
    pub fn encrypt_from_json<T: Serialize + ?Sized>(
        &mut self,
        value: &T,
        credentials: &dyn Credentials,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(LogError::Serialization)?;
        self.seal(&bytes, credentials)
    }

    fn seal(&mut self, plaintext: &[u8], credentials: &dyn Credentials) -> Result<()> {
        let passphrase = credentials.passphrase();
        if passphrase.is_empty() {
            return Err(LogError::MissingCredentials);
        }

        let ciphertext = crypto::encrypt(plaintext, &self.time, passphrase)?;

        self.data = STANDARD.encode(ciphertext);
        self.signature = crypto::sign(plaintext, credentials.signing_key());
        self.public_cert = credentials.certificate();
        self.crypto_alg = ALGO_AES256_GCM_HKDF_SHA256.to_string();
        self.encrypted = true;
        self.sealed = None;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Opening
    // -----------------------------------------------------------------------

    /// Decrypt the payload and re-validate its signature.
    ///
    /// A no-op when already decrypted. On failure the entry is left exactly
    /// as it was.
    ///
    /// # Errors
    ///
    /// [`LogError::Decryption`] for base64, cipher or encoding failures,
    /// [`LogError::Signature`] for certificate or signature failures.
    pub fn decrypt_data(&mut self, credentials: &dyn Credentials) -> Result<()> {
        if !self.encrypted {
            return Ok(());
        }

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
            .map_err(|e| LogError::Decryption(format!("payload is not base64: {e}")))?;
        let plaintext = crypto::decrypt(&ciphertext, &self.time, passphrase)?;
        self.validate_signature(&plaintext, credentials)?;

        let text = String::from_utf8(plaintext)
            .map_err(|_| LogError::Decryption("payload is not UTF-8".to_string()))?;

        self.sealed = Some(std::mem::replace(&mut self.data, text));
        self.encrypted = false;
        Ok(())
    }

    fn validate_signature(&self, plaintext: &[u8], credentials: &dyn Credentials) -> Result<()> {
        let der = cert::decode(&self.public_cert)?;
        let key = cert::verifying_key(&der)?;
        credentials.check_certificate(&der, &key)?;
        crypto::verify(&self.signature, plaintext, &key)?;
        Ok(())
    }

    /// The plaintext payload, decrypting first if needed.
    ///
    /// # Errors
    ///
    /// See [`Entry::decrypt_data`].
    pub fn data_as_string(&mut self, credentials: &dyn Credentials) -> Result<&str> {
        self.decrypt_data(credentials)?;
        Ok(&self.data)
    }

    /// Deserialize the plaintext payload, decrypting first if needed.
    ///
    /// # Errors
    ///
    /// See [`Entry::decrypt_data`]; [`LogError::Deserialization`] if the
    /// payload does not match `T`.
    pub fn data_as<T: DeserializeOwned>(&mut self, credentials: &dyn Credentials) -> Result<T> {
        self.decrypt_data(credentials)?;
        serde_json::from_str(&self.data).map_err(LogError::Deserialization)
    }

    /// The replayable diff carried by an `UpSert` or `Delete` entry.
    ///
    /// # Errors
    ///
    /// [`LogError::InvalidOperation`] for `Merge` and `Base` entries, else
    /// as [`Entry::data_as`].
    pub fn diff(&mut self, credentials: &dyn Credentials) -> Result<EntryDiff> {
        if !self.operation.carries_diff() {
            return Err(LogError::InvalidOperation(format!(
                "{} entries carry no diff",
                self.operation
            )));
        }
        self.data_as(credentials)
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Persist the entry, returning its content reference.
    ///
    /// `previous` rewrites the single parent link to point at another head.
    /// It is ignored for two-parent entries. Plaintext payloads are sealed
    /// first; an entry is never stored in plaintext.
    ///
    /// # Errors
    ///
    /// Sealing, serialization or storage failures.
    pub fn persist(&mut self, ctx: &Context<'_>, previous: Option<&str>) -> Result<String> {
        if let Some(previous) = previous {
            if self.parents.len() <= 1 {
                self.parents = vec![Link::new(previous)];
            } else {
                warn!(id = %self.id, previous, "ignoring head override on merge entry");
            }
        }

        if !self.encrypted {
            match self.sealed.take() {
                Some(ciphertext) => {
                    self.data = ciphertext;
                    self.encrypted = true;
                }
                None => {
                    let plaintext = self.data.clone();
                    self.seal(plaintext.as_bytes(), ctx.credentials)?;
                }
            }
        }

        ctx.store.save(self)
    }

    /// Load the entry stored under `reference`, decrypted and validated.
    ///
    /// # Errors
    ///
    /// Storage errors propagate as-is; decryption and signature failures
    /// become [`LogError::Integrity`] naming `reference`.
    pub fn fetch(ctx: &Context<'_>, reference: &str) -> Result<Self> {
        let mut entry = ctx.store.get(reference)?;
        entry
            .decrypt_data(ctx.credentials)
            .map_err(|e| LogError::integrity(reference, e))?;
        debug!(reference, id = %entry.id, op = %entry.operation, "entry fetched");
        Ok(entry)
    }

    /// Fetch every parent, keyed by reference. Empty for a root.
    ///
    /// # Errors
    ///
    /// The first failing [`Entry::fetch`].
    pub fn parents(&self, ctx: &Context<'_>) -> Result<BTreeMap<String, Self>> {
        self.parents
            .iter()
            .map(|link| Ok((link.target.clone(), Self::fetch(ctx, &link.target)?)))
            .collect()
    }

    /// Serialize to the persisted JSON form.
    ///
    /// # Errors
    ///
    /// [`LogError::Serialization`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(LogError::Serialization)
    }

    /// Decode persisted bytes. The result is in the encrypted state.
    ///
    /// # Errors
    ///
    /// [`LogError::Deserialization`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut entry: Self = serde_json::from_slice(bytes).map_err(LogError::Deserialization)?;
        entry.encrypted = true;
        Ok(entry)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
