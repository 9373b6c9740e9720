use std::fmt;

use crate::crypto::CryptoError;

/// Machine-readable error codes for operators and tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    MissingCredentials,
    Serialization,
    Deserialization,
    Decryption,
    Signature,
    StorageFailed,
    NotFound,
    LockContention,
    NoSnapshot,
    IntegrityFailed,
    InvalidOperation,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MissingCredentials => "E1001",
            Self::Serialization => "E2001",
            Self::Deserialization => "E2002",
            Self::InvalidOperation => "E2003",
            Self::Decryption => "E3001",
            Self::Signature => "E3002",
            Self::IntegrityFailed => "E3003",
            Self::StorageFailed => "E4001",
            Self::NotFound => "E4002",
            Self::LockContention => "E4003",
            Self::NoSnapshot => "E5001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::MissingCredentials => "Credentials carry no passphrase",
            Self::Serialization => "Payload serialization failed",
            Self::Deserialization => "Payload deserialization failed",
            Self::InvalidOperation => "Invalid operation",
            Self::Decryption => "Payload decryption failed",
            Self::Signature => "Signature or certificate rejected",
            Self::IntegrityFailed => "Fetched entry failed validation",
            Self::StorageFailed => "Storage backend failure",
            Self::NotFound => "Content reference not found",
            Self::LockContention => "Store lock contention",
            Self::NoSnapshot => "Merge base has no snapshot",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::MissingCredentials => {
                Some("Export the passphrase variable named in .otlog/config.toml.")
            }
            Self::Decryption => Some("Check that the same passphrase wrote this entry."),
            Self::Signature => Some("The signer certificate is malformed or not trusted."),
            Self::IntegrityFailed => Some("The stored blob was altered or written with other keys."),
            Self::NotFound => Some("Check the reference and the configured store path."),
            Self::NoSnapshot => Some("Merge from an entry that carries a snapshot link."),
            Self::StorageFailed => Some("Check disk space and write permissions."),
            Self::LockContention => Some("Another otlog process is writing; retry shortly."),
            Self::Serialization | Self::Deserialization | Self::InvalidOperation => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors surfaced by every entry, store, ancestry and merge operation.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The credential collaborator has no usable passphrase.
    #[error("credentials must carry a passphrase")]
    MissingCredentials,

    /// A payload could not be encoded as JSON.
    #[error("failed to serialize payload: {0}")]
    Serialization(#[source] serde_json::Error),

    /// A payload could not be decoded from JSON.
    #[error("failed to deserialize payload: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// An unknown operation tag, or an operation used where it is not allowed.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Authenticated decryption failed or the ciphertext was malformed.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Signature or certificate malformed, untrusted, or not matching.
    #[error("signature rejected: {0}")]
    Signature(String),

    /// The storage backend failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Nothing is stored under the reference.
    #[error("no blob stored under {0}")]
    NotFound(String),

    /// The store write lock could not be taken in time.
    #[error("store lock timed out: {0}")]
    LockContention(String),

    /// Merge attempted from an entry without a snapshot link.
    #[error("no snapshot attached to merge base")]
    NoSnapshot,

    /// A fetched blob or entry failed validation.
    #[error("integrity check failed for {reference}: {reason}")]
    Integrity {
        /// The content reference that was being loaded.
        reference: String,
        /// What went wrong.
        reason: String,
    },
}

impl LogError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MissingCredentials => ErrorCode::MissingCredentials,
            Self::Serialization(_) => ErrorCode::Serialization,
            Self::Deserialization(_) => ErrorCode::Deserialization,
            Self::InvalidOperation(_) => ErrorCode::InvalidOperation,
            Self::Decryption(_) => ErrorCode::Decryption,
            Self::Signature(_) => ErrorCode::Signature,
            Self::Storage(_) => ErrorCode::StorageFailed,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::LockContention(_) => ErrorCode::LockContention,
            Self::NoSnapshot => ErrorCode::NoSnapshot,
            Self::Integrity { .. } => ErrorCode::IntegrityFailed,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    /// Wrap any validation failure of a fetched object as an integrity error.
    pub(crate) fn integrity(reference: &str, cause: impl fmt::Display) -> Self {
        Self::Integrity {
            reference: reference.to_string(),
            reason: cause.to_string(),
        }
    }
}

impl From<CryptoError> for LogError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Decrypt(reason) => Self::Decryption(reason),
            CryptoError::Signature(reason) | CryptoError::Certificate(reason) => {
                Self::Signature(reason)
            }
            CryptoError::KeyDerivation(reason) => Self::Decryption(reason),
        }
    }
}

impl From<std::io::Error> for LogError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, LogError>;
