//! Shared fixtures for unit tests.

use std::sync::OnceLock;

use crate::credentials::{Identity, StaticCredentials};

pub const TEST_PASS: &str = "6162636465666869674b4c4d4e4f505152535455565758595a5f313233343536";

fn build(common_name: &str) -> StaticCredentials {
    let identity = Identity::generate(common_name).expect("generate identity");
    StaticCredentials::from_identity(TEST_PASS, &identity).expect("credentials")
}

/// Credentials shared by every test in the binary.
pub fn credentials() -> &'static StaticCredentials {
    static CREDS: OnceLock<StaticCredentials> = OnceLock::new();
    CREDS.get_or_init(|| build("test.otlog.example"))
}

/// A second signer with the same passphrase.
pub fn other_credentials() -> &'static StaticCredentials {
    static CREDS: OnceLock<StaticCredentials> = OnceLock::new();
    CREDS.get_or_init(|| build("other.otlog.example"))
}
