use anyhow::{Context, Result, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::credentials::{Identity, StaticCredentials};

/// Directory holding project state, relative to the project root.
pub const PROJECT_DIR: &str = ".otlog";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub trust: TrustConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_key_path")]
    pub key: PathBuf,
    #[serde(default = "default_certificate_path")]
    pub certificate: PathBuf,
    #[serde(default = "default_passphrase_env")]
    pub passphrase_env: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            key: default_key_path(),
            certificate: default_certificate_path(),
            passphrase_env: default_passphrase_env(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustConfig {
    /// Base64 Ed25519 public keys. Empty accepts any signer.
    #[serde(default)]
    pub pinned: Vec<String>,
}

impl TrustConfig {
    /// Decode the pinned keys.
    ///
    /// # Errors
    ///
    /// Fails on keys that are not base64 of a valid 32-byte Ed25519 point.
    pub fn pinned_keys(&self) -> Result<Vec<VerifyingKey>> {
        self.pinned
            .iter()
            .map(|encoded| {
                let raw = STANDARD
                    .decode(encoded)
                    .with_context(|| format!("Pinned key {encoded} is not base64"))?;
                let Ok(bytes) = <[u8; 32]>::try_from(raw.as_slice()) else {
                    bail!("Pinned key {encoded} has {} bytes, expected 32", raw.len());
                };
                VerifyingKey::from_bytes(&bytes)
                    .with_context(|| format!("Pinned key {encoded} is not an Ed25519 key"))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
    /// Overrides the project's passphrase variable name.
    #[serde(default)]
    pub passphrase_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub root: PathBuf,
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

impl EffectiveConfig {
    /// Store directory, resolved against the project root.
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.root.join(&self.project.store.path)
    }

    #[must_use]
    pub fn key_path(&self) -> PathBuf {
        self.root.join(&self.project.identity.key)
    }

    #[must_use]
    pub fn certificate_path(&self) -> PathBuf {
        self.root.join(&self.project.identity.certificate)
    }

    /// Name of the environment variable holding the passphrase.
    #[must_use]
    pub fn passphrase_env(&self) -> &str {
        self.user
            .passphrase_env
            .as_deref()
            .unwrap_or(&self.project.identity.passphrase_env)
    }

    /// Build credentials from the configured identity files, the passphrase
    /// variable and the pinned keys.
    ///
    /// # Errors
    ///
    /// Fails when the variable is unset, the identity files are unreadable
    /// or a pinned key is malformed.
    pub fn load_credentials(&self) -> Result<StaticCredentials> {
        let var = self.passphrase_env();
        let passphrase =
            env::var(var).with_context(|| format!("Passphrase variable {var} is not set"))?;

        let identity = Identity::load(&self.key_path(), &self.certificate_path())
            .with_context(|| {
                format!(
                    "Failed to load identity from {} (run `otlog keygen`)",
                    self.key_path().display()
                )
            })?;

        let credentials = StaticCredentials::from_identity(passphrase, &identity)
            .context("Identity key and certificate do not match")?;
        Ok(credentials.with_pinned_keys(self.project.trust.pinned_keys()?))
    }
}

/// Path of the project config file under `project_root`.
#[must_use]
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_DIR).join("config.toml")
}

pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    load_config_file(&project_config_path(project_root))
}

pub fn load_config_file(path: &Path) -> Result<ProjectConfig> {
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Write `config` to the project config file, creating `.otlog/`.
pub fn write_project_config(project_root: &Path, config: &ProjectConfig) -> Result<PathBuf> {
    let path = project_config_path(project_root);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to encode config")?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("otlog/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Merge project config (or `config_override`), user config and the
/// output flag.
pub fn resolve_config(
    project_root: &Path,
    config_override: Option<&Path>,
    cli_json: bool,
) -> Result<EffectiveConfig> {
    let project = match config_override {
        Some(path) => load_config_file(path)?,
        None => load_project_config(project_root)?,
    };
    let user = load_user_config()?;

    let env_format = env::var("OTLOG_FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.clone(), env_format);

    Ok(EffectiveConfig {
        root: project_root.to_path_buf(),
        project,
        user,
        resolved_output,
    })
}

fn resolve_output(cli_json: bool, user_output: Option<String>, env_format: Option<String>) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "plain" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from(PROJECT_DIR).join("blobs")
}

fn default_key_path() -> PathBuf {
    PathBuf::from(PROJECT_DIR).join("identity/signing.key")
}

fn default_certificate_path() -> PathBuf {
    PathBuf::from(PROJECT_DIR).join("identity/cert.der")
}

fn default_passphrase_env() -> String {
    "OTLOG_PASSPHRASE".to_string()
}
