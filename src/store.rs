//! Credential and choice store
//!
//! Every setting lives in its own small plain-text file so users can inspect
//! or hand-edit them. There is no locking; one process at a time is assumed.

use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::PublishError;
use crate::prompt::Prompter;
use crate::provider::{Organization, ProviderKind, User};

/// Subdirectory of the home path that holds the store files
pub const STORE_DIR: &str = "git";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKey {
    Server,
    Token,
    Owner,
    Login,
}

impl StoreKey {
    pub fn file_name(&self) -> &'static str {
        match self {
            StoreKey::Server => ".git_server",
            StoreKey::Token => ".git_token",
            StoreKey::Owner => ".git_own",
            StoreKey::Login => ".git_login",
        }
    }

    /// Secret values are only readable by the owner
    pub fn is_secret(&self) -> bool {
        matches!(self, StoreKey::Token)
    }

    pub fn label(&self) -> &'static str {
        match self {
            StoreKey::Server => "git hosting provider",
            StoreKey::Token => "access token",
            StoreKey::Owner => "repository owner type",
            StoreKey::Login => "repository owner login",
        }
    }
}

/// One-file-per-key store rooted at a fixed directory
#[derive(Debug, Clone)]
pub struct ConfigStore {
    root: PathBuf,
}

impl ConfigStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store located under the configured home path
    pub fn open(config: &Config) -> Result<Self> {
        Ok(Self::new(config.home_path()?.join(STORE_DIR)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, key: StoreKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    /// Read a value, trimmed; empty files count as absent
    pub fn read(&self, key: StoreKey) -> Result<Option<String>> {
        let path = self.path(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let value = content.trim();
                Ok((!value.is_empty()).then(|| value.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {:?}", path)),
        }
    }

    pub fn require(&self, key: StoreKey) -> Result<String> {
        self.read(key)?
            .ok_or_else(|| PublishError::ConfigMissing(key.label()).into())
    }

    pub fn write(&self, key: StoreKey, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create store directory: {:?}", self.root))?;

        let path = self.path(key);
        if key.is_secret() {
            write_private(&path, value)
        } else {
            std::fs::write(&path, value)
        }
        .with_context(|| format!("Failed to write {:?}", path))?;

        debug!("Stored {} in {:?}", key.label(), path);
        Ok(())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, value: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(value.as_bytes())
}

#[cfg(not(unix))]
fn write_private(path: &Path, value: &str) -> std::io::Result<()> {
    std::fs::write(path, value)
}

/// Provider choice plus its access token
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub token: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerMode {
    Personal,
    Organization,
}

impl OwnerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerMode::Personal => "user",
            OwnerMode::Organization => "org",
        }
    }
}

impl FromStr for OwnerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "user" => Ok(OwnerMode::Personal),
            "org" => Ok(OwnerMode::Organization),
            other => Err(format!("unknown owner type: {:?}", other)),
        }
    }
}

/// Account the remote repository lives under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipConfig {
    pub mode: OwnerMode,
    pub login: String,
}

impl OwnershipConfig {
    /// The login must be the user's own account or one of their organizations
    pub fn is_consistent(&self, user: &User, orgs: &[Organization]) -> bool {
        match self.mode {
            OwnerMode::Personal => self.login == user.login,
            OwnerMode::Organization => orgs.iter().any(|org| org.login == self.login),
        }
    }
}

/// Read the provider kind and token, prompting when missing or refreshing
pub fn resolve_provider_config(
    store: &ConfigStore,
    prompter: &dyn Prompter,
    refresh_server: bool,
    refresh_token: bool,
) -> Result<ProviderConfig> {
    let stored_kind = if refresh_server {
        None
    } else {
        match store.read(StoreKey::Server)? {
            Some(raw) => match raw.parse::<ProviderKind>() {
                Ok(kind) => Some(kind),
                Err(e) => {
                    warn!("Ignoring stored provider: {}", e);
                    None
                }
            },
            None => None,
        }
    };

    let kind = match stored_kind {
        Some(kind) => {
            info!("Using git hosting provider: {}", kind);
            kind
        }
        None => {
            let kind = prompter.select_provider()?;
            store.write(StoreKey::Server, kind.as_str())?;
            info!("Saved git hosting provider {} to {:?}", kind, store.path(StoreKey::Server));
            kind
        }
    };

    let stored_token = if refresh_token {
        None
    } else {
        match store.require(StoreKey::Token) {
            Ok(token) => Some(token),
            Err(e) if PublishError::severity_of(&e) == crate::error::Severity::Expected => {
                warn!("{} token has not been generated yet", kind);
                None
            }
            Err(e) => return Err(e),
        }
    };

    let token = match stored_token {
        Some(token) => {
            info!("Read {} token from {:?}", kind, store.path(StoreKey::Token));
            token
        }
        None => {
            let token = prompter.input_token(kind)?.trim().to_string();
            store.write(StoreKey::Token, &token)?;
            info!("Saved {} token to {:?}", kind, store.path(StoreKey::Token));
            token
        }
    };

    Ok(ProviderConfig { kind, token })
}

/// Read who owns the remote repository, prompting when missing, refreshing or stale
pub fn resolve_ownership(
    store: &ConfigStore,
    prompter: &dyn Prompter,
    user: &User,
    orgs: &[Organization],
    refresh_owner: bool,
) -> Result<OwnershipConfig> {
    if !refresh_owner {
        let mode = store
            .read(StoreKey::Owner)?
            .and_then(|raw| raw.parse::<OwnerMode>().ok());
        let login = store.read(StoreKey::Login)?;

        if let (Some(mode), Some(login)) = (mode, login) {
            let ownership = OwnershipConfig { mode, login };
            if ownership.is_consistent(user, orgs) {
                info!("Repository owner: {} ({})", ownership.login, mode.as_str());
                return Ok(ownership);
            }
            warn!(
                "Stored owner {} is not accessible to {}, choosing again",
                ownership.login, user.login
            );
        }
    }

    let mode = prompter.select_owner_mode(!orgs.is_empty())?;
    let login = match mode {
        OwnerMode::Personal => user.login.clone(),
        OwnerMode::Organization => prompter.select_organization(orgs)?,
    };

    store.write(StoreKey::Owner, mode.as_str())?;
    store.write(StoreKey::Login, &login)?;
    info!("Saved repository owner {} ({})", login, mode.as_str());

    Ok(OwnershipConfig { mode, login })
}
