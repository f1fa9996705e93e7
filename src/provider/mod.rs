//! Hosting provider abstraction layer
//!
//! This module provides a provider-agnostic interface over the REST APIs of the
//! supported git hosting services. The orchestrator only ever talks to
//! [`HostingProvider`]; the concrete service is picked at runtime from the
//! persisted [`ProviderKind`] through the [`Provider`] enum.

pub mod gitee;
pub mod github;
mod rest;

pub use gitee::GiteeProvider;
pub use github::GitHubProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::config::ProvidersConfig;
use crate::error::RemoteError;
use crate::store::ProviderConfig;

/// Organizations are requested as a single page of this size and never paginated further
pub const ORG_PAGE_SIZE: u32 = 100;

/// Supported hosting services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    GitHub,
    Gitee,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::GitHub, ProviderKind::Gitee];

    /// Value written to the credential store
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "github",
            ProviderKind::Gitee => "gitee",
        }
    }

    /// Human readable name for prompts and logs
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "GitHub",
            ProviderKind::Gitee => "Gitee",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Stored values may be hand-edited, so surrounding whitespace is ignored
        match s.trim() {
            "github" => Ok(ProviderKind::GitHub),
            "gitee" => Ok(ProviderKind::Gitee),
            other => Err(format!("unknown git hosting provider: {:?}", other)),
        }
    }
}

/// Authenticated account
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Organization {
    pub login: String,
}

/// Repository metadata as returned by the provider
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Capabilities the publish pipeline needs from a git hosting service
///
/// `get_repository` deliberately folds every unsuccessful status into `Ok(None)`
/// so callers can branch on "does not exist yet" without inspecting errors.
#[async_trait]
pub trait HostingProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn get_user(&self) -> Result<User, RemoteError>;

    async fn get_organizations(&self, login: &str) -> Result<Vec<Organization>, RemoteError>;

    async fn get_repository(&self, login: &str, name: &str)
        -> Result<Option<Repository>, RemoteError>;

    async fn create_personal_repository(&self, name: &str) -> Result<Repository, RemoteError>;

    async fn create_organization_repository(
        &self,
        name: &str,
        org: &str,
    ) -> Result<Repository, RemoteError>;

    /// SSH clone URL, computed locally
    fn clone_url(&self, login: &str, name: &str) -> String;
}

/// Runtime-selected provider
pub enum Provider {
    GitHub(GitHubProvider),
    Gitee(GiteeProvider),
}

impl Provider {
    pub fn connect(
        config: &ProviderConfig,
        settings: &ProvidersConfig,
    ) -> Result<Self, RemoteError> {
        let timeout = Duration::from_secs(settings.timeout);
        match config.kind {
            ProviderKind::GitHub => Ok(Provider::GitHub(GitHubProvider::new(
                &config.token,
                &settings.github,
                timeout,
            )?)),
            ProviderKind::Gitee => Ok(Provider::Gitee(GiteeProvider::new(
                &config.token,
                &settings.gitee,
                timeout,
            )?)),
        }
    }

    fn inner(&self) -> &dyn HostingProvider {
        match self {
            Provider::GitHub(p) => p,
            Provider::Gitee(p) => p,
        }
    }
}

#[async_trait]
impl HostingProvider for Provider {
    fn kind(&self) -> ProviderKind {
        self.inner().kind()
    }

    async fn get_user(&self) -> Result<User, RemoteError> {
        self.inner().get_user().await
    }

    async fn get_organizations(&self, login: &str) -> Result<Vec<Organization>, RemoteError> {
        self.inner().get_organizations(login).await
    }

    async fn get_repository(
        &self,
        login: &str,
        name: &str,
    ) -> Result<Option<Repository>, RemoteError> {
        self.inner().get_repository(login, name).await
    }

    async fn create_personal_repository(&self, name: &str) -> Result<Repository, RemoteError> {
        self.inner().create_personal_repository(name).await
    }

    async fn create_organization_repository(
        &self,
        name: &str,
        org: &str,
    ) -> Result<Repository, RemoteError> {
        self.inner().create_organization_repository(name, org).await
    }

    fn clone_url(&self, login: &str, name: &str) -> String {
        self.inner().clone_url(login, name)
    }
}

/// Builds a provider client once credentials are known
pub trait ProviderConnector: Send + Sync {
    fn connect(&self, config: &ProviderConfig) -> anyhow::Result<Box<dyn HostingProvider>>;
}

/// Connector for the real REST endpoints
pub struct HttpConnector {
    settings: ProvidersConfig,
}

impl HttpConnector {
    pub fn new(settings: ProvidersConfig) -> Self {
        Self { settings }
    }
}

impl ProviderConnector for HttpConnector {
    fn connect(&self, config: &ProviderConfig) -> anyhow::Result<Box<dyn HostingProvider>> {
        let provider = Provider::connect(config, &self.settings)?;
        Ok(Box::new(provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!(" github\n".parse::<ProviderKind>(), Ok(ProviderKind::GitHub));
        assert_eq!("gitee".parse::<ProviderKind>(), Ok(ProviderKind::Gitee));
        assert!("bitbucket".parse::<ProviderKind>().is_err());
        assert!("GitHub".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_provider_dispatch_by_kind() {
        let settings = ProvidersConfig::default();
        for kind in ProviderKind::ALL {
            let config = ProviderConfig {
                kind,
                token: "secret".to_string(),
            };
            let provider = Provider::connect(&config, &settings).unwrap();
            assert_eq!(provider.kind(), kind);
        }
    }

    #[test]
    fn test_clone_urls_per_provider() {
        let settings = ProvidersConfig::default();
        let github = Provider::connect(
            &ProviderConfig {
                kind: ProviderKind::GitHub,
                token: "t".into(),
            },
            &settings,
        )
        .unwrap();
        let gitee = Provider::connect(
            &ProviderConfig {
                kind: ProviderKind::Gitee,
                token: "t".into(),
            },
            &settings,
        )
        .unwrap();

        assert_eq!(github.clone_url("octocat", "demo"), "git@github.com:octocat/demo.git");
        assert_eq!(gitee.clone_url("octocat", "demo"), "git@gitee.com:octocat/demo.git");
    }
}
