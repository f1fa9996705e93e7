use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use super::rest::{ssh_clone_url, Auth, RestClient};
use super::{HostingProvider, Organization, ProviderKind, Repository, User};
use crate::config::ProviderEndpoint;
use crate::error::RemoteError;

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// GitHub REST client, token passed in the `Authorization` header
pub struct GitHubProvider {
    rest: RestClient,
    ssh_host: String,
}

impl GitHubProvider {
    pub fn new(
        token: &str,
        endpoint: &ProviderEndpoint,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let rest = RestClient::new(
            &endpoint.api_url,
            Auth::Header(token.to_string()),
            Some(GITHUB_ACCEPT),
            timeout,
        )?;

        Ok(Self {
            rest,
            ssh_host: endpoint.ssh_host.clone(),
        })
    }
}

#[async_trait]
impl HostingProvider for GitHubProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GitHub
    }

    async fn get_user(&self) -> Result<User, RemoteError> {
        self.rest.user().await
    }

    async fn get_organizations(&self, login: &str) -> Result<Vec<Organization>, RemoteError> {
        // GitHub lists memberships of the authenticated user, the login is implied
        debug!("Fetching GitHub organizations for {}", login);
        let orgs = self.rest.organizations("/user/orgs").await?;
        info!("Found {} GitHub organizations", orgs.len());
        Ok(orgs)
    }

    async fn get_repository(
        &self,
        login: &str,
        name: &str,
    ) -> Result<Option<Repository>, RemoteError> {
        self.rest.repository(login, name).await
    }

    async fn create_personal_repository(&self, name: &str) -> Result<Repository, RemoteError> {
        self.rest.create_repository(name, None).await
    }

    async fn create_organization_repository(
        &self,
        name: &str,
        org: &str,
    ) -> Result<Repository, RemoteError> {
        self.rest.create_repository(name, Some(org)).await
    }

    fn clone_url(&self, login: &str, name: &str) -> String {
        ssh_clone_url(&self.ssh_host, login, name)
    }
}
