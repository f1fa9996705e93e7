use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

use super::rest::{ssh_clone_url, Auth, RestClient};
use super::{HostingProvider, Organization, ProviderKind, Repository, User};
use crate::config::ProviderEndpoint;
use crate::error::RemoteError;

/// Gitee REST client, token passed as the `access_token` query parameter
pub struct GiteeProvider {
    rest: RestClient,
    ssh_host: String,
}

impl GiteeProvider {
    pub fn new(
        token: &str,
        endpoint: &ProviderEndpoint,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let rest = RestClient::new(
            &endpoint.api_url,
            Auth::Query(token.to_string()),
            None,
            timeout,
        )?;

        Ok(Self {
            rest,
            ssh_host: endpoint.ssh_host.clone(),
        })
    }
}

#[async_trait]
impl HostingProvider for GiteeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gitee
    }

    async fn get_user(&self) -> Result<User, RemoteError> {
        self.rest.user().await
    }

    async fn get_organizations(&self, login: &str) -> Result<Vec<Organization>, RemoteError> {
        let orgs = self
            .rest
            .organizations(&format!("/users/{}/orgs", login))
            .await?;
        info!("Found {} Gitee organizations for {}", orgs.len(), login);
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
