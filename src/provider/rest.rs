use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{Organization, Repository, User, ORG_PAGE_SIZE};
use crate::error::RemoteError;

const USER_AGENT: &str = concat!("branchwright/", env!("CARGO_PKG_VERSION"));

/// Where the access token travels on each request
#[derive(Debug, Clone)]
pub(crate) enum Auth {
    /// `Authorization: token <t>` header
    Header(String),
    /// `access_token=<t>` query parameter
    Query(String),
}

/// Thin JSON-over-HTTP helper shared by the provider implementations
#[derive(Debug, Clone)]
pub(crate) struct RestClient {
    http: Client,
    base_url: String,
    auth: Auth,
    accept: Option<&'static str>,
}

impl RestClient {
    pub(crate) fn new(
        base_url: &str,
        auth: Auth,
        accept: Option<&'static str>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(RemoteError::transport)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            accept,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!("{} {}", method, url);

        let mut request = self.http.request(method, url);
        request = match &self.auth {
            Auth::Header(token) => request.header(AUTHORIZATION, format!("token {}", token)),
            Auth::Query(token) => request.query(&[("access_token", token.as_str())]),
        };
        if let Some(accept) = self.accept {
            request = request.header(ACCEPT, accept);
        }
        request
    }

    async fn send(request: RequestBuilder) -> Result<Response, RemoteError> {
        request.send().await.map_err(RemoteError::transport)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
        let status = response.status();
        let body = response.text().await.map_err(RemoteError::transport)?;

        if !status.is_success() {
            return Err(RemoteError {
                status: Some(status.as_u16()),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| RemoteError {
            status: Some(status.as_u16()),
            body: format!("unexpected response body ({}): {}", e, body),
        })
    }

    /// GET that fails on any unsuccessful status
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, RemoteError> {
        let response = Self::send(self.request(Method::GET, path).query(query)).await?;
        Self::decode(response).await
    }

    /// GET where any unsuccessful status means "absent"
    pub(crate) async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, RemoteError> {
        let response = Self::send(self.request(Method::GET, path)).await?;
        let status = response.status();

        if !status.is_success() {
            debug!("{} answered {}, treating as absent", path, status);
            return Ok(None);
        }

        Self::decode(response).await.map(Some)
    }

    pub(crate) async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, RemoteError> {
        let response = Self::send(self.request(Method::POST, path).json(body)).await?;
        Self::decode(response).await
    }
}

/// Endpoints both services expose under the same paths
impl RestClient {
    pub(crate) async fn user(&self) -> Result<User, RemoteError> {
        self.get_json("/user", &[]).await
    }

    /// First page of organizations at `path`
    pub(crate) async fn organizations(
        &self,
        path: &str,
    ) -> Result<Vec<Organization>, RemoteError> {
        self.get_json(
            path,
            &[
                ("page", "1".to_string()),
                ("per_page", ORG_PAGE_SIZE.to_string()),
            ],
        )
        .await
    }

    pub(crate) async fn repository(
        &self,
        login: &str,
        name: &str,
    ) -> Result<Option<Repository>, RemoteError> {
        self.get_optional(&format!("/repos/{}/{}", login, name)).await
    }

    /// Create `name` under the authenticated user, or under `org` when given
    pub(crate) async fn create_repository(
        &self,
        name: &str,
        org: Option<&str>,
    ) -> Result<Repository, RemoteError> {
        let path = match org {
            Some(org) => format!("/orgs/{}/repos", org),
            None => "/user/repos".to_string(),
        };
        self.post_json(&path, &json!({ "name": name })).await
    }
}

pub(crate) fn ssh_clone_url(ssh_host: &str, login: &str, name: &str) -> String {
    format!("git@{}:{}/{}.git", ssh_host, login, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssh_clone_url() {
        assert_eq!(
            ssh_clone_url("gitee.com", "kaiyuan", "demo"),
            "git@gitee.com:kaiyuan/demo.git"
        );
    }

    #[test]
    fn test_base_url_trailing_slash_is_dropped() {
        let client = RestClient::new(
            "https://api.github.com/",
            Auth::Header("t".to_string()),
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.base_url, "https://api.github.com");
    }
}
