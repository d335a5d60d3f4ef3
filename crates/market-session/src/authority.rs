//! Remote role authority.
//!
//! The authority is the source of truth for which roles a principal holds.
//! [`HttpRoleAuthority`] talks to it over HTTP:
//!
//! - `GET /api/role-data` returns `{"currentRole": ..., "availableRoles": [...]}`
//! - `POST /api/set-role` with `{"role": ...}` records the principal's selection

use async_trait::async_trait;
use market_rbac::Role;
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

use crate::config::{AuthorityEndpoint, SessionConfig};
use crate::error::AuthorityError;
use crate::retry::{retry_if, RetryPolicy};

/// Header carrying the durable principal id.
pub const PRINCIPAL_HEADER: &str = "X-Principal-Id";

/// Role data as reported by the authority.
///
/// Identifiers are kept raw; the role store validates and normalizes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRoleData {
    /// Role the authority considers current.
    pub current_role: String,
    /// Roles assigned to the principal.
    pub available_roles: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SetRoleRequest<'a> {
    role: &'a str,
}

/// Source of truth for a principal's roles.
#[async_trait]
pub trait RoleAuthority: Send + Sync {
    /// Fetch the principal's current and available roles.
    async fn fetch_role_data(&self, principal_id: Option<&str>) -> Result<RemoteRoleData, AuthorityError>;

    /// Record the principal's role selection.
    async fn set_role(&self, principal_id: Option<&str>, role: Role) -> Result<(), AuthorityError>;
}

/// HTTP role authority client.
#[derive(Debug, Clone)]
pub struct HttpRoleAuthority {
    /// HTTP client instance.
    client: Client,

    /// Endpoint configuration.
    endpoint: AuthorityEndpoint,

    /// Retry policy for reads.
    retry: RetryPolicy,
}

impl HttpRoleAuthority {
    /// Create a client for an endpoint.
    pub fn new(endpoint: AuthorityEndpoint, timeout: Duration) -> Result<Self, AuthorityError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            retry: RetryPolicy::default(),
        })
    }

    /// Create a client from session configuration.
    pub fn from_config(config: &SessionConfig) -> Result<Self, AuthorityError> {
        Ok(Self::new(config.authority.clone(), config.timeout())?
            .with_retry(RetryPolicy::with_attempts(config.max_retries)))
    }

    /// Override the read retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn request(&self, method: Method, path: &str, principal_id: Option<&str>) -> RequestBuilder {
        let mut request = self.client.request(method, self.endpoint.url(path));

        if let Some(ref api_key) = self.endpoint.api_key {
            request = request.bearer_auth(api_key);
        }
        if let Some(principal_id) = principal_id {
            request = request.header(PRINCIPAL_HEADER, principal_id);
        }

        request
    }

    async fn fetch_once(&self, principal_id: Option<&str>) -> Result<RemoteRoleData, AuthorityError> {
        let response = self
            .request(Method::GET, "/api/role-data", principal_id)
            .send()
            .await?;
        handle_response(response).await
    }

    async fn handle_empty_response(response: reqwest::Response) -> Result<(), AuthorityError> {
        let status = response.status();
        check_status(response).await?;
        debug!(status = status.as_u16(), "Role authority accepted request");
        Ok(())
    }
}

#[async_trait]
impl RoleAuthority for HttpRoleAuthority {
    #[instrument(skip(self))]
    async fn fetch_role_data(&self, principal_id: Option<&str>) -> Result<RemoteRoleData, AuthorityError> {
        debug!("Fetching role data");
        retry_if(&self.retry, || self.fetch_once(principal_id), AuthorityError::is_retryable).await
    }

    #[instrument(skip(self), fields(role = %role))]
    async fn set_role(&self, principal_id: Option<&str>, role: Role) -> Result<(), AuthorityError> {
        debug!("Setting role on authority");

        let response = self
            .request(Method::POST, "/api/set-role", principal_id)
            .json(&SetRoleRequest { role: role.as_str() })
            .send()
            .await?;

        Self::handle_empty_response(response).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AuthorityError> {
    let status = response.status();

    if status == reqwest::StatusCode::UNAUTHORIZED {
        error!("Role authority authentication failed");
        return Err(AuthorityError::AuthenticationFailed);
    }

    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        warn!(status = status.as_u16(), message = %message, "Role authority API error");
        return Err(AuthorityError::ApiError {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response)
}

async fn handle_response<T>(response: reqwest::Response) -> Result<T, AuthorityError>
where
    T: for<'de> Deserialize<'de>,
{
    check_status(response)
        .await?
        .json()
        .await
        .map_err(|e| AuthorityError::InvalidResponse(e.to_string()))
}
