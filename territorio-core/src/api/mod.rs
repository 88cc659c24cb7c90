//! REST contract of the platform backend.
//!
//! The [`Backend`] trait covers the endpoints the session layer and the tree
//! view consume. [`HttpBackend`] talks to the real service over `reqwest`;
//! [`MockBackend`] replays scripted responses for tests.

mod http;
mod mock;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

pub use http::HttpBackend;
pub use mock::{BackendCall, MockBackend};

use crate::auth::{AccessToken, ProviderCredential};
use crate::tree::AdministrativeUnit;
use crate::types::{Assignment, User};

/// Errors from backend calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The backend answered 401; the bearer token is no longer valid
    #[error("unauthorized")]
    Unauthorized,

    /// The backend answered with another non-success status
    #[error("backend returned status {status}: {}", detail.as_deref().unwrap_or("no detail"))]
    Rejected { status: u16, detail: Option<String> },

    /// The request never produced a response
    #[error("request failed: {0}")]
    Transport(String),

    /// The response body did not match the contract
    #[error("invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Backend-supplied explanation, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Rejected { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

/// Successful credential exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: AccessToken,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// The backend endpoints used by the client.
///
/// Exchange calls are unauthenticated; every other call carries the bearer
/// token and must report a 401 as [`ApiError::Unauthorized`].
#[async_trait]
pub trait Backend: Send + Sync {
    /// Exchange a provider credential for this application's bearer token.
    async fn exchange(&self, credential: &ProviderCredential) -> Result<LoginResponse, ApiError>;

    /// `GET /auth/me`
    async fn current_user(&self, token: &AccessToken) -> Result<User, ApiError>;

    /// `GET /auth/me/assignment`
    async fn my_assignment(&self, token: &AccessToken) -> Result<Assignment, ApiError>;

    /// `GET /dashboard/administrative-tree`
    ///
    /// With `prune_empty == false` the backend also returns units without
    /// committees.
    async fn administrative_tree(
        &self,
        token: &AccessToken,
        prune_empty: bool,
    ) -> Result<Vec<AdministrativeUnit>, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_error_shows_detail() {
        let err = ApiError::Rejected {
            status: 400,
            detail: Some("Invalid credentials".to_string()),
        };
        assert_eq!(err.to_string(), "backend returned status 400: Invalid credentials");
        assert_eq!(err.detail(), Some("Invalid credentials"));
    }

    #[test]
    fn rejected_error_without_detail() {
        let err = ApiError::Rejected {
            status: 502,
            detail: None,
        };
        assert_eq!(err.to_string(), "backend returned status 502: no detail");
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn login_response_defaults_token_type() {
        let json = r#"{
            "access_token": "tok",
            "user": {"id": 1, "name": "Ana", "email": "ana@example.org"}
        }"#;
        let response: LoginResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.token_type, "bearer");
        assert_eq!(response.access_token.expose_secret(), "tok");
        assert_eq!(response.user.id, 1);
    }
}
