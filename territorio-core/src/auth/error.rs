//! Authentication error types

use thiserror::Error;

use super::policy::Capability;
use super::session::SessionPhase;

/// Default message shown when a credential exchange fails without detail.
pub const EXCHANGE_FAILED_MESSAGE: &str = "Authentication error. Please try again.";

/// Errors surfaced by the session layer to the view layer.
///
/// Provider and transport failures are converted into these variants before
/// they leave [`SessionManager`](super::SessionManager). User cancellation and
/// a failed role lookup are not errors: the former is
/// [`LoginOutcome::Cancelled`](super::LoginOutcome), the latter a degraded
/// assignment.
#[derive(Debug, Error)]
pub enum AuthError {
    /// An identity provider is referenced but not configured
    #[error("{provider} sign-in is not configured: {reason}")]
    Configuration {
        provider: &'static str,
        reason: String,
    },

    /// Caller-supplied input was rejected before any network call
    #[error("{0}")]
    Validation(String),

    /// The backend rejected the provider credential or password
    #[error("{message}")]
    CredentialExchangeFailed { message: String },

    /// The bearer token was rejected; the session has been cleared
    #[error("session expired, please sign in again")]
    Unauthorized,

    /// Another login is already in flight
    #[error("a sign-in is already in progress")]
    LoginInProgress,

    /// The requested operation is not valid in the current session phase
    #[error("cannot {operation} while {phase}")]
    InvalidTransition {
        operation: &'static str,
        phase: SessionPhase,
    },

    /// The session does not hold the capability needed for this view
    #[error("your account does not have permission to {capability}")]
    Forbidden { capability: Capability },

    /// An authenticated backend call failed for a reason other than 401
    #[error("request failed: {0}")]
    Request(String),

    /// The token store could not be read or written
    #[error("token storage error: {0}")]
    Storage(String),
}

impl AuthError {
    /// Single-line message suitable for display next to the login affordance.
    pub fn user_message(&self) -> String {
        self.to_string().lines().next().unwrap_or_default().to_string()
    }

    /// Whether the failure came from a missing provider configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(self, AuthError::Configuration { .. })
    }
}
