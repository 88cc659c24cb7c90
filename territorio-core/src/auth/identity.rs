//! Identity providers.
//!
//! Google, Microsoft and username/password sign-in each produce a
//! [`ProviderCredential`]. The session layer exchanges any credential through
//! one backend call, so provider differences end here.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, warn};

use super::AuthError;
use crate::config::{GoogleConfig, MicrosoftConfig};

/// Identity provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Google,
    Microsoft,
    Password,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Microsoft => "microsoft",
            Provider::Password => "password",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider-specific credential, ready to be exchanged for a bearer token.
#[derive(Debug, Clone)]
pub enum ProviderCredential {
    /// Google identity token from the sign-in widget
    Google { id_token: SecretString },
    /// Microsoft access token from the interactive popup
    Microsoft { access_token: SecretString },
    /// Local username and password
    Password {
        username: String,
        password: SecretString,
    },
}

impl ProviderCredential {
    pub fn google(id_token: impl Into<String>) -> Self {
        Self::Google {
            id_token: SecretString::from(id_token.into()),
        }
    }

    pub fn microsoft(access_token: impl Into<String>) -> Self {
        Self::Microsoft {
            access_token: SecretString::from(access_token.into()),
        }
    }

    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Password {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            ProviderCredential::Google { .. } => Provider::Google,
            ProviderCredential::Microsoft { .. } => Provider::Microsoft,
            ProviderCredential::Password { .. } => Provider::Password,
        }
    }
}

/// Result of an interactive credential request.
#[derive(Debug, Clone)]
pub enum CredentialOutcome {
    Obtained(ProviderCredential),
    /// The user abandoned the flow; not an error
    Cancelled,
}

/// Failure reported by an external identity widget.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ProviderError(pub String);

/// What an interactive flow is asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub provider: Provider,
    pub client_id: String,
    pub authority: Option<String>,
    pub scopes: Vec<String>,
}

/// An external interactive identity flow: the Google sign-in button, the
/// Microsoft popup, or a terminal prompt standing in for either.
///
/// `Ok(None)` means the user closed the flow without signing in.
#[async_trait]
pub trait IdentityPrompt: Send + Sync {
    async fn request_token(&self, request: &PromptRequest) -> Result<Option<String>, ProviderError>;

    /// Provider-side sign-out or revocation.
    async fn sign_out(&self, _provider: Provider) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Obtains a provider credential.
///
/// Implementations must report user cancellation as
/// [`CredentialOutcome::Cancelled`], never as an error.
#[async_trait]
pub trait IdentityAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    async fn obtain_credential(&self) -> Result<CredentialOutcome, AuthError>;

    /// Best-effort provider sign-out, run on logout.
    async fn sign_out(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Google sign-in through the external identity widget.
pub struct GoogleAdapter {
    config: GoogleConfig,
    prompt: Arc<dyn IdentityPrompt>,
}

impl GoogleAdapter {
    pub fn new(config: GoogleConfig, prompt: Arc<dyn IdentityPrompt>) -> Self {
        Self { config, prompt }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }
}

#[async_trait]
impl IdentityAdapter for GoogleAdapter {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    async fn obtain_credential(&self) -> Result<CredentialOutcome, AuthError> {
        if !self.is_configured() {
            return Err(AuthError::Configuration {
                provider: "google",
                reason: "no client id configured".to_string(),
            });
        }

        let request = PromptRequest {
            provider: Provider::Google,
            client_id: self.config.client_id.clone(),
            authority: None,
            scopes: Vec::new(),
        };

        match self.prompt.request_token(&request).await {
            Ok(Some(token)) if !token.trim().is_empty() => {
                debug!("received Google identity token");
                Ok(CredentialOutcome::Obtained(ProviderCredential::google(
                    token.trim(),
                )))
            }
            Ok(_) => Ok(CredentialOutcome::Cancelled),
            Err(e) => {
                warn!(error = %e, "Google sign-in widget failed");
                Ok(CredentialOutcome::Cancelled)
            }
        }
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.prompt.sign_out(Provider::Google).await
    }
}

/// Microsoft Entra ID sign-in through an interactive popup.
pub struct MicrosoftAdapter {
    config: MicrosoftConfig,
    prompt: Arc<dyn IdentityPrompt>,
}

impl MicrosoftAdapter {
    pub fn new(config: MicrosoftConfig, prompt: Arc<dyn IdentityPrompt>) -> Self {
        Self { config, prompt }
    }

    /// Whether the affordance should be enabled.
    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }
}

#[async_trait]
impl IdentityAdapter for MicrosoftAdapter {
    fn provider(&self) -> Provider {
        Provider::Microsoft
    }

    async fn obtain_credential(&self) -> Result<CredentialOutcome, AuthError> {
        if !self.is_configured() {
            return Err(AuthError::Configuration {
                provider: "microsoft",
                reason: "no client id configured".to_string(),
            });
        }

        let request = PromptRequest {
            provider: Provider::Microsoft,
            client_id: self.config.client_id.clone(),
            authority: Some(self.config.authority()),
            scopes: self.config.scopes.clone(),
        };

        match self.prompt.request_token(&request).await {
            Ok(Some(token)) if !token.trim().is_empty() => {
                debug!("received Microsoft access token");
                Ok(CredentialOutcome::Obtained(ProviderCredential::microsoft(
                    token.trim(),
                )))
            }
            Ok(_) => Ok(CredentialOutcome::Cancelled),
            Err(e) => Err(AuthError::CredentialExchangeFailed {
                message: format!("Microsoft sign-in failed: {}", e),
            }),
        }
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        if !self.is_configured() {
            return Ok(());
        }
        self.prompt.sign_out(Provider::Microsoft).await
    }
}

/// Username and password supplied directly by the caller.
pub struct PasswordAdapter {
    username: String,
    password: SecretString,
}

impl PasswordAdapter {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Reject empty fields before any request is made.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.username.trim().is_empty() || self.password.expose_secret().is_empty() {
            return Err(AuthError::Validation(
                "Username and password are required.".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityAdapter for PasswordAdapter {
    fn provider(&self) -> Provider {
        Provider::Password
    }

    async fn obtain_credential(&self) -> Result<CredentialOutcome, AuthError> {
        self.validate()?;
        Ok(CredentialOutcome::Obtained(ProviderCredential::Password {
            username: self.username.trim().to_string(),
            password: self.password.clone(),
        }))
    }
}
