//! Client configuration: backend location, identity providers and the admin
//! allow-list.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::auth::{AccessPolicy, AdminAllowList, Application};

/// Default backend base URL.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Default Entra ID tenant for multi-tenant sign-in.
pub const DEFAULT_MICROSOFT_TENANT: &str = "common";

/// Minimal profile scope requested from Microsoft.
pub const MICROSOFT_PROFILE_SCOPE: &str = "User.Read";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid API base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Configuration for the client side of the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the REST backend
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Which front-end's policy table applies
    #[serde(default)]
    pub application: Application,

    /// Emails granted the admin dashboard regardless of role
    #[serde(default)]
    pub admin_emails: Vec<String>,

    #[serde(default)]
    pub google: GoogleConfig,

    #[serde(default)]
    pub microsoft: MicrosoftConfig,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            application: Application::default(),
            admin_emails: Vec::new(),
            google: GoogleConfig::default(),
            microsoft: MicrosoftConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Parse the configured backend URL.
    pub fn api_base(&self) -> Result<Url, ConfigError> {
        Url::parse(self.api_base_url.trim()).map_err(|source| ConfigError::InvalidBaseUrl {
            url: self.api_base_url.clone(),
            source,
        })
    }

    /// The policy table for the configured application with the configured
    /// admin allow-list.
    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy::for_application(self.application)
            .with_admin_emails(AdminAllowList::new(&self.admin_emails))
    }
}

/// Google Identity Services settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// OAuth client id of the web application
    #[serde(default)]
    pub client_id: String,
}

impl GoogleConfig {
    pub fn is_configured(&self) -> bool {
        !self.client_id.trim().is_empty()
    }
}

/// Microsoft Entra ID settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MicrosoftConfig {
    /// Application (client) id; Microsoft sign-in is disabled when empty
    #[serde(default)]
    pub client_id: String,

    /// Directory (tenant) id
    #[serde(default = "default_tenant")]
    pub tenant_id: String,

    /// Scopes requested in the interactive flow
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

fn default_tenant() -> String {
    DEFAULT_MICROSOFT_TENANT.to_string()
}

fn default_scopes() -> Vec<String> {
    vec![MICROSOFT_PROFILE_SCOPE.to_string()]
}

impl Default for MicrosoftConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            tenant_id: default_tenant(),
            scopes: default_scopes(),
        }
    }
}

impl MicrosoftConfig {
    pub fn new(client_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            tenant_id: tenant_id.into(),
            scopes: default_scopes(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.client_id.trim().is_empty()
    }

    /// Authority URL for the configured tenant.
    pub fn authority(&self) -> String {
        let tenant = if self.tenant_id.trim().is_empty() {
            DEFAULT_MICROSOFT_TENANT
        } else {
            self.tenant_id.trim()
        };
        format!("https://login.microsoftonline.com/{}", tenant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Capability;

    #[test]
    fn default_config_points_at_localhost() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.application, Application::Committees);
        assert!(!config.google.is_configured());
        assert!(!config.microsoft.is_configured());
    }

    #[test]
    fn microsoft_defaults_to_profile_scope() {
        let config = MicrosoftConfig::default();
        assert_eq!(config.scopes, vec!["User.Read".to_string()]);
        assert_eq!(config.authority(), "https://login.microsoftonline.com/common");
    }

    #[test]
    fn microsoft_authority_uses_tenant() {
        let config = MicrosoftConfig::new("client", "contoso-tenant");
        assert!(config.is_configured());
        assert_eq!(
            config.authority(),
            "https://login.microsoftonline.com/contoso-tenant"
        );
    }

    #[test]
    fn invalid_base_url_is_reported() {
        let config = ClientConfig {
            api_base_url: "not a url".to_string(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.api_base(),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn deserialize_toml() {
        let toml = r#"
            api_base_url = "https://api.example.org"
            application = "dashboard"
            admin_emails = ["Jodomaq@Gmail.com"]

            [microsoft]
            client_id = "abc"
        "#;
        let config: ClientConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.application, Application::Dashboard);
        assert_eq!(config.microsoft.tenant_id, "common");
        assert!(config.microsoft.is_configured());
        assert!(!config.google.is_configured());

        let policy = config.access_policy();
        assert!(policy.is_admin_email("jodomaq@gmail.com"));
        assert!(
            !policy
                .evaluate(None, false)
                .allows(Capability::StrategicDashboard)
        );
    }
}
