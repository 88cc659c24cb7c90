use serde::Deserialize;
use territorio_core::auth::Application;

/// Environment variable overriding the backend base URL.
pub const API_BASE_ENV: &str = "TERRITORIO_API_BASE";

/// Environment variable overriding the project config directory.
pub const PROJECT_CONFIG_DIR_ENV: &str = "TERRITORIO_PROJECT_CONFIG_DIR";

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawClientConfig {
    /// Base URL of the REST backend
    pub api_base_url: Option<String>,

    /// Policy table to apply (committees, dashboard, attendance)
    pub application: Option<Application>,

    /// Emails with admin dashboard access
    pub admin_emails: Option<Vec<String>>,

    #[serde(default)]
    pub google: RawGoogleConfig,

    #[serde(default)]
    pub microsoft: RawMicrosoftConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawGoogleConfig {
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawMicrosoftConfig {
    pub client_id: Option<String>,
    pub tenant_id: Option<String>,
    pub scopes: Option<Vec<String>>,
}
