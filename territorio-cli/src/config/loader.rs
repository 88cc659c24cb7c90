use super::types::{
    API_BASE_ENV, PROJECT_CONFIG_DIR_ENV, RawClientConfig, RawGoogleConfig, RawMicrosoftConfig,
};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use territorio_core::{ClientConfig, GoogleConfig, MicrosoftConfig};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project + environment)
    pub fn load() -> Result<ClientConfig> {
        let user_path = Self::user_config_path();
        let project_path = Self::project_config_path();
        let config = Self::load_from_paths(user_path.as_deref(), &project_path)?;
        Ok(Self::apply_env(config, std::env::var(API_BASE_ENV).ok()))
    }

    /// Merge the user and project files, in that order, over the defaults.
    pub fn load_from_paths(user_path: Option<&Path>, project_path: &Path) -> Result<ClientConfig> {
        let mut raw = RawClientConfig::default();

        // Layer 1: User config
        if let Some(user_path) = user_path
            && user_path.exists()
        {
            raw = Self::merge_raw(raw, Self::read_raw(user_path)?);
        }

        // Layer 2: Project config
        if project_path.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(project_path)?);
        }

        Ok(Self::finalize(raw))
    }

    fn read_raw(path: &Path) -> Result<RawClientConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("invalid config in {}", path.display()))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "territorio").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with TERRITORIO_PROJECT_CONFIG_DIR (useful for isolated tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var(PROJECT_CONFIG_DIR_ENV) {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".territorio/config.toml")
        }
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawClientConfig, overlay: RawClientConfig) -> RawClientConfig {
        RawClientConfig {
            api_base_url: overlay.api_base_url.or(base.api_base_url),
            application: overlay.application.or(base.application),
            admin_emails: overlay.admin_emails.or(base.admin_emails),
            google: RawGoogleConfig {
                client_id: overlay.google.client_id.or(base.google.client_id),
            },
            microsoft: RawMicrosoftConfig {
                client_id: overlay.microsoft.client_id.or(base.microsoft.client_id),
                tenant_id: overlay.microsoft.tenant_id.or(base.microsoft.tenant_id),
                scopes: overlay.microsoft.scopes.or(base.microsoft.scopes),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawClientConfig) -> ClientConfig {
        let defaults = ClientConfig::default();
        let microsoft_defaults = MicrosoftConfig::default();
        ClientConfig {
            api_base_url: raw.api_base_url.unwrap_or(defaults.api_base_url),
            application: raw.application.unwrap_or(defaults.application),
            admin_emails: raw.admin_emails.unwrap_or_default(),
            google: GoogleConfig {
                client_id: raw.google.client_id.unwrap_or_default(),
            },
            microsoft: MicrosoftConfig {
                client_id: raw.microsoft.client_id.unwrap_or_default(),
                tenant_id: raw
                    .microsoft
                    .tenant_id
                    .unwrap_or(microsoft_defaults.tenant_id),
                scopes: raw.microsoft.scopes.unwrap_or(microsoft_defaults.scopes),
            },
        }
    }

    /// Apply the base URL override; blank values are ignored.
    fn apply_env(mut config: ClientConfig, api_base: Option<String>) -> ClientConfig {
        if let Some(url) = api_base.filter(|url| !url.trim().is_empty()) {
            config.api_base_url = url.trim().to_string();
        }
        config
    }
}
