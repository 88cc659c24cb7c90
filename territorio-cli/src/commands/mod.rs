pub mod auth;
pub mod config;
pub mod tree;

use std::sync::Arc;

use anyhow::{Context, Result};
use territorio_core::api::HttpBackend;
use territorio_core::auth::{GoogleAdapter, IdentityPrompt, MicrosoftAdapter};
use territorio_core::{ClientConfig, FileTokenStore, SessionManager};

use crate::prompt::TerminalPrompt;

/// Everything a command needs to talk to the backend as the current user.
pub struct Client {
    pub config: ClientConfig,
    pub session: SessionManager,
    pub google: Arc<GoogleAdapter>,
    pub microsoft: Arc<MicrosoftAdapter>,
    pub token_path: std::path::PathBuf,
}

impl Client {
    /// Build the session for `config`, with the token file scoped to the
    /// backend origin.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base = config
            .api_base()
            .context("check api_base_url in your configuration")?;
        let tokens = FileTokenStore::default_for(&base);
        let token_path = tokens.path().to_path_buf();

        let prompt: Arc<dyn IdentityPrompt> = Arc::new(TerminalPrompt);
        let google = Arc::new(GoogleAdapter::new(config.google.clone(), prompt.clone()));
        let microsoft = Arc::new(MicrosoftAdapter::new(config.microsoft.clone(), prompt));

        let session = SessionManager::new(
            Arc::new(HttpBackend::new(base)),
            Arc::new(tokens),
            config.access_policy(),
        )
        .with_adapter(google.clone())
        .with_adapter(microsoft.clone());

        Ok(Self {
            config,
            session,
            google,
            microsoft,
            token_path,
        })
    }
}
