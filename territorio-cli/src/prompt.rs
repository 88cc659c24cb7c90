//! Terminal stand-in for the browser identity widgets.
//!
//! The Google button and the Microsoft popup only exist in a browser. On the
//! command line the user completes the provider flow elsewhere and pastes the
//! resulting token. An empty answer counts as closing the popup.

use async_trait::async_trait;
use dialoguer::{Password, theme::ColorfulTheme};
use territorio_core::auth::{IdentityPrompt, PromptRequest, Provider, ProviderError};

pub struct TerminalPrompt;

#[async_trait]
impl IdentityPrompt for TerminalPrompt {
    async fn request_token(&self, request: &PromptRequest) -> Result<Option<String>, ProviderError> {
        let instructions = instructions_for(request);
        let label = token_label(request.provider).to_string();

        let answer = tokio::task::spawn_blocking(move || {
            println!("{}", instructions);
            Password::with_theme(&ColorfulTheme::default())
                .with_prompt(label)
                .allow_empty_password(true)
                .interact()
        })
        .await
        .map_err(|e| ProviderError(e.to_string()))?
        .map_err(|e| ProviderError(e.to_string()))?;

        Ok(non_empty(answer))
    }
}

fn token_label(provider: Provider) -> &'static str {
    match provider {
        Provider::Google => "Google ID token",
        Provider::Microsoft => "Microsoft access token",
        Provider::Password => "Password",
    }
}

fn instructions_for(request: &PromptRequest) -> String {
    match request.provider {
        Provider::Microsoft => format!(
            "Sign in at {} with client id {} (scopes: {}) and paste the access token.\nLeave empty to cancel.",
            request.authority.as_deref().unwrap_or("login.microsoftonline.com"),
            request.client_id,
            request.scopes.join(" "),
        ),
        provider => format!(
            "Sign in with {} for client id {} and paste the token.\nLeave empty to cancel.",
            provider, request.client_id,
        ),
    }
}

fn non_empty(answer: String) -> Option<String> {
    let answer = answer.trim();
    (!answer.is_empty()).then(|| answer.to_string())
}
