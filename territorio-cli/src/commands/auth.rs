//! Auth subcommands for territorio CLI

use anyhow::{Result, bail};
use clap::{Args, Subcommand, ValueEnum};
use dialoguer::console::style;
use dialoguer::{Input, Password, theme::ColorfulTheme};
use territorio_core::auth::{
    AccessPolicy, Capability, LoginOutcome, PasswordAdapter, PermissionSet,
};
use territorio_core::{Assignment, SessionSnapshot, User};

use super::Client;
use crate::config::ConfigLoader;

#[derive(Debug, Args)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Show the current session and what it may do
    Status,
    /// Sign in
    Login {
        /// Identity provider to sign in with
        #[arg(long, value_enum, default_value_t = ProviderArg::Password)]
        provider: ProviderArg,

        /// Username for password sign-in (prompted when omitted)
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Sign out and forget the stored token
    Logout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderArg {
    Google,
    Microsoft,
    Password,
}

pub async fn run(args: AuthArgs) -> Result<()> {
    let client = Client::new(ConfigLoader::load()?)?;
    match args.command {
        AuthCommand::Status => status(&client).await,
        AuthCommand::Login { provider, username } => login(&client, provider, username).await,
        AuthCommand::Logout => logout(&client).await,
    }
}

async fn status(client: &Client) -> Result<()> {
    let snapshot = client
        .session
        .bootstrap()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    println!("Backend:     {}", client.config.api_base_url);
    println!("Application: {}", client.config.application);
    println!("Token file:  {}", client.token_path.display());
    println!();

    let Some(user) = signed_in_user(&snapshot) else {
        println!("Status: Not signed in");
        return Ok(());
    };

    println!("Status: Signed in as {}", user_line(user));
    println!("Role:   {}", role_line(snapshot.assignment.as_ref()));
    if let Some(committee) = snapshot
        .assignment
        .as_ref()
        .and_then(Assignment::primary_committee)
    {
        println!(
            "Committee: {} (#{})",
            committee.name.as_deref().unwrap_or("unnamed"),
            committee.id
        );
    }
    println!();
    println!("Capabilities:");
    for line in capability_lines(client.session.policy(), &client.session.permissions()) {
        println!("  {}", line);
    }

    Ok(())
}

async fn login(client: &Client, provider: ProviderArg, username: Option<String>) -> Result<()> {
    let current = client
        .session
        .bootstrap()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    if let Some(user) = signed_in_user(&current) {
        println!(
            "Already signed in as {}. Run 'territorio auth logout' first.",
            user_line(user)
        );
        return Ok(());
    }

    let result = match provider {
        ProviderArg::Google => client.session.login(client.google.as_ref()).await,
        ProviderArg::Microsoft => client.session.login(client.microsoft.as_ref()).await,
        ProviderArg::Password => {
            let adapter = prompt_password(username)?;
            client.session.login(&adapter).await
        }
    };

    match result {
        Ok(LoginOutcome::Authenticated(snapshot)) => {
            if let Some(user) = &snapshot.user {
                println!(
                    "\n{} Signed in as {}",
                    style("✓").green().bold(),
                    user_line(user)
                );
            }
            println!("Role: {}", role_line(snapshot.assignment.as_ref()));
            Ok(())
        }
        Ok(LoginOutcome::Cancelled) => {
            println!("Sign-in cancelled.");
            Ok(())
        }
        Err(e) => bail!("{}", e.user_message()),
    }
}

async fn logout(client: &Client) -> Result<()> {
    client
        .session
        .logout()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    println!("Signed out.");
    Ok(())
}

fn prompt_password(username: Option<String>) -> Result<PasswordAdapter> {
    let theme = ColorfulTheme::default();
    let username = match username {
        Some(username) => username,
        None => Input::<String>::with_theme(&theme)
            .with_prompt("Username")
            .allow_empty(true)
            .interact_text()?,
    };
    let password = Password::with_theme(&theme)
        .with_prompt("Password")
        .allow_empty_password(true)
        .interact()?;
    Ok(PasswordAdapter::new(username, password))
}

fn signed_in_user(snapshot: &SessionSnapshot) -> Option<&User> {
    if snapshot.is_authenticated() {
        snapshot.user.as_ref()
    } else {
        None
    }
}

fn user_line(user: &User) -> String {
    if user.email.is_empty() {
        user.name.clone()
    } else {
        format!("{} <{}>", user.name, user.email)
    }
}

fn role_line(assignment: Option<&Assignment>) -> String {
    match assignment.and_then(|a| a.role) {
        Some(role) => role.to_string(),
        None => "none".to_string(),
    }
}

/// One line per capability the application's policy knows about.
fn capability_lines(policy: &AccessPolicy, permissions: &PermissionSet) -> Vec<String> {
    Capability::ALL
        .into_iter()
        .filter(|capability| policy.grant(*capability).is_some())
        .map(|capability| {
            let mark = if permissions.allows(capability) {
                "yes"
            } else {
                "no "
            };
            format!("[{}] {}", mark, capability)
        })
        .collect()
}
