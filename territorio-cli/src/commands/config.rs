use crate::config::{API_BASE_ENV, ConfigLoader};
use anyhow::Result;
use clap::{Args, Subcommand};
use territorio_core::FileTokenStore;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration (merged)
    Show,
    /// Show configuration and session file paths
    Path,
}

pub fn run(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show => show_config(),
        ConfigCommands::Path => show_paths(),
    }
}

fn show_config() -> Result<()> {
    let config = ConfigLoader::load()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{}", toml_str);
    Ok(())
}

fn show_paths() -> Result<()> {
    let config = ConfigLoader::load()?;
    println!("User config:    {:?}", ConfigLoader::user_config_path());
    println!("Project config: {:?}", ConfigLoader::project_config_path());
    println!("Sessions dir:   {:?}", territorio_paths::sessions_dir());
    if let Ok(base) = config.api_base() {
        println!(
            "Token file:     {:?}",
            FileTokenStore::default_for(&base).path()
        );
    }
    if std::env::var(API_BASE_ENV).is_ok() {
        println!("Backend URL overridden by {}", API_BASE_ENV);
    }
    Ok(())
}
