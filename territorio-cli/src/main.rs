use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod prompt;

#[derive(Parser)]
#[command(name = "territorio", about = "Sign in and browse the territorial organization")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in, sign out and inspect the current session
    Auth(commands::auth::AuthArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
    /// Show the administrative tree
    Tree(commands::tree::TreeArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Auth(args) => commands::auth::run(args).await,
        Commands::Config(args) => commands::config::run(args),
        Commands::Tree(args) => commands::tree::run(args).await,
    }
}
