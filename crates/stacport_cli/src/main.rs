//! Stacport CLI - serves a STAC API generated from GitLab projects.

mod commands;
mod config;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::check::OutputFormat;

#[derive(Parser)]
#[command(name = "stacport")]
#[command(version)]
#[command(about = "A STAC API on top of GitLab")]
#[command(
    long_about = "Stacport exposes the projects of a GitLab instance as a STAC catalog. \
Projects are grouped into collections by topic, searched through GitLab's GraphQL API \
with the caller's own token, and translated on the fly; nothing is stored."
)]
#[command(after_long_help = r#"EXAMPLES
    Check the configuration and list collections:
        $ stacport check

    Serve on a custom port with an explicit config file:
        $ stacport --config /etc/stacport.toml serve --port 9000

CONFIGURATION
    Stacport reads configuration from:
      1. ~/.config/stacport/config.toml (or $XDG_CONFIG_HOME/stacport/config.toml)
      2. ./stacport.toml
      3. The file given with --config
      4. Environment variables (STACPORT_* prefix, nested keys joined with __)
      5. .env file in current directory

ENVIRONMENT VARIABLES
    STACPORT_GITLAB__URL              GitLab instance URL (required)
    STACPORT_GITLAB__DEFAULT_TOKEN    Token used when a request carries none
    STACPORT_SERVER__PORT             Listening port (default: 8000)
    STACPORT_SERVER__PREFIX           Path prefix of the API
    STACPORT_SERVER__ALLOWED_ORIGINS  Comma-separated CORS origins
    RUST_LOG                          Log filter (default: stacport=info)
"#)]
struct Cli {
    /// Configuration file, layered over the default locations
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the STAC API
    Serve {
        /// Address to bind (default from config or 0.0.0.0)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to listen on (default from config or 8000)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Validate the configuration and list collections
    Check {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration (config files -> env vars -> defaults)
    let (config, load_error) = match config::Config::load(cli.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => (config::Config::default(), Some(e)),
    };

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(config.log_filter()),
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    if let Some(e) = load_error {
        tracing::warn!(error = %e, "invalid configuration, using defaults");
    }

    match cli.command {
        Commands::Serve { host, port } => {
            commands::serve::handle_serve(&config, host, port).await?;
        }
        Commands::Check { output } => {
            commands::check::handle_check(&config, output)?;
        }
    }

    Ok(())
}
