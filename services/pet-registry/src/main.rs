//! Pet Registry CLI
//!
//! Command-line front end for the pet registry backend:
//! 1. Loads configuration (TOML file + environment overlay)
//! 2. Opens the token file; data commands drop an expired stored session first
//! 3. Runs one subcommand through the authenticated client
//! 4. Prints the result as JSON on stdout; logs go to stderr

mod commands;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use registry_api::RegistryApi;
use registry_auth::FileTokenStore;
use registry_client::AuthClient;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::Command;
use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "pet-registry")]
#[command(about = "Manage pets and tutors in the pet registry")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Initialize tracing on stderr with LOG_LEVEL / RUST_LOG support.
///
/// JSON output by default; LOG_FORMAT=compact for human-readable lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("compact")) {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let (config_path, explicit) = Config::resolve_path(cli.config.as_deref());
    let config = if explicit || config_path.exists() {
        info!(path = %config_path.display(), "loading configuration");
        Config::load(&config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?
    } else {
        debug!("no config file, using environment");
        Config::from_env().context("failed to load config from environment")?
    };

    let credentials = config.credentials();
    info!(
        base_url = %config.api.base_url,
        token_file = %config.auth.token_file.display(),
        fallback_login = credentials.is_some(),
        "configuration loaded"
    );

    let store = FileTokenStore::load(config.auth.token_file.clone())
        .await
        .with_context(|| {
            format!(
                "failed to open token file {}",
                config.auth.token_file.display()
            )
        })?;

    let http = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let client = AuthClient::new(http, config.client_settings(), Arc::new(store))
        .with_credentials(credentials);
    let api = RegistryApi::new(Arc::new(client));

    let output = cli.command.execute(&api).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_nested_subcommands() {
        let cli = Cli::try_parse_from([
            "pet-registry",
            "--config",
            "/etc/pet-registry.toml",
            "tutors",
            "link",
            "5",
            "1",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/pet-registry.toml")));
        assert!(matches!(
            cli.command,
            Command::Tutors(commands::TutorCommand::Link {
                tutor_id: 5,
                pet_id: 1
            })
        ));
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from([
            "pet-registry",
            "pets",
            "list",
            "--page",
            "2",
            "--config",
            "local.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("local.toml")));
        assert!(matches!(cli.command, Command::Pets(_)));
    }

    #[test]
    fn rejects_non_numeric_ids() {
        assert!(Cli::try_parse_from(["pet-registry", "pets", "get", "rex"]).is_err());
    }
}
