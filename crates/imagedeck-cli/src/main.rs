//! imagedeck - a terminal client for DRBL/Clonezilla imaging servers.
//!
//! Logs in, keeps the session fresh while work is running, and drives the
//! multi-step restart / create / restore / save / reconfigure workflows.

mod cli;
mod commands;
mod logging;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use imagedeck_core::auth::SessionStore;
use imagedeck_core::{ApiClient, Config};
use tracing::info;

use cli::{Cli, Commands};
use commands::App;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load()?.with_env()?;
    if let Some(url) = cli.url.clone() {
        config.base_url = url;
    }
    if let Some(secs) = cli.timeout {
        config.request_timeout_secs = secs;
    }

    let log_handle = logging::init_logging(&config, cli.debug)?;
    info!(server = %config.base_url, "imagedeck starting");
    if cli.debug {
        if let Some(ref path) = log_handle.log_file_path {
            eprintln!("Logging to {}", path.display());
        }
    }

    let api = ApiClient::new(&config.base_url)
        .context("Failed to create HTTP client")?
        .with_timeout(config.request_timeout());
    let session = Arc::new(SessionStore::init(config.session_path()?));
    let mut app = App {
        config,
        api,
        session,
    };

    match cli.command {
        Commands::Login(args) => commands::login(&mut app, args).await,
        Commands::Logout(args) => commands::logout(&app, args).await,
        Commands::Signup(args) => commands::signup(&app, args).await,
        Commands::Status => commands::status(&app),
        Commands::Images(args) => commands::images(&app, args).await,
        Commands::Restart => commands::restart(&app).await,
        Commands::CreateImage => commands::create_image(&app).await,
        Commands::RestoreImage(args) => commands::restore_image(&app, args).await,
        Commands::SaveImage(args) => commands::save_image(&app, args).await,
        Commands::ApplyConfig(args) => commands::apply_config(&app, args).await,
    }
}
