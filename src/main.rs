// Main entry point for the ambient loop player
// Loads config and the track catalog, then hands over to the TUI.

mod config;
mod logging;
mod player;
mod ui;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing::warn;

use config::AppConfig;
use player::catalog::Catalog;
use player::output::RodioOutput;
use player::selection::ExitReason;
use ui::app::AmbientApp;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(ExitReason::Quit) => ExitCode::SUCCESS,
        Ok(ExitReason::Fatal(e)) => {
            eprintln!("Alas, there's been an error: {e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Alas, there's been an error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<ExitReason> {
    // Suppress ALSA error messages that pollute TUI
    std::env::set_var("ALSA_PCM_NO_MMAP", "1");

    // Optional first argument: path to a config file
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;

    if let Some(log_path) = config.log_path() {
        // Not worth refusing to start over
        if let Err(e) = logging::init(&log_path) {
            eprintln!("warning: logging disabled: {e:#}");
        }
    }

    let catalog = config.catalog().context("invalid track catalog")?;
    tracing::info!(
        tracks = catalog.len(),
        policy = ?config.error_policy,
        "starting ambient loop player"
    );

    warn_missing_assets(&catalog);

    let mut app = AmbientApp::new(catalog, config.error_policy, Arc::new(RodioOutput));
    app.run().await
}

// Missing assets are not fatal at startup; selecting one reports a
// Resource error like any other failed session.
fn warn_missing_assets(catalog: &Catalog) {
    for entry in catalog.entries() {
        match catalog.resolve(&entry.name) {
            Ok(key) if !std::path::Path::new(key).is_file() => {
                warn!(track = %entry.name, key, "asset not found");
            }
            Ok(_) => {}
            Err(e) => warn!("{e}"),
        }
    }
}
