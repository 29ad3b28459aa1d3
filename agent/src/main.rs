//! Host OS update agent - Entry Point
//!
//! Keeps one device on the recommended host OS release. Configured through
//! environment variables and an optional JSON settings file.

use std::collections::HashMap;
use std::env;

use anyhow::Context;

use hupagent::app::options::AppOptions;
use hupagent::app::run::run;
use hupagent::filesys::file::File;
use hupagent::logs::init_logging;
use hupagent::storage::layout::StorageLayout;
use hupagent::storage::settings::Settings;
use hupagent::utils::{format_duration, version_info};

use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Unable to render version info: {e}"),
        }
        return;
    }

    // Settings are fatal before the loop starts
    let options = match load_options(&cli_args).await {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{e:#}");
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(options.log.clone()) {
        eprintln!("Failed to initialize logging: {e}");
    }

    info!(
        "Running host OS update agent {} ({}) for device {}, checking every {}",
        version.version,
        version.git_hash,
        options.updater.device_uuid,
        format_duration(options.updater.check_interval)
    );

    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Failed to run the agent: {e}");
        std::process::exit(1);
    }
}

async fn load_options(cli_args: &HashMap<String, String>) -> anyhow::Result<AppOptions> {
    let layout = StorageLayout::default();

    // An explicit settings file must exist; the default one is optional
    let (settings_file, required) = match cli_args.get("settings") {
        Some(path) => (File::new(path), true),
        None => (layout.settings_file(), false),
    };

    let mut settings = Settings::load(&settings_file, required)
        .await
        .context("Unable to load settings")?;
    settings
        .apply_env(|key| env::var(key).ok())
        .context("Invalid environment configuration")?;
    let options = settings
        .into_options(&layout)
        .context("Invalid configuration")?;
    Ok(options)
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("SIGTERM received, shutting down...");
                    }
                    _ = sigint.recv() => {
                        info!("SIGINT received, shutting down...");
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Ctrl+C received, shutting down...");
                    }
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                error!("Unable to install signal handlers, falling back to Ctrl+C: {}", e);
            }
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Ctrl+C received, shutting down...");
}
