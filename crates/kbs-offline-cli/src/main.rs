//! kbs-offline - drive the KBS calculator's offline caching agent from a terminal.
//!
//! Uses an on-disk cache store and a real HTTP origin, so an `install`
//! followed by `fetch` with the origin down shows exactly what the app
//! would be served offline.

mod args;

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kbs_offline_core::{
    control, AgentConfig, AgentError, Capabilities, DiskStorage, HeadlessHost, HostEnvironment,
    HttpNetwork, LifecycleState, PwaStatus, ReadinessReporter, Registration, Request,
};

use args::{Cli, Command};

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    version: u32,
    state: Option<LifecycleState>,
    pwa: PwaStatus,
    offline_readiness: u8,
    ready_for_offline: bool,
    app_cached: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let cli = Cli::parse();
    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let network = Arc::new(HttpNetwork::new(&cli.origin)?);
    let mut config = AgentConfig::load()?.with_origin(network.origin().clone());
    if let Some(version) = cli.version {
        config = config.with_version(version);
    }

    let cache_dir = match cli.cache_dir {
        Some(dir) => dir,
        None => AgentConfig::cache_dir()?,
    };
    info!(origin = %cli.origin, cache_dir = %cache_dir.display(), version = config.version(), "Starting");

    let storage = Arc::new(DiskStorage::new(cache_dir).context("Failed to open cache directory")?);
    let host = Arc::new(HeadlessHost::new(HostEnvironment::default()));
    let registration = Arc::new(Registration::new(Capabilities::new(network, storage, host)));
    let reporter = ReadinessReporter::new(registration.clone(), config.clone());

    match cli.command {
        Command::Install => {
            let agent = registration
                .install(config)
                .await
                .context("Install failed; previous cache left untouched")?;
            println!(
                "Installed {} ({} assets), state: {}",
                agent.config().static_cache_name(),
                agent.config().critical_assets().len(),
                agent.state()
            );
        }
        Command::Fetch {
            url,
            destination,
            method,
        } => {
            adopt(&registration, &config).await?;
            let request = Request::new(&method, url.clone(), destination);
            let outcome = registration.fetch(&request).await;
            match outcome.response() {
                Some(response) => {
                    eprintln!("{} {} (from {})", response.status(), url, outcome.source());
                    io::stdout().write_all(response.body())?;
                    io::stdout().flush()?;
                }
                None => bail!("No response for {}: network unreachable and nothing cached", url),
            }
        }
        Command::Status => {
            adopt(&registration, &config).await?;
            let report = StatusReport {
                version: config.version(),
                state: registration.active().map(|agent| agent.state()),
                pwa: reporter.pwa_status(),
                offline_readiness: reporter.offline_readiness().await,
                ready_for_offline: reporter.is_ready_for_offline().await,
                app_cached: reporter.is_app_cached().await,
            };
            print_json(&report)?;
        }
        Command::Info => print_json(&reporter.cache_info().await)?,
        Command::Clear => {
            let deleted = reporter.clear_app_cache().await;
            println!("Deleted {} cache partition(s)", deleted);
        }
        Command::Message { json: raw } => {
            adopt(&registration, &config).await?;
            let (sender, listener) = control::channel(registration.clone());
            let handle = listener.spawn();
            let reply = sender.post_json(&raw).await?;
            drop(sender);
            handle.await.context("Control listener panicked")?;
            match reply {
                Some(reply) => print_json(&reply)?,
                None => println!("Message delivered"),
            }
        }
        Command::Sync { tag } => {
            adopt(&registration, &config).await?;
            if registration.sync(&tag).await {
                println!("Sync '{}' handled", tag);
            } else {
                println!("Sync '{}' ignored", tag);
            }
        }
        Command::Update => {
            reporter.force_update().await;
            println!("Update check requested");
        }
    }

    Ok(())
}

/// Put the installed version back in control, as a host does on restart.
/// A version that was never installed is not an error here: requests then
/// go straight to the network.
async fn adopt(registration: &Registration, config: &AgentConfig) -> Result<()> {
    match registration.adopt(config.clone()).await {
        Ok(_) => Ok(()),
        Err(AgentError::NotInstalled(name)) => {
            warn!(partition = %name, "Version not installed, requests go to the network");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
