//! Command-line arguments.

use std::convert::Infallible;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kbs_offline_core::agent::BACKGROUND_SYNC_TAG;
use kbs_offline_core::Destination;

/// Origin used when neither `--origin` nor the environment sets one
const DEFAULT_ORIGIN: &str = "http://localhost:5173";

/// Drive the KBS calculator's offline caching agent from a terminal
#[derive(Debug, Parser)]
#[command(name = "kbs-offline")]
pub struct Cli {
    /// Origin to fetch from
    #[arg(long, global = true, env = "KBS_OFFLINE_ORIGIN", default_value = DEFAULT_ORIGIN)]
    pub origin: String,

    /// Cache version to operate on
    #[arg(long, global = true)]
    pub version: Option<u32>,

    /// Cache directory (default: user cache dir)
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Cache the critical assets and activate this version
    Install,
    /// Request a URL through the agent and print the body
    Fetch {
        url: String,
        /// Resource kind: document, script, style, image, other
        #[arg(long = "as", default_value = "other", value_parser = parse_destination)]
        destination: Destination,
        #[arg(long, default_value = "GET")]
        method: String,
    },
    /// Print install and offline readiness status
    Status,
    /// List cache partitions and their entry counts
    Info,
    /// Delete every cache partition
    Clear,
    /// Send a control message, e.g. '{"type":"GET_CACHE_INFO"}'
    Message { json: String },
    /// Fire a background sync event
    Sync {
        #[arg(default_value = BACKGROUND_SYNC_TAG)]
        tag: String,
    },
    /// Ask for a check for a newer version
    Update,
}

fn parse_destination(s: &str) -> Result<Destination, Infallible> {
    s.parse()
}
