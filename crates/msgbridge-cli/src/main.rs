//! `msgbridge` binary entry point

use clap::{Parser, Subcommand};
use msgbridge_cli::{commands, parse_backend};
use msgbridge_engine::Backend;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "msgbridge")]
#[command(about = "Message-dispatch runtime bridge", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version, platform, and default backend
    Info,

    /// Initialize the bridge and report what it resolved
    Probe {
        /// Configuration file (msgbridge.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override the configured backend
        #[arg(short, long, value_parser = parse_backend)]
        backend: Option<Backend>,
        /// Extra classes to resolve
        #[arg(long = "class")]
        classes: Vec<String>,
    },

    /// Run the end-to-end scenario against a backend
    Selftest {
        /// Configuration file (msgbridge.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override the configured backend
        #[arg(short, long, value_parser = parse_backend)]
        backend: Option<Backend>,
        /// Worker threads posting to the main thread
        #[arg(short, long, default_value_t = 8)]
        threads: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("MSGBRIDGE_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info => commands::info::execute(),
        Commands::Probe {
            config,
            backend,
            classes,
        } => commands::probe::execute(config, backend, classes),
        Commands::Selftest {
            config,
            backend,
            threads,
        } => commands::selftest::execute(config, backend, threads),
    }
}
