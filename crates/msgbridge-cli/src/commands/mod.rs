//! CLI command implementations

pub mod info;
pub mod probe;
pub mod selftest;

use anyhow::Context;
use msgbridge_engine::{Backend, BridgeOptions};
use std::path::{Path, PathBuf};

/// Options from `config` (or `./msgbridge.toml` if present), with the
/// backend override applied
pub fn load_options(config: Option<PathBuf>, backend: Option<Backend>) -> anyhow::Result<BridgeOptions> {
    let mut options = match config {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading configuration");
            BridgeOptions::from_file(&path)
                .with_context(|| format!("loading {}", path.display()))?
        }
        None if Path::new("msgbridge.toml").exists() => {
            tracing::debug!("loading ./msgbridge.toml");
            BridgeOptions::from_file(Path::new("msgbridge.toml"))
                .context("loading msgbridge.toml")?
        }
        None => BridgeOptions::default(),
    };
    if let Some(backend) = backend {
        tracing::debug!(%backend, "backend overridden on the command line");
        options.backend = backend;
    }
    Ok(options)
}
