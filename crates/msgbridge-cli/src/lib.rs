//! msgbridge command-line tool
//!
//! Inspects the bridge configuration, probes a runtime backend, and runs the
//! end-to-end self-test against it. The binary in `main.rs` only parses
//! arguments and installs the log subscriber.

pub mod commands;

use msgbridge_engine::Backend;

/// Parse a `--backend` value
pub fn parse_backend(value: &str) -> Result<Backend, String> {
    match value {
        "objc" => Ok(Backend::Objc),
        "sim" => Ok(Backend::Sim),
        other => Err(format!("unknown backend '{}' (expected objc or sim)", other)),
    }
}
