//! `msgbridge info` - Display version and platform info.

use msgbridge_engine::{Backend, BridgeOptions};

pub fn execute() -> anyhow::Result<()> {
    let defaults = BridgeOptions::default();

    println!("msgbridge v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Platform:     {} ({})", std::env::consts::OS, std::env::consts::ARCH);
    println!("Backend:      {} (default)", Backend::default());
    println!("Class prefix: {}", defaults.class_prefix);
    println!("Libraries:");
    for library in &defaults.libraries {
        println!("  {:<13} {}", library.name, library.path);
    }

    println!();
    println!("Environment:");
    match std::env::var("MSGBRIDGE_LOG") {
        Ok(value) => println!("  MSGBRIDGE_LOG = {}", value),
        Err(_) => println!("  MSGBRIDGE_LOG = (default)"),
    }

    Ok(())
}
