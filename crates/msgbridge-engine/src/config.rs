//! Bridge configuration (msgbridge.toml)
//!
//! Every field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Which foreign runtime the bridge talks to
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The platform Objective-C runtime, loaded with dlopen
    #[default]
    Objc,
    /// The in-process headless runtime; needs the `sim` feature
    Sim,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Objc => write!(f, "objc"),
            Backend::Sim => write!(f, "sim"),
        }
    }
}

/// A shared library loaded at start-up
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LibrarySpec {
    /// Short name used in logs and symbol lookups (e.g. "objc")
    pub name: String,
    /// Path passed to the dynamic loader
    pub path: String,
}

impl LibrarySpec {
    /// Create a library spec
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Bridge start-up options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeOptions {
    /// Runtime backend
    #[serde(default)]
    pub backend: Backend,

    /// Prefix for synthesized class names
    #[serde(default = "default_class_prefix")]
    pub class_prefix: String,

    /// Superclass of the synthesized view class
    #[serde(default = "default_view_superclass")]
    pub view_superclass: String,

    /// Extra classes resolved at start-up; a missing one is fatal
    #[serde(default)]
    pub required_classes: Vec<String>,

    /// Initial answer to "terminate after last window closed"
    #[serde(default = "default_true")]
    pub terminate_after_last_window_closed: bool,

    /// Libraries loaded by the objc backend, in order
    #[serde(default = "default_libraries")]
    pub libraries: Vec<LibrarySpec>,
}

fn default_libraries() -> Vec<LibrarySpec> {
    const FRAMEWORKS: &str = "/System/Library/Frameworks";
    vec![
        LibrarySpec::new("objc", "/usr/lib/libobjc.A.dylib"),
        LibrarySpec::new("Foundation", format!("{FRAMEWORKS}/Foundation.framework/Foundation")),
        LibrarySpec::new("AppKit", format!("{FRAMEWORKS}/AppKit.framework/AppKit")),
        LibrarySpec::new(
            "CoreGraphics",
            format!("{FRAMEWORKS}/CoreGraphics.framework/CoreGraphics"),
        ),
        LibrarySpec::new("CoreVideo", format!("{FRAMEWORKS}/CoreVideo.framework/CoreVideo")),
        LibrarySpec::new("IOKit", format!("{FRAMEWORKS}/IOKit.framework/IOKit")),
    ]
}

fn default_class_prefix() -> String {
    "MsgBridge".to_string()
}

fn default_view_superclass() -> String {
    "NSView".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            class_prefix: default_class_prefix(),
            view_superclass: default_view_superclass(),
            required_classes: Vec::new(),
            terminate_after_last_window_closed: true,
            libraries: default_libraries(),
        }
    }
}

impl BridgeOptions {
    /// Defaults with the headless runtime selected
    pub fn sim() -> Self {
        Self {
            backend: Backend::Sim,
            ..Self::default()
        }
    }

    /// Load options from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse options from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Name of a synthesized class, e.g. `MsgBridgeView`
    pub fn class_name(&self, suffix: &str) -> String {
        format!("{}{}", self.class_prefix, suffix)
    }
}
