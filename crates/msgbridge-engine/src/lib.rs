//! msgbridge engine
//!
//! Bridges host code to a reference-counted, message-dispatch object runtime
//! without generated bindings. Classes, selectors, and function addresses are
//! resolved at start-up and every call goes through one generic invoker.
//!
//! # Architecture
//!
//! - [`loader`]: shared library loading and symbol resolution
//! - [`runtime`]: the primitive table of the foreign runtime, with a platform
//!   backend and, behind the `sim` feature, an in-process simulated backend
//! - [`invoke`]: the generic invoker
//! - [`handles`]: integer handles for host-owned values
//! - [`class`]: runtime class synthesis with host closures as methods
//! - [`dispatch`]: marshalling closures onto the runtime's main thread
//! - [`scope`]: autorelease-pool lifetime scopes
//! - [`delegate`] and [`events`]: the upward (foreign to host) interface
//! - [`bridge`]: one-time initialization and the downward interface
//!
//! # Example
//!
//! ```ignore
//! use msgbridge_engine::{initialize, BridgeOptions};
//!
//! let bridge = initialize();
//! let count = bridge.run_on_main(|| {
//!     let bridge = msgbridge_engine::bridge();
//!     let array = bridge.empty_array();
//!     unsafe { bridge.send::<u64>(array, bridge.sels().count, &[]) }
//! });
//! assert_eq!(count, 0);
//! ```

#![warn(missing_docs)]

/// Log and abort on a setup or binding defect.
///
/// Panics after logging; the release profile turns that into an immediate
/// process abort.
macro_rules! fatal {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);
        tracing::error!(target: "msgbridge::fatal", "{}", message);
        panic!("msgbridge: {}", message)
    }};
}

pub mod bridge;
pub mod class;
pub mod config;
pub mod delegate;
pub mod dispatch;
pub mod events;
pub mod foundation;
pub mod handles;
pub mod invoke;
pub mod loader;
pub mod runtime;
pub mod scope;
pub mod selectors;

pub use bridge::{bridge, initialize, initialize_with, initialize_with_runtime, try_bridge, Bridge};
pub use class::{ClassBuilder, ClassState, MethodCall, SynthesizedClass};
pub use config::{Backend, BridgeOptions, ConfigError, LibrarySpec};
pub use delegate::{ApplicationHooks, WindowDelegate};
pub use handles::{handles, HandleId, HandleTable};
pub use loader::{Library, LoadError, SymbolResolver};
pub use runtime::ForeignRuntime;
pub use scope::LifetimeScope;
pub use selectors::{SelectorCache, Selectors};

pub use msgbridge_sdk::{
    Arg, BridgeError, BridgeResult, FromValue, MethodSignature, NSPoint, NSRect, NSSize,
    NativeHandle, NativeStruct, ResultShape, Scalar, Sel, StructLayout, Value,
};
