//! msgbridge SDK - Boundary types for the message-dispatch runtime bridge
//!
//! This crate holds the types that feature code and the engine agree on:
//! foreign handles, selectors, invocation arguments and results, struct
//! layouts, method type encodings, and recoverable errors. It contains no
//! foreign calls of its own.
//!
//! # Example
//!
//! ```ignore
//! use msgbridge_sdk::{Arg, NativeHandle, ResultShape};
//!
//! let array: NativeHandle = unsafe { bridge.send(array_class, sels.array, &[]) };
//! let count: u64 = unsafe { bridge.send(array, sels.count, &[]) };
//! ```

#![warn(missing_docs)]

pub mod convert;
pub mod encoding;
pub mod error;
pub mod types;
pub mod value;

pub use convert::{FromValue, NativeStruct};
pub use encoding::{EncodingError, MethodSignature, TypeCode};
pub use error::{BridgeError, BridgeResult};
pub use types::{
    Field, NSPoint, NSRect, NSSize, NativeHandle, RegisterClass, ResultShape, Scalar, Sel,
    StructLayout,
};
pub use value::{Arg, StructValue, Value};

/// `BOOL` YES as returned by the foreign runtime
pub const YES: u8 = 1;

/// `BOOL` NO as returned by the foreign runtime
pub const NO: u8 = 0;
