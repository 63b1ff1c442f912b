//! The foreign runtime's primitive table
//!
//! Everything the bridge needs from the object runtime itself, as opposed to
//! messages sent to its objects, goes through [`ForeignRuntime`]. Message
//! sends are not part of the trait: the runtime only names the address to
//! call, and the generic invoker performs the call.

pub mod objc;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use objc::ObjcRuntime;
#[cfg(any(test, feature = "sim"))]
pub use sim::SimRuntime;

use msgbridge_sdk::{NativeHandle, ResultShape, Scalar, Sel};

/// Primitive operations of a message-dispatch object runtime.
///
/// All handles are identities owned by the runtime. Methods returning a
/// handle return nil where the runtime does.
pub trait ForeignRuntime: Send + Sync {
    /// Short backend name for diagnostics
    fn name(&self) -> &'static str;

    /// Class by name; nil if the runtime has no such class
    fn class_named(&self, name: &str) -> NativeHandle;

    /// Intern a selector name
    fn register_selector(&self, name: &str) -> Sel;

    /// Name of an interned selector
    fn selector_name(&self, sel: Sel) -> Option<String>;

    /// Class of an object (the metaclass for a class object)
    fn object_class(&self, object: NativeHandle) -> NativeHandle;

    /// Superclass; nil for a root class
    fn superclass(&self, class: NativeHandle) -> NativeHandle;

    /// Address to call for a message send of `sel` to `receiver` with the
    /// given result shape. The callee receives `(receiver, sel, args...)`.
    fn dispatch_target(&self, receiver: NativeHandle, sel: Sel, shape: &ResultShape) -> usize;

    /// Implementation of `sel` on instances of `class`, for super-sends
    fn method_implementation(&self, class: NativeHandle, sel: Sel, shape: &ResultShape) -> usize;

    /// Allocate an unregistered class pair; nil if the name is taken
    fn allocate_class(&self, superclass: NativeHandle, name: &str) -> NativeHandle;

    /// Declare an instance variable on an unregistered class
    fn add_ivar(&self, class: NativeHandle, name: &str, scalar: Scalar, encoding: &str) -> bool;

    /// Add a method to a class
    fn add_method(&self, class: NativeHandle, sel: Sel, imp: usize, encoding: &str) -> bool;

    /// Make an allocated class pair instantiable
    fn register_class(&self, class: NativeHandle);

    /// Destroy an allocated class pair that was never registered
    fn dispose_class(&self, class: NativeHandle);

    /// Read a scalar instance variable, zero-extended
    fn read_ivar(&self, object: NativeHandle, name: &str, scalar: Scalar) -> u64;

    /// Write a scalar instance variable
    fn write_ivar(&self, object: NativeHandle, name: &str, scalar: Scalar, bits: u64);

    /// Value of an exported object constant (e.g. a pasteboard type string)
    fn constant(&self, name: &str) -> Option<NativeHandle>;
}
