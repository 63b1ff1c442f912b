//! Runtime class synthesis
//!
//! New foreign classes are defined at start-up with a [`ClassBuilder`]: allocate
//! the class pair, declare storage slots, install host closures as methods,
//! then publish. Publishing consumes the builder, so a published class cannot
//! grow methods afterwards.
//!
//! ```text
//! Unregistered --define_class--> Defining --publish--> Published
//!                                     |
//!                                     +--drop--> Unregistered
//! ```
//!
//! A class name can be published once per process; a builder dropped before
//! publishing gives its name back. The published class keeps
//! its method trampolines alive for the rest of the process.

mod trampoline;

pub use trampoline::{MethodCall, MethodFn};

use crate::bridge::Bridge;
use crate::handles::{handles, HandleId};
use crate::runtime::ForeignRuntime;
use crate::selectors::Selectors;
use msgbridge_sdk::encoding::parse_types;
use msgbridge_sdk::{
    BridgeError, BridgeResult, Field, MethodSignature, NativeHandle, Scalar, Value,
};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use trampoline::Trampoline;

/// Name of the slot that binds an instance to its host value
pub const HANDLE_SLOT: &str = "hostHandle";

/// Lifecycle of a class name within this process.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClassState {
    /// Never defined
    Unregistered,
    /// Allocated, still accepting slots and methods
    Defining,
    /// Registered with the runtime and instantiable
    Published,
}

enum Entry {
    Defining,
    Published(Arc<SynthesizedClass>),
}

/// Every class defined through the bridge, by name
#[derive(Default)]
pub(crate) struct ClassRegistry {
    classes: RwLock<HashMap<String, Entry>>,
}

impl ClassRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn state(&self, name: &str) -> ClassState {
        match self.classes.read().get(name) {
            None => ClassState::Unregistered,
            Some(Entry::Defining) => ClassState::Defining,
            Some(Entry::Published(_)) => ClassState::Published,
        }
    }

    /// Claim `name` for definition; false if it was already claimed
    fn begin(&self, name: &str) -> bool {
        let mut classes = self.classes.write();
        if classes.contains_key(name) {
            return false;
        }
        classes.insert(name.to_string(), Entry::Defining);
        true
    }

    /// Release a name whose definition was abandoned
    fn abandon(&self, name: &str) {
        let mut classes = self.classes.write();
        if matches!(classes.get(name), Some(Entry::Defining)) {
            classes.remove(name);
        }
    }

    fn publish(&self, class: Arc<SynthesizedClass>) {
        self.classes
            .write()
            .insert(class.name.clone(), Entry::Published(class));
    }

    pub(crate) fn published(&self, name: &str) -> Option<Arc<SynthesizedClass>> {
        match self.classes.read().get(name) {
            Some(Entry::Published(class)) => Some(Arc::clone(class)),
            _ => None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.classes.read().len()
    }
}

/// A class in the `Defining` state.
///
/// Dropping a builder without publishing disposes the class pair and returns
/// the name to `Unregistered`.
#[must_use = "a class that is never published cannot be instantiated"]
pub struct ClassBuilder {
    runtime: Arc<dyn ForeignRuntime>,
    registry: Arc<ClassRegistry>,
    sels: Selectors,
    name: String,
    class: NativeHandle,
    slots: Vec<(String, Scalar)>,
    methods: HashMap<String, Trampoline>,
    published: bool,
}

impl ClassBuilder {
    /// Handle of the class being defined
    pub fn handle(&self) -> NativeHandle {
        self.class
    }

    /// Declare a scalar or object storage slot with a one-type encoding
    /// such as `"Q"` or `"@"`.
    pub fn add_slot(mut self, name: &str, encoding: &str) -> Self {
        let scalar = match parse_types(encoding).as_deref() {
            Ok([code]) => match code.field() {
                Some(Field::Scalar(scalar)) => scalar,
                _ => fatal!("slot {}.{} must be a scalar, got '{}'", self.name, name, encoding),
            },
            Ok(_) => fatal!("slot {}.{} needs exactly one type, got '{}'", self.name, name, encoding),
            Err(e) => fatal!("slot {}.{}: {}", self.name, name, e),
        };
        if !self.runtime.add_ivar(self.class, name, scalar, encoding) {
            fatal!("failed to add slot {} to class {}", name, self.name);
        }
        tracing::debug!(class = %self.name, slot = name, encoding, "added slot");
        self.slots.push((name.to_string(), scalar));
        self
    }

    /// Declare the slot that holds a [`HandleId`]
    pub fn add_handle_slot(self) -> Self {
        self.add_slot(HANDLE_SLOT, "Q")
    }

    /// Install `body` as the implementation of `selector`.
    ///
    /// `encoding` is the method's full type encoding, receiver and selector
    /// included (e.g. `"B@:@"`). The closure receives the decoded arguments
    /// and its result is converted back to the declared return type.
    pub fn add_method<F>(mut self, selector: &str, encoding: &str, body: F) -> Self
    where
        F: Fn(&MethodCall) -> Value + Send + Sync + 'static,
    {
        if self.methods.contains_key(selector) {
            fatal!("method {} added twice to class {}", selector, self.name);
        }
        let signature = match MethodSignature::parse(encoding) {
            Ok(signature) => signature,
            Err(e) => fatal!("method {}.{}: {}", self.name, selector, e),
        };
        let expected_args = selector.matches(':').count();
        if signature.explicit_args().len() != expected_args {
            fatal!(
                "encoding '{}' declares {} arguments but {} takes {}",
                encoding,
                signature.explicit_args().len(),
                selector,
                expected_args
            );
        }

        let trampoline = Trampoline::new(&self.name, self.class, selector, signature, Box::new(body));
        let sel = self.runtime.register_selector(selector);
        if !self.runtime.add_method(self.class, sel, trampoline.code(), encoding) {
            fatal!("failed to add method {} to class {}", selector, self.name);
        }
        tracing::debug!(class = %self.name, selector, encoding, "added method");
        self.methods.insert(selector.to_string(), trampoline);
        self
    }

    /// Register the class with the runtime and make it instantiable
    pub fn publish(mut self) -> Arc<SynthesizedClass> {
        self.runtime.register_class(self.class);
        self.published = true;
        let handle_slot = self
            .slots
            .iter()
            .any(|(name, _)| name == HANDLE_SLOT);
        let class = Arc::new(SynthesizedClass {
            runtime: Arc::clone(&self.runtime),
            sels: self.sels,
            name: std::mem::take(&mut self.name),
            class: self.class,
            slots: std::mem::take(&mut self.slots),
            handle_slot,
            methods: std::mem::take(&mut self.methods),
        });
        self.registry.publish(Arc::clone(&class));
        tracing::info!(
            class = %class.name,
            methods = class.methods.len(),
            slots = class.slots.len(),
            "published class"
        );
        class
    }
}

impl Drop for ClassBuilder {
    fn drop(&mut self) {
        if self.published {
            return;
        }
        self.runtime.dispose_class(self.class);
        self.registry.abandon(&self.name);
        tracing::debug!(class = %self.name, "abandoned class definition");
    }
}

/// A published class whose methods are host closures.
pub struct SynthesizedClass {
    runtime: Arc<dyn ForeignRuntime>,
    sels: Selectors,
    name: String,
    class: NativeHandle,
    slots: Vec<(String, Scalar)>,
    handle_slot: bool,
    methods: HashMap<String, Trampoline>,
}

impl std::fmt::Debug for SynthesizedClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesizedClass")
            .field("name", &self.name)
            .field("class", &self.class)
            .field("slots", &self.slots)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SynthesizedClass {
    /// Runtime class handle
    pub fn handle(&self) -> NativeHandle {
        self.class
    }

    /// Class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if `selector` was installed on this class
    pub fn has_method(&self, selector: &str) -> bool {
        self.methods.contains_key(selector)
    }

    /// Type encoding `selector` was installed with
    pub fn method_encoding(&self, selector: &str) -> Option<&str> {
        self.methods.get(selector).map(|t| t.encoding())
    }

    /// `[[Class alloc] init]`; the caller owns the new instance
    pub fn instantiate(&self) -> BridgeResult<NativeHandle> {
        let runtime = self.runtime.as_ref();
        // SAFETY: alloc and init are `@@:` on every class
        let instance = unsafe {
            let allocated: NativeHandle =
                crate::invoke::send(runtime, self.class, self.sels.alloc, &[]);
            crate::invoke::send::<NativeHandle>(runtime, allocated, self.sels.init, &[])
        };
        instance
            .non_nil()
            .ok_or_else(|| BridgeError::nil(format!("[[{} alloc] init]", self.name)))
    }

    fn require_handle_slot(&self) {
        if !self.handle_slot {
            fatal!("class {} has no handle slot", self.name);
        }
    }

    /// Bind `instance` to a handle table entry, or clear the binding
    ///
    /// # Safety
    ///
    /// `instance` must be a live instance of this class or a subclass.
    pub unsafe fn set_handle(&self, instance: NativeHandle, id: Option<HandleId>) {
        self.require_handle_slot();
        let raw = id.map(HandleId::as_raw).unwrap_or(0);
        self.runtime
            .write_ivar(instance, HANDLE_SLOT, Scalar::U64, raw);
    }

    /// Handle table entry bound to `instance`; `None` for an empty slot or nil
    ///
    /// # Safety
    ///
    /// `instance` must be nil or a live instance of this class or a subclass.
    pub unsafe fn handle_of(&self, instance: NativeHandle) -> Option<HandleId> {
        self.require_handle_slot();
        if instance.is_nil() {
            return None;
        }
        HandleId::from_raw(self.runtime.read_ivar(instance, HANDLE_SLOT, Scalar::U64))
    }

    /// Host value bound to `instance`, if the slot is set, the entry is still
    /// live, and it holds a `T`
    ///
    /// # Safety
    ///
    /// As for [`SynthesizedClass::handle_of`].
    pub unsafe fn delegate<T: Any + Send + Sync>(&self, instance: NativeHandle) -> Option<Arc<T>> {
        let id = self.handle_of(instance)?;
        handles().lookup_as::<T>(id)
    }
}

impl Bridge {
    /// Start defining a new class. Fatal if the name was already defined in
    /// this process or exists in the foreign runtime.
    pub fn define_class(&self, name: &str, superclass: NativeHandle) -> ClassBuilder {
        if superclass.is_nil() {
            fatal!("class {} needs a superclass", name);
        }
        if !self.registry.begin(name) {
            fatal!("class {} is already defined", name);
        }
        if !self.runtime.class_named(name).is_nil() {
            self.registry.abandon(name);
            fatal!("class {} already exists in the runtime", name);
        }
        let class = self.runtime.allocate_class(superclass, name);
        if class.is_nil() {
            self.registry.abandon(name);
            fatal!("failed to allocate class {}", name);
        }
        tracing::debug!(class = name, superclass = %superclass, "defining class");
        ClassBuilder {
            runtime: Arc::clone(&self.runtime),
            registry: Arc::clone(&self.registry),
            sels: self.sels,
            name: name.to_string(),
            class,
            slots: Vec::new(),
            methods: HashMap::new(),
            published: false,
        }
    }

    /// Lifecycle state of `name`
    pub fn class_state(&self, name: &str) -> ClassState {
        self.registry.state(name)
    }

    /// A class published through [`Bridge::define_class`]
    pub fn synthesized_class(&self, name: &str) -> Option<Arc<SynthesizedClass>> {
        self.registry.published(name)
    }
}
