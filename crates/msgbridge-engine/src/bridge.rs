//! One-time initialization and the downward interface
//!
//! Start-up runs in two gated phases. The first builds the [`Bridge`]:
//! runtime primitives, well-known selectors, classes, and constants. The
//! second synthesizes the bridge's own classes, whose methods look the bridge
//! up through [`bridge()`] when they fire, so it can only run once the first
//! phase has published it.

use crate::class::{ClassRegistry, SynthesizedClass};
use crate::config::{Backend, BridgeOptions};
use crate::delegate::ApplicationHooks;
use crate::dispatch::MainThreadDispatcher;
use crate::invoke;
use crate::runtime::{ForeignRuntime, ObjcRuntime};
use crate::selectors::{SelectorCache, Selectors};
use msgbridge_sdk::{Arg, BridgeError, BridgeResult, FromValue, NativeHandle, ResultShape, Sel, Value};
use std::collections::HashMap;
use std::sync::{Arc, Once, OnceLock};

static BRIDGE: OnceLock<Bridge> = OnceLock::new();
static SYNTHESIS: Once = Once::new();

/// Classes resolved at start-up
pub(crate) struct WellKnownClasses {
    pub(crate) object: NativeHandle,
    pub(crate) autorelease_pool: NativeHandle,
    pub(crate) number: NativeHandle,
    pub(crate) array: NativeHandle,
    pub(crate) string: NativeHandle,
    pub(crate) thread: NativeHandle,
    pub(crate) tracking_area: NativeHandle,
    required: HashMap<String, NativeHandle>,
}

/// Data constants resolved at start-up
pub(crate) struct Constants {
    pub(crate) file_url_type: NativeHandle,
    pub(crate) default_run_loop_mode: NativeHandle,
}

/// Classes the bridge synthesizes for itself
pub(crate) struct Synthesized {
    pub(crate) callback: Arc<SynthesizedClass>,
    pub(crate) view: Arc<SynthesizedClass>,
    pub(crate) app_delegate: Arc<SynthesizedClass>,
}

/// The process-wide bridge to the foreign runtime.
///
/// Obtained from [`initialize`] or [`bridge()`]. Every path from host code
/// to the foreign runtime goes through its methods.
pub struct Bridge {
    pub(crate) options: BridgeOptions,
    pub(crate) runtime: Arc<dyn ForeignRuntime>,
    pub(crate) selectors: SelectorCache,
    pub(crate) sels: Selectors,
    pub(crate) classes: WellKnownClasses,
    pub(crate) constants: Constants,
    pub(crate) registry: Arc<ClassRegistry>,
    pub(crate) dispatcher: MainThreadDispatcher,
    pub(crate) hooks: ApplicationHooks,
    pub(crate) synthesized: OnceLock<Synthesized>,
}

impl Bridge {
    fn build(runtime: Arc<dyn ForeignRuntime>, options: BridgeOptions) -> Self {
        tracing::info!(backend = runtime.name(), prefix = %options.class_prefix, "initializing bridge");

        let selectors = SelectorCache::new();
        let sels = Selectors::register(&selectors, runtime.as_ref());

        let require = |name: &str| -> NativeHandle {
            match runtime.class_named(name).non_nil() {
                Some(class) => class,
                None => fatal!("required class {} not found", name),
            }
        };
        let classes = WellKnownClasses {
            object: require("NSObject"),
            autorelease_pool: require("NSAutoreleasePool"),
            number: require("NSNumber"),
            array: require("NSArray"),
            string: require("NSString"),
            thread: require("NSThread"),
            tracking_area: require("NSTrackingArea"),
            required: options
                .required_classes
                .iter()
                .map(|name| (name.clone(), require(name)))
                .collect(),
        };

        let constant = |name: &str| -> NativeHandle {
            match runtime.constant(name).and_then(NativeHandle::non_nil) {
                Some(value) => value,
                None => fatal!("required constant {} not found", name),
            }
        };
        let constants = Constants {
            file_url_type: constant("NSPasteboardTypeFileURL"),
            default_run_loop_mode: constant("NSDefaultRunLoopMode"),
        };

        tracing::debug!(
            selectors = selectors.len(),
            required = classes.required.len(),
            "resolved runtime primitives"
        );

        Self {
            hooks: ApplicationHooks::new(options.terminate_after_last_window_closed),
            options,
            runtime,
            selectors,
            sels,
            classes,
            constants,
            registry: Arc::new(ClassRegistry::new()),
            dispatcher: MainThreadDispatcher::new(),
            synthesized: OnceLock::new(),
        }
    }

    fn synthesize(&self) {
        let synthesized = Synthesized {
            callback: self.define_callback_class(),
            view: self.define_view_class(),
            app_delegate: self.define_app_delegate_class(),
        };
        if self.synthesized.set(synthesized).is_err() {
            fatal!("bridge classes synthesized twice");
        }
        tracing::info!(classes = self.registry.len(), "bridge ready");
    }

    pub(crate) fn synthesized(&self) -> &Synthesized {
        match self.synthesized.get() {
            Some(synthesized) => synthesized,
            None => fatal!("bridge classes are not synthesized yet"),
        }
    }

    /// Options the bridge was started with
    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    /// The foreign runtime's primitive table
    pub fn runtime(&self) -> &dyn ForeignRuntime {
        self.runtime.as_ref()
    }

    /// Well-known selectors
    pub fn sels(&self) -> &Selectors {
        &self.sels
    }

    /// A class listed in `required_classes`
    pub fn required_class(&self, name: &str) -> Option<NativeHandle> {
        self.classes.required.get(name).copied()
    }

    /// `NSDefaultRunLoopMode`
    pub fn default_run_loop_mode(&self) -> NativeHandle {
        self.constants.default_run_loop_mode
    }

    /// Send `sel` to `receiver`; see [`invoke::invoke`].
    ///
    /// # Safety
    ///
    /// `args` and `shape` must match the method's real signature.
    pub unsafe fn invoke(
        &self,
        receiver: NativeHandle,
        sel: Sel,
        args: &[Arg],
        shape: &ResultShape,
    ) -> Value {
        invoke::invoke(self.runtime.as_ref(), receiver, sel, args, shape)
    }

    /// Typed send; see [`invoke::send`].
    ///
    /// # Safety
    ///
    /// `args` and `R` must match the method's real signature.
    pub unsafe fn send<R: FromValue>(&self, receiver: NativeHandle, sel: Sel, args: &[Arg]) -> R {
        invoke::send(self.runtime.as_ref(), receiver, sel, args)
    }

    /// Send `sel` to the superclass implementation of `class`; see
    /// [`invoke::invoke_super`].
    ///
    /// # Safety
    ///
    /// `args` and `shape` must match the method's real signature.
    pub unsafe fn invoke_super(
        &self,
        receiver: NativeHandle,
        class: NativeHandle,
        sel: Sel,
        args: &[Arg],
        shape: &ResultShape,
    ) -> Value {
        invoke::invoke_super(self.runtime.as_ref(), receiver, class, sel, args, shape)
    }
}

/// Initialize with default options. Later calls return the same bridge.
pub fn initialize() -> &'static Bridge {
    initialize_with(BridgeOptions::default())
}

/// Initialize with `options`. Ignored if the bridge is already up.
pub fn initialize_with(options: BridgeOptions) -> &'static Bridge {
    if let Some(bridge) = BRIDGE.get() {
        if SYNTHESIS.is_completed() {
            return bridge;
        }
    }
    let runtime: Arc<dyn ForeignRuntime> = match options.backend {
        Backend::Objc => Arc::new(ObjcRuntime::load(&options.libraries)),
        Backend::Sim => sim_runtime(),
    };
    initialize_with_runtime(runtime, options)
}

#[cfg(any(test, feature = "sim"))]
fn sim_runtime() -> Arc<dyn ForeignRuntime> {
    crate::runtime::SimRuntime::global().clone()
}

#[cfg(not(any(test, feature = "sim")))]
fn sim_runtime() -> Arc<dyn ForeignRuntime> {
    fatal!("the sim backend requires the `sim` feature of msgbridge-engine")
}

/// Initialize against an already-constructed runtime
pub fn initialize_with_runtime(
    runtime: Arc<dyn ForeignRuntime>,
    options: BridgeOptions,
) -> &'static Bridge {
    let mut built = false;
    let bridge = BRIDGE.get_or_init(|| {
        built = true;
        Bridge::build(runtime, options)
    });
    if !built {
        tracing::debug!("bridge already initialized");
    }
    SYNTHESIS.call_once(|| bridge.synthesize());
    bridge
}

/// The initialized bridge. Fatal before [`initialize`].
pub fn bridge() -> &'static Bridge {
    match try_bridge() {
        Ok(bridge) => bridge,
        Err(e) => fatal!("{}", e),
    }
}

/// The initialized bridge, if any
pub fn try_bridge() -> BridgeResult<&'static Bridge> {
    match BRIDGE.get() {
        Some(bridge) if SYNTHESIS.is_completed() => Ok(bridge),
        _ => Err(BridgeError::NotInitialized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim_bridge() -> &'static Bridge {
        initialize_with(BridgeOptions::sim())
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let first = sim_bridge();
        let second = initialize_with(BridgeOptions::sim());
        assert!(std::ptr::eq(first, second));
        assert!(std::ptr::eq(first, bridge()));
        assert!(try_bridge().is_ok());
    }

    #[test]
    fn test_bridge_classes_are_published() {
        let bridge = sim_bridge();
        let view = bridge.options.class_name("View");
        assert_eq!(bridge.class_state(&view), crate::ClassState::Published);
        assert!(bridge.synthesized().view.has_method("windowShouldClose:"));
        assert!(bridge.synthesized().callback.has_method("invoke:"));
        assert!(!bridge.runtime().class_named(&view).is_nil());
    }

    #[test]
    fn test_constants_resolved() {
        let bridge = sim_bridge();
        let file_url = unsafe { bridge.string_from(bridge.constants.file_url_type) };
        assert_eq!(file_url, "public.file-url");
        assert!(!bridge.default_run_loop_mode().is_nil());
        assert_eq!(bridge.required_class("NSPasteboard"), None);
    }
}
