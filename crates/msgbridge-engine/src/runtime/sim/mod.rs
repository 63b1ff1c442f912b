//! Headless simulated runtime
//!
//! An in-process message-dispatch object runtime with reference-counted
//! objects, classes whose methods are plain C function addresses, dynamic
//! class pairs with instance variables, thread-local autorelease pools, and a
//! dedicated main thread. It is reached through the same [`ForeignRuntime`]
//! seam and the same libffi invoker as the platform runtime, so everything
//! above the seam runs unchanged on hosts without one.

mod builtins;
mod object;

pub use object::SimEvent;

use super::ForeignRuntime;
use crossbeam::channel::{self, Receiver, Sender};
use dashmap::DashMap;
use msgbridge_sdk::{NativeHandle, ResultShape, Scalar, Sel};
use object::{Kind, Payload, SimClass, SimObject};
use parking_lot::RwLock;
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::ThreadId;

type Job = Box<dyn FnOnce() + Send>;

/// Address handed out to the first object or class
const FIRST_ADDRESS: usize = 0x10_0000;
/// Distance between consecutive addresses
const ADDRESS_STRIDE: usize = 0x10;

/// Pasteboard type for file URLs
pub const FILE_URL_TYPE: &str = "public.file-url";

#[derive(Default)]
struct SimState {
    classes: HashMap<usize, SimClass>,
    class_names: HashMap<String, usize>,
    objects: HashMap<usize, Arc<SimObject>>,
}

struct PoolFrame {
    pool: usize,
    objects: Vec<usize>,
}

thread_local! {
    static POOLS: RefCell<Vec<PoolFrame>> = const { RefCell::new(Vec::new()) };
}

/// The simulated runtime
pub struct SimRuntime {
    state: RwLock<SimState>,
    next_address: AtomicUsize,
    selectors: DashMap<String, usize>,
    selector_names: DashMap<usize, String>,
    constants: DashMap<String, usize>,
    jobs: Sender<Job>,
    main_thread: ThreadId,
}

static SIM: OnceLock<Arc<SimRuntime>> = OnceLock::new();

impl SimRuntime {
    /// The process-wide simulated runtime, started on first use
    pub fn global() -> &'static Arc<SimRuntime> {
        SIM.get_or_init(|| Arc::new(SimRuntime::start()))
    }

    fn start() -> Self {
        let (jobs, receiver) = channel::unbounded::<Job>();
        let main = std::thread::Builder::new()
            .name("sim-main".to_string())
            .spawn(move || main_loop(receiver));
        let main_thread = match main {
            Ok(handle) => handle.thread().id(),
            Err(e) => fatal!("failed to start simulated main thread: {}", e),
        };

        let runtime = SimRuntime {
            state: RwLock::new(SimState::default()),
            next_address: AtomicUsize::new(FIRST_ADDRESS),
            selectors: DashMap::new(),
            selector_names: DashMap::new(),
            constants: DashMap::new(),
            jobs,
            main_thread,
        };
        builtins::install(&runtime);
        runtime.install_constants();
        tracing::info!(classes = runtime.state.read().classes.len(), "started simulated runtime");
        runtime
    }

    fn install_constants(&self) {
        for (name, text) in [
            ("NSPasteboardTypeFileURL", FILE_URL_TYPE),
            ("NSDefaultRunLoopMode", "kCFRunLoopDefaultMode"),
        ] {
            let string = self.new_string(self.builtin_class("NSString"), text);
            self.constants.insert(name.to_string(), string);
        }
    }

    fn next_address(&self) -> usize {
        self.next_address.fetch_add(ADDRESS_STRIDE, Ordering::Relaxed)
    }

    // ------------------------------------------------------------------
    // Threads
    // ------------------------------------------------------------------

    /// True on the simulated main thread
    pub fn is_main_thread(&self) -> bool {
        std::thread::current().id() == self.main_thread
    }

    /// Identity of the simulated main thread
    pub fn main_thread_id(&self) -> ThreadId {
        self.main_thread
    }

    fn post(&self, job: Job) {
        if self.jobs.send(job).is_err() {
            fatal!("simulated main thread has exited");
        }
    }

    // ------------------------------------------------------------------
    // Classes
    // ------------------------------------------------------------------

    pub(crate) fn define_builtin(
        &self,
        name: &str,
        superclass: Option<&str>,
        kind: Option<Kind>,
    ) -> usize {
        let superclass = superclass.map(|s| self.builtin_class(s)).unwrap_or(0);
        let class = self.next_address();
        let metaclass = self.next_address();
        let mut sim_class = SimClass::new(name, superclass, metaclass, kind);
        sim_class.registered = true;
        let mut state = self.state.write();
        state.classes.insert(class, sim_class);
        state.class_names.insert(name.to_string(), class);
        class
    }

    pub(crate) fn builtin_class(&self, name: &str) -> usize {
        match self.state.read().class_names.get(name) {
            Some(class) => *class,
            None => fatal!("simulated runtime has no class {}", name),
        }
    }

    pub(crate) fn add_builtin_methods(
        &self,
        class: usize,
        instance: &[(&str, usize)],
        class_side: &[(&str, usize)],
    ) {
        let instance: Vec<(usize, usize)> = instance
            .iter()
            .map(|(name, imp)| (self.register_selector(name).as_raw(), *imp))
            .collect();
        let class_side: Vec<(usize, usize)> = class_side
            .iter()
            .map(|(name, imp)| (self.register_selector(name).as_raw(), *imp))
            .collect();
        let mut state = self.state.write();
        if let Some(sim_class) = state.classes.get_mut(&class) {
            sim_class.instance_methods.extend(instance);
            sim_class.class_methods.extend(class_side);
        }
    }

    fn class_chain(state: &SimState, class: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut current = class;
        while let Some(sim_class) = state.classes.get(&current) {
            chain.push(current);
            current = sim_class.superclass;
        }
        chain
    }

    fn lookup_instance_method(&self, class: usize, sel: usize) -> Option<usize> {
        let state = self.state.read();
        Self::class_chain(&state, class)
            .into_iter()
            .find_map(|c| state.classes[&c].instance_methods.get(&sel).copied())
    }

    fn lookup_class_method(&self, class: usize, sel: usize) -> Option<usize> {
        let state = self.state.read();
        Self::class_chain(&state, class)
            .into_iter()
            .find_map(|c| state.classes[&c].class_methods.get(&sel).copied())
    }

    fn class_name_of(&self, class: usize) -> String {
        self.state
            .read()
            .classes
            .get(&class)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| format!("{:#x}", class))
    }

    fn describe_selector(&self, sel: usize) -> String {
        self.selector_names
            .get(&sel)
            .map(|name| name.clone())
            .unwrap_or_else(|| format!("{:#x}", sel))
    }

    // ------------------------------------------------------------------
    // Objects
    // ------------------------------------------------------------------

    fn object(&self, address: usize) -> Option<Arc<SimObject>> {
        self.state.read().objects.get(&address).cloned()
    }

    fn expect_object(&self, address: usize) -> Arc<SimObject> {
        match self.object(address) {
            Some(object) => object,
            None => fatal!("message sent to deallocated or unknown object {:#x}", address),
        }
    }

    /// Class of a live object, 0 for anything else
    fn class_of(&self, address: usize) -> usize {
        self.object(address).map(|o| o.class).unwrap_or(0)
    }

    fn is_class(&self, address: usize) -> bool {
        self.state.read().classes.contains_key(&address)
    }

    /// New object with a retain count of one
    pub(crate) fn create_object(&self, class: usize, payload: Payload) -> usize {
        let address = self.next_address();
        let mut state = self.state.write();
        let ivars: Vec<(String, Scalar)> = Self::class_chain(&state, class)
            .into_iter()
            .flat_map(|c| state.classes[&c].ivars.clone())
            .collect();
        state
            .objects
            .insert(address, Arc::new(SimObject::new(class, &ivars, payload)));
        address
    }

    /// `+alloc`
    pub(crate) fn instantiate(&self, class: usize) -> usize {
        let kind = {
            let state = self.state.read();
            match state.classes.get(&class) {
                Some(sim_class) if !sim_class.registered => {
                    fatal!("cannot instantiate unregistered class {}", sim_class.name)
                }
                Some(_) => {}
                None => fatal!("alloc sent to unknown class {:#x}", class),
            }
            Self::class_chain(&state, class)
                .into_iter()
                .find_map(|c| state.classes[&c].kind)
                .unwrap_or(Kind::Plain)
        };
        self.create_object(class, Payload::empty(kind))
    }

    pub(crate) fn retain_object(&self, address: usize) {
        if address != 0 {
            self.expect_object(address).retain();
        }
    }

    pub(crate) fn release_object(&self, address: usize) {
        if address == 0 {
            return;
        }
        if self.expect_object(address).release() == 0 {
            self.deallocate(address);
        }
    }

    fn deallocate(&self, address: usize) {
        let removed = self.state.write().objects.remove(&address);
        if let Some(object) = removed {
            tracing::trace!(object = %format!("{:#x}", address), "deallocated");
            let owned = object.payload.lock().owned_references();
            for child in owned {
                self.release_object(child);
            }
        }
    }

    pub(crate) fn retain_count_of(&self, address: usize) -> usize {
        self.expect_object(address).retain_count()
    }

    pub(crate) fn with_payload<R>(&self, address: usize, f: impl FnOnce(&mut Payload) -> R) -> R {
        let object = self.expect_object(address);
        let mut payload = object.payload.lock();
        f(&mut payload)
    }

    /// String object owned by the caller
    pub(crate) fn new_string(&self, class: usize, text: &str) -> usize {
        let c_text = CString::new(text.replace('\0', "")).unwrap_or_default();
        self.create_object(class, Payload::Str(c_text))
    }

    pub(crate) fn string_value(&self, address: usize) -> Option<String> {
        if address == 0 {
            return None;
        }
        self.with_payload(address, |payload| match payload {
            Payload::Str(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
    }

    /// Array object owned by the caller; takes over one reference of every item
    pub(crate) fn new_array(&self, items: Vec<usize>) -> usize {
        self.create_object(self.builtin_class("NSArray"), Payload::Array(items))
    }

    // ------------------------------------------------------------------
    // Autorelease pools
    // ------------------------------------------------------------------

    pub(crate) fn push_pool(&self, pool: usize) {
        POOLS.with(|pools| {
            pools.borrow_mut().push(PoolFrame {
                pool,
                objects: Vec::new(),
            })
        });
    }

    pub(crate) fn autorelease_object(&self, address: usize) -> usize {
        if address == 0 {
            return 0;
        }
        let pooled = POOLS.with(|pools| match pools.borrow_mut().last_mut() {
            Some(frame) => {
                frame.objects.push(address);
                true
            }
            None => false,
        });
        if !pooled {
            tracing::warn!(
                object = %format!("{:#x}", address),
                "autorelease with no pool in place; leaking"
            );
        }
        address
    }

    /// Pop frames down to and including `pool`'s, releasing their objects
    pub(crate) fn drain_pool(&self, pool: usize) {
        let known = POOLS.with(|pools| pools.borrow().iter().any(|f| f.pool == pool));
        if !known {
            tracing::warn!(pool = %format!("{:#x}", pool), "drain of a pool not on this thread");
            return;
        }
        loop {
            let frame = POOLS.with(|pools| pools.borrow_mut().pop());
            let Some(frame) = frame else { break };
            for object in frame.objects.into_iter().rev() {
                self.release_object(object);
            }
            if frame.pool == pool {
                break;
            }
        }
    }

    /// Number of objects waiting in this thread's innermost pool
    pub fn pending_autoreleases(&self) -> usize {
        POOLS.with(|pools| pools.borrow().last().map(|f| f.objects.len()).unwrap_or(0))
    }

    // ------------------------------------------------------------------
    // Main thread
    // ------------------------------------------------------------------

    /// Invoke a `v@:@` method directly
    fn send_object_message(&self, receiver: usize, sel: usize, argument: usize) {
        let imp = match self.lookup_instance_method(self.class_of(receiver), sel) {
            Some(imp) => imp,
            None => fatal!(
                "unrecognized selector {} sent to instance of {}",
                self.describe_selector(sel),
                self.class_name_of(self.class_of(receiver))
            ),
        };
        // SAFETY: performSelector targets take one object argument and return nothing
        let f = unsafe { std::mem::transmute::<usize, extern "C" fn(usize, usize, usize)>(imp) };
        f(receiver, sel, argument);
    }

    pub(crate) fn perform_on_main(&self, receiver: usize, sel: usize, argument: usize, wait: bool) {
        if self.is_main_thread() {
            self.send_object_message(receiver, sel, argument);
            return;
        }
        self.retain_object(receiver);
        self.retain_object(argument);
        let (done, completed) = channel::bounded::<()>(1);
        self.post(Box::new(move || {
            let sim = SimRuntime::global();
            sim.send_object_message(receiver, sel, argument);
            sim.release_object(argument);
            sim.release_object(receiver);
            let _ = done.send(());
        }));
        if wait && completed.recv().is_err() {
            fatal!("simulated main thread dropped a perform request");
        }
    }

    // ------------------------------------------------------------------
    // Scenario helpers
    // ------------------------------------------------------------------

    /// String object with a retain count of one
    pub fn make_string(&self, text: &str) -> NativeHandle {
        NativeHandle::from_raw(self.new_string(self.builtin_class("NSString"), text))
    }

    /// Event object with a retain count of one
    pub fn make_event(&self, event: SimEvent) -> NativeHandle {
        let class = self.builtin_class("NSEvent");
        NativeHandle::from_raw(self.create_object(class, Payload::Event(event)))
    }

    /// Pasteboard holding file paths, with a retain count of one
    pub fn make_pasteboard(&self, files: &[&str]) -> NativeHandle {
        let class = self.builtin_class("NSPasteboard");
        let files = files.iter().map(|f| f.to_string()).collect();
        NativeHandle::from_raw(self.create_object(class, Payload::Pasteboard { files }))
    }

    /// Dragging info wrapping a pasteboard, with a retain count of one
    pub fn make_dragging_info(&self, pasteboard: NativeHandle) -> NativeHandle {
        self.retain_object(pasteboard.as_raw());
        let class = self.builtin_class("SimDraggingInfo");
        let payload = Payload::DraggingInfo {
            pasteboard: pasteboard.as_raw(),
        };
        NativeHandle::from_raw(self.create_object(class, payload))
    }

    /// Notification about `object`, with a retain count of one
    pub fn make_notification(&self, object: NativeHandle) -> NativeHandle {
        self.retain_object(object.as_raw());
        let class = self.builtin_class("NSNotification");
        let payload = Payload::Notification {
            object: object.as_raw(),
        };
        NativeHandle::from_raw(self.create_object(class, payload))
    }

    /// Window object with a retain count of one
    pub fn make_window(&self) -> NativeHandle {
        NativeHandle::from_raw(self.instantiate(self.builtin_class("NSWindow")))
    }

    /// Move `view` into `window` and notify it with `viewDidMoveToWindow`
    pub fn attach_view(&self, window: NativeHandle, view: NativeHandle) {
        self.with_payload(view.as_raw(), |payload| match payload {
            Payload::View { window: slot, .. } => *slot = window.as_raw(),
            _ => fatal!("{} is not a view", view),
        });
        let sel = self.register_selector("viewDidMoveToWindow").as_raw();
        if let Some(imp) = self.lookup_instance_method(self.class_of(view.as_raw()), sel) {
            // SAFETY: viewDidMoveToWindow is v@:
            let f = unsafe { std::mem::transmute::<usize, extern "C" fn(usize, usize)>(imp) };
            f(view.as_raw(), sel);
        }
    }

    /// True while `object` has not been deallocated
    pub fn is_live(&self, object: NativeHandle) -> bool {
        self.object(object.as_raw()).is_some()
    }

    /// Current retain count of a live object
    pub fn retain_count(&self, object: NativeHandle) -> usize {
        self.retain_count_of(object.as_raw())
    }
}

fn main_loop(jobs: Receiver<Job>) {
    for job in jobs.iter() {
        let sim = SimRuntime::global();
        // each run loop turn gets its own pool
        sim.push_pool(0);
        job();
        sim.drain_pool(0);
    }
}

impl ForeignRuntime for SimRuntime {
    fn name(&self) -> &'static str {
        "sim"
    }

    fn class_named(&self, name: &str) -> NativeHandle {
        let state = self.state.read();
        let class = state
            .class_names
            .get(name)
            .copied()
            .filter(|class| state.classes[class].registered)
            .unwrap_or(0);
        NativeHandle::from_raw(class)
    }

    fn register_selector(&self, name: &str) -> Sel {
        let raw = *self.selectors.entry(name.to_string()).or_insert_with(|| {
            let c_name = CString::new(name.replace('\0', "")).unwrap_or_default();
            // selectors live for the whole process
            let raw = Box::leak(c_name.into_boxed_c_str()).as_ptr() as usize;
            self.selector_names.insert(raw, name.to_string());
            raw
        });
        Sel::from_raw(raw)
    }

    fn selector_name(&self, sel: Sel) -> Option<String> {
        if !self.selector_names.contains_key(&sel.as_raw()) {
            return None;
        }
        // SAFETY: registered selectors are leaked NUL-terminated strings
        let name = unsafe { CStr::from_ptr(sel.as_raw() as *const std::ffi::c_char) };
        Some(name.to_string_lossy().into_owned())
    }

    fn object_class(&self, object: NativeHandle) -> NativeHandle {
        let state = self.state.read();
        let raw = object.as_raw();
        let class = match state.classes.get(&raw) {
            Some(class) => class.metaclass,
            None => state.objects.get(&raw).map(|o| o.class).unwrap_or(0),
        };
        NativeHandle::from_raw(class)
    }

    fn superclass(&self, class: NativeHandle) -> NativeHandle {
        let state = self.state.read();
        let superclass = state
            .classes
            .get(&class.as_raw())
            .map(|c| c.superclass)
            .unwrap_or(0);
        NativeHandle::from_raw(superclass)
    }

    fn dispatch_target(&self, receiver: NativeHandle, sel: Sel, _shape: &ResultShape) -> usize {
        let raw = receiver.as_raw();
        let (imp, class) = if self.is_class(raw) {
            (self.lookup_class_method(raw, sel.as_raw()), raw)
        } else {
            let class = match self.object(raw) {
                Some(object) => object.class,
                None => fatal!(
                    "{} sent to deallocated or unknown object {}",
                    self.describe_selector(sel.as_raw()),
                    receiver
                ),
            };
            (self.lookup_instance_method(class, sel.as_raw()), class)
        };
        match imp {
            Some(imp) => imp,
            None => fatal!(
                "unrecognized selector {} sent to {}",
                self.describe_selector(sel.as_raw()),
                self.class_name_of(class)
            ),
        }
    }

    fn method_implementation(&self, class: NativeHandle, sel: Sel, _shape: &ResultShape) -> usize {
        self.lookup_instance_method(class.as_raw(), sel.as_raw())
            .unwrap_or(0)
    }

    fn allocate_class(&self, superclass: NativeHandle, name: &str) -> NativeHandle {
        let mut state = self.state.write();
        if state.class_names.contains_key(name) || !state.classes.contains_key(&superclass.as_raw())
        {
            return NativeHandle::NIL;
        }
        let class = self.next_address();
        let metaclass = self.next_address();
        state.classes.insert(
            class,
            SimClass::new(name, superclass.as_raw(), metaclass, None),
        );
        state.class_names.insert(name.to_string(), class);
        NativeHandle::from_raw(class)
    }

    fn add_ivar(&self, class: NativeHandle, name: &str, scalar: Scalar, _encoding: &str) -> bool {
        let mut state = self.state.write();
        let taken = Self::class_chain(&state, class.as_raw())
            .into_iter()
            .any(|c| state.classes[&c].ivars.iter().any(|(n, _)| n == name));
        match state.classes.get_mut(&class.as_raw()) {
            Some(sim_class) if !sim_class.registered && !taken => {
                sim_class.ivars.push((name.to_string(), scalar));
                true
            }
            _ => false,
        }
    }

    fn add_method(&self, class: NativeHandle, sel: Sel, imp: usize, _encoding: &str) -> bool {
        let mut state = self.state.write();
        match state.classes.get_mut(&class.as_raw()) {
            Some(sim_class) if !sim_class.instance_methods.contains_key(&sel.as_raw()) => {
                sim_class.instance_methods.insert(sel.as_raw(), imp);
                true
            }
            _ => false,
        }
    }

    fn register_class(&self, class: NativeHandle) {
        let mut state = self.state.write();
        match state.classes.get_mut(&class.as_raw()) {
            Some(sim_class) => sim_class.registered = true,
            None => fatal!("register of unknown class {}", class),
        }
    }

    fn dispose_class(&self, class: NativeHandle) {
        let mut state = self.state.write();
        let entry = state
            .classes
            .get(&class.as_raw())
            .map(|c| (c.registered, c.name.clone()));
        match entry {
            Some((false, name)) => {
                state.classes.remove(&class.as_raw());
                state.class_names.remove(&name);
            }
            Some((true, _)) => fatal!("dispose of registered class {}", class),
            None => fatal!("dispose of unknown class {}", class),
        }
    }

    fn read_ivar(&self, object: NativeHandle, name: &str, scalar: Scalar) -> u64 {
        let target = self.expect_object(object.as_raw());
        let ivars = target.ivars.lock();
        match ivars.get(name) {
            Some(bits) => msgbridge_sdk::Value::UInt(*bits).to_bits(scalar),
            None => fatal!("no instance variable '{}' on object {}", name, object),
        }
    }

    fn write_ivar(&self, object: NativeHandle, name: &str, scalar: Scalar, bits: u64) {
        let target = self.expect_object(object.as_raw());
        let mut ivars = target.ivars.lock();
        match ivars.get_mut(name) {
            Some(slot) => *slot = msgbridge_sdk::Value::UInt(bits).to_bits(scalar),
            None => fatal!("no instance variable '{}' on object {}", name, object),
        }
    }

    fn constant(&self, name: &str) -> Option<NativeHandle> {
        self.constants.get(name).map(|c| NativeHandle::from_raw(*c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selectors_are_content_addressed() {
        let sim = SimRuntime::global();
        let a = sim.register_selector("count");
        let b = sim.register_selector("count");
        assert_eq!(a, b);
        assert_eq!(sim.selector_name(a).as_deref(), Some("count"));
        assert_eq!(sim.selector_name(Sel::from_raw(1)), None);
    }

    #[test]
    fn test_builtin_classes_resolve() {
        let sim = SimRuntime::global();
        let object = sim.class_named("NSObject");
        let view = sim.class_named("NSView");
        assert!(!object.is_nil());
        assert!(!view.is_nil());
        assert_eq!(sim.superclass(sim.class_named("NSResponder")), object);
        assert!(sim.class_named("NSNoSuchThing").is_nil());
    }

    #[test]
    fn test_unregistered_class_is_invisible() {
        let sim = SimRuntime::global();
        let superclass = sim.class_named("NSObject");
        let class = sim.allocate_class(superclass, "SimTestPendingClass");
        assert!(!class.is_nil());
        assert!(sim.class_named("SimTestPendingClass").is_nil());
        assert!(sim.allocate_class(superclass, "SimTestPendingClass").is_nil());
        assert!(sim.add_ivar(class, "slot", Scalar::U64, "Q"));
        assert!(!sim.add_ivar(class, "slot", Scalar::U64, "Q"));
        sim.register_class(class);
        assert_eq!(sim.class_named("SimTestPendingClass"), class);
        assert!(!sim.add_ivar(class, "late", Scalar::U64, "Q"));
    }

    #[test]
    fn test_disposed_class_frees_its_name() {
        let sim = SimRuntime::global();
        let superclass = sim.class_named("NSObject");
        let class = sim.allocate_class(superclass, "SimTestDisposedClass");
        assert!(sim.add_ivar(class, "slot", Scalar::U64, "Q"));
        sim.dispose_class(class);
        assert!(sim.superclass(class).is_nil());
        let again = sim.allocate_class(superclass, "SimTestDisposedClass");
        assert!(!again.is_nil());
        assert_ne!(again, class);
    }

    #[test]
    fn test_ivar_storage() {
        let sim = SimRuntime::global();
        let class = sim.allocate_class(sim.class_named("NSObject"), "SimTestIvarClass");
        sim.add_ivar(class, "counter", Scalar::U32, "I");
        sim.register_class(class);
        let object = NativeHandle::from_raw(sim.instantiate(class.as_raw()));
        sim.write_ivar(object, "counter", Scalar::U32, 0x1_0000_0007);
        assert_eq!(sim.read_ivar(object, "counter", Scalar::U32), 7);
        sim.release_object(object.as_raw());
        assert!(!sim.is_live(object));
    }

    #[test]
    fn test_pool_drain_releases_only_its_objects() {
        let sim = SimRuntime::global();
        let outside = sim.make_string("outside");
        sim.push_pool(0xdead_0);
        let inside = sim.make_string("inside");
        sim.autorelease_object(inside.as_raw());
        assert_eq!(sim.pending_autoreleases(), 1);
        sim.drain_pool(0xdead_0);
        assert!(!sim.is_live(inside));
        assert!(sim.is_live(outside));
        sim.release_object(outside.as_raw());
    }

    #[test]
    fn test_constants() {
        let sim = SimRuntime::global();
        let file_url = sim.constant("NSPasteboardTypeFileURL").unwrap();
        assert_eq!(sim.string_value(file_url.as_raw()).as_deref(), Some(FILE_URL_TYPE));
        assert!(sim.constant("NSNoSuchConstant").is_none());
    }

    #[test]
    fn test_main_thread_identity() {
        let sim = SimRuntime::global();
        assert!(!sim.is_main_thread());
        let (tx, rx) = channel::bounded(1);
        sim.post(Box::new(move || {
            let _ = tx.send(SimRuntime::global().is_main_thread());
        }));
        assert!(rx.recv().unwrap());
    }
}
