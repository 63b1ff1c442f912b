//! Objective-C runtime backend
//!
//! Resolves the runtime entry points from the loaded `objc` library once at
//! start-up. Every entry point is required; a missing one aborts.

use super::ForeignRuntime;
use crate::config::LibrarySpec;
use crate::loader::SymbolResolver;
use msgbridge_sdk::value::{load_bits, store_bits};
use msgbridge_sdk::{NativeHandle, ResultShape, Scalar, Sel};
use std::ffi::{c_char, CStr, CString};

type GetClassFn = unsafe extern "C" fn(*const c_char) -> usize;
type RegisterNameFn = unsafe extern "C" fn(*const c_char) -> usize;
type GetNameFn = unsafe extern "C" fn(usize) -> *const c_char;
type ObjectGetClassFn = unsafe extern "C" fn(usize) -> usize;
type GetSuperclassFn = unsafe extern "C" fn(usize) -> usize;
type GetImplementationFn = unsafe extern "C" fn(usize, usize) -> usize;
type AllocateClassPairFn = unsafe extern "C" fn(usize, *const c_char, usize) -> usize;
type AddIvarFn = unsafe extern "C" fn(usize, *const c_char, usize, u8, *const c_char) -> u8;
type AddMethodFn = unsafe extern "C" fn(usize, usize, usize, *const c_char) -> u8;
type RegisterClassPairFn = unsafe extern "C" fn(usize);
type DisposeClassPairFn = unsafe extern "C" fn(usize);
type GetInstanceVariableFn = unsafe extern "C" fn(usize, *const c_char) -> usize;
type IvarGetOffsetFn = unsafe extern "C" fn(usize) -> isize;

const OBJC: &str = "objc";

/// Runtime primitives resolved from libobjc
pub struct ObjcRuntime {
    resolver: SymbolResolver,
    get_class: GetClassFn,
    register_name: RegisterNameFn,
    get_name: GetNameFn,
    object_get_class: ObjectGetClassFn,
    get_superclass: GetSuperclassFn,
    get_implementation: GetImplementationFn,
    get_implementation_stret: Option<GetImplementationFn>,
    allocate_class_pair: AllocateClassPairFn,
    add_ivar: AddIvarFn,
    add_method: AddMethodFn,
    register_class_pair: RegisterClassPairFn,
    dispose_class_pair: DisposeClassPairFn,
    get_instance_variable: GetInstanceVariableFn,
    ivar_get_offset: IvarGetOffsetFn,
    msg_send: usize,
    msg_send_stret: Option<usize>,
}

// SAFETY: the table holds function addresses and loaded libraries that stay
// valid and immutable for the life of the process
unsafe impl Send for ObjcRuntime {}
unsafe impl Sync for ObjcRuntime {}

/// Reinterpret a resolved address as a typed function pointer.
macro_rules! entry {
    ($resolver:expr, $symbol:literal, $ty:ty) => {{
        let address = $resolver.require(OBJC, $symbol);
        // SAFETY: the symbol is the runtime function with this C signature
        unsafe { std::mem::transmute::<usize, $ty>(address) }
    }};
}

fn c_string(text: &str) -> CString {
    match CString::new(text) {
        Ok(s) => s,
        Err(_) => fatal!("name contains an interior NUL: {:?}", text),
    }
}

impl ObjcRuntime {
    /// Load `libraries` and resolve every runtime entry point.
    pub fn load(libraries: &[LibrarySpec]) -> Self {
        Self::resolve(SymbolResolver::load(libraries))
    }

    /// Resolve entry points from already loaded libraries
    pub fn resolve(resolver: SymbolResolver) -> Self {
        let stret = cfg!(target_arch = "x86_64");
        let get_implementation_stret = if stret {
            Some(entry!(resolver, "class_getMethodImplementation_stret", GetImplementationFn))
        } else {
            None
        };
        let msg_send_stret = if stret {
            Some(resolver.require(OBJC, "objc_msgSend_stret"))
        } else {
            None
        };

        let runtime = Self {
            get_class: entry!(resolver, "objc_getClass", GetClassFn),
            register_name: entry!(resolver, "sel_registerName", RegisterNameFn),
            get_name: entry!(resolver, "sel_getName", GetNameFn),
            object_get_class: entry!(resolver, "object_getClass", ObjectGetClassFn),
            get_superclass: entry!(resolver, "class_getSuperclass", GetSuperclassFn),
            get_implementation: entry!(
                resolver,
                "class_getMethodImplementation",
                GetImplementationFn
            ),
            get_implementation_stret,
            allocate_class_pair: entry!(resolver, "objc_allocateClassPair", AllocateClassPairFn),
            add_ivar: entry!(resolver, "class_addIvar", AddIvarFn),
            add_method: entry!(resolver, "class_addMethod", AddMethodFn),
            register_class_pair: entry!(resolver, "objc_registerClassPair", RegisterClassPairFn),
            dispose_class_pair: entry!(resolver, "objc_disposeClassPair", DisposeClassPairFn),
            get_instance_variable: entry!(
                resolver,
                "class_getInstanceVariable",
                GetInstanceVariableFn
            ),
            ivar_get_offset: entry!(resolver, "ivar_getOffset", IvarGetOffsetFn),
            msg_send: resolver.require(OBJC, "objc_msgSend"),
            msg_send_stret,
            resolver,
        };
        tracing::info!(libraries = runtime.resolver.len(), "resolved objc runtime");
        runtime
    }

    /// Loaded libraries
    pub fn resolver(&self) -> &SymbolResolver {
        &self.resolver
    }

    /// Struct results larger than two eightbytes come back through memory on
    /// x86_64 and need the `_stret` entry points.
    fn returns_in_memory(shape: &ResultShape) -> bool {
        cfg!(target_arch = "x86_64") && shape.is_struct() && shape.size() > 16
    }

    fn ivar_address(&self, object: NativeHandle, name: &str) -> *mut u8 {
        let c_name = c_string(name);
        // SAFETY: object is a live instance and the entry points are resolved
        unsafe {
            let class = (self.object_get_class)(object.as_raw());
            let ivar = (self.get_instance_variable)(class, c_name.as_ptr());
            if ivar == 0 {
                fatal!("no instance variable '{}' on object {}", name, object);
            }
            let offset = (self.ivar_get_offset)(ivar);
            (object.as_raw() as *mut u8).offset(offset)
        }
    }
}

impl ForeignRuntime for ObjcRuntime {
    fn name(&self) -> &'static str {
        "objc"
    }

    fn class_named(&self, name: &str) -> NativeHandle {
        let c_name = c_string(name);
        NativeHandle::from_raw(unsafe { (self.get_class)(c_name.as_ptr()) })
    }

    fn register_selector(&self, name: &str) -> Sel {
        let c_name = c_string(name);
        Sel::from_raw(unsafe { (self.register_name)(c_name.as_ptr()) })
    }

    fn selector_name(&self, sel: Sel) -> Option<String> {
        if sel.is_null() {
            return None;
        }
        let ptr = unsafe { (self.get_name)(sel.as_raw()) };
        if ptr.is_null() {
            return None;
        }
        // SAFETY: sel_getName returns a NUL-terminated string owned by the runtime
        Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }

    fn object_class(&self, object: NativeHandle) -> NativeHandle {
        NativeHandle::from_raw(unsafe { (self.object_get_class)(object.as_raw()) })
    }

    fn superclass(&self, class: NativeHandle) -> NativeHandle {
        NativeHandle::from_raw(unsafe { (self.get_superclass)(class.as_raw()) })
    }

    fn dispatch_target(&self, _receiver: NativeHandle, _sel: Sel, shape: &ResultShape) -> usize {
        match self.msg_send_stret {
            Some(stret) if Self::returns_in_memory(shape) => stret,
            _ => self.msg_send,
        }
    }

    fn method_implementation(&self, class: NativeHandle, sel: Sel, shape: &ResultShape) -> usize {
        let lookup = match self.get_implementation_stret {
            Some(stret) if Self::returns_in_memory(shape) => stret,
            _ => self.get_implementation,
        };
        unsafe { lookup(class.as_raw(), sel.as_raw()) }
    }

    fn allocate_class(&self, superclass: NativeHandle, name: &str) -> NativeHandle {
        let c_name = c_string(name);
        NativeHandle::from_raw(unsafe {
            (self.allocate_class_pair)(superclass.as_raw(), c_name.as_ptr(), 0)
        })
    }

    fn add_ivar(&self, class: NativeHandle, name: &str, scalar: Scalar, encoding: &str) -> bool {
        let c_name = c_string(name);
        let c_types = c_string(encoding);
        let align_log2 = scalar.align().trailing_zeros() as u8;
        unsafe {
            (self.add_ivar)(
                class.as_raw(),
                c_name.as_ptr(),
                scalar.size(),
                align_log2,
                c_types.as_ptr(),
            ) != 0
        }
    }

    fn add_method(&self, class: NativeHandle, sel: Sel, imp: usize, encoding: &str) -> bool {
        let c_types = c_string(encoding);
        unsafe { (self.add_method)(class.as_raw(), sel.as_raw(), imp, c_types.as_ptr()) != 0 }
    }

    fn register_class(&self, class: NativeHandle) {
        unsafe { (self.register_class_pair)(class.as_raw()) }
    }

    fn dispose_class(&self, class: NativeHandle) {
        unsafe { (self.dispose_class_pair)(class.as_raw()) }
    }

    fn read_ivar(&self, object: NativeHandle, name: &str, scalar: Scalar) -> u64 {
        let address = self.ivar_address(object, name);
        // SAFETY: the ivar was declared with this scalar's size
        let bytes = unsafe { std::slice::from_raw_parts(address, scalar.size()) };
        load_bits(scalar, bytes)
    }

    fn write_ivar(&self, object: NativeHandle, name: &str, scalar: Scalar, bits: u64) {
        let address = self.ivar_address(object, name);
        // SAFETY: the ivar was declared with this scalar's size
        let bytes = unsafe { std::slice::from_raw_parts_mut(address, scalar.size()) };
        store_bits(scalar, bits, bytes);
    }

    fn constant(&self, name: &str) -> Option<NativeHandle> {
        self.resolver
            .constant(name)
            .map(NativeHandle::from_raw)
            .and_then(NativeHandle::non_nil)
    }
}
