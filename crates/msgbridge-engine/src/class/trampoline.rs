//! Native-callable wrappers around host method closures
//!
//! Each synthesized method gets one libffi closure whose code address is
//! installed as the method implementation. The closure's user data is a
//! leaked [`MethodEntry`], so it lives for the rest of the process, as does
//! the closure itself (held by the published class).

use crate::invoke::build_cif;
use libffi::middle::Closure;
use libffi::raw;
use msgbridge_sdk::value::{load_bits, store_bits};
use msgbridge_sdk::{Field, MethodSignature, NativeHandle, ResultShape, Scalar, Sel, Value};
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};

/// Host implementation of a synthesized method
pub type MethodFn = dyn Fn(&MethodCall) -> Value + Send + Sync;

/// One invocation of a synthesized method, as seen by its host closure.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    /// The instance (or class) that received the message
    pub receiver: NativeHandle,
    /// The selector that was sent
    pub selector: Sel,
    /// The synthesized class the method was installed on; the starting point
    /// for super-sends
    pub class: NativeHandle,
    /// Explicit arguments, decoded per the method's type encoding
    pub args: Vec<Value>,
}

impl MethodCall {
    /// Explicit argument `index`; `Void` when out of range
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or(Value::Void)
    }

    /// Explicit argument `index` as an object
    pub fn object(&self, index: usize) -> NativeHandle {
        self.arg(index).as_handle()
    }
}

struct MethodEntry {
    class_name: String,
    class: NativeHandle,
    selector: String,
    signature: MethodSignature,
    ret: ResultShape,
    body: Box<MethodFn>,
}

impl MethodEntry {
    /// Read every argument the callee was given
    ///
    /// # Safety
    ///
    /// `args` must hold one valid pointer per signature argument.
    unsafe fn decode(&self, args: *const *const c_void) -> MethodCall {
        let values: Vec<Value> = self
            .signature
            .args()
            .iter()
            .enumerate()
            .map(|(index, code)| {
                let ptr = *args.add(index) as *const u8;
                match code.field() {
                    Some(Field::Struct(layout)) => {
                        Value::Struct(std::slice::from_raw_parts(ptr, layout.size()).to_vec())
                    }
                    Some(Field::Scalar(scalar)) => {
                        let bytes = std::slice::from_raw_parts(ptr, scalar.size());
                        Value::from_bits(scalar, load_bits(scalar, bytes))
                    }
                    None => Value::Void,
                }
            })
            .collect();

        let mut values = values.into_iter();
        let receiver = values.next().map(|v| v.as_handle()).unwrap_or_default();
        let selector = values
            .next()
            .and_then(|v| v.as_pointer())
            .map(Sel::from_raw)
            .unwrap_or_default();
        MethodCall {
            receiver,
            selector,
            class: self.class,
            args: values.collect(),
        }
    }

    /// Write `value` where the caller expects the method's result
    ///
    /// # Safety
    ///
    /// `out` must be the libffi result buffer for this method's signature.
    unsafe fn encode_return(&self, value: Value, out: *mut u8) {
        match &self.ret {
            ResultShape::Void => {}
            ResultShape::Scalar(Scalar::F32) => {
                let mut bytes = [0u8; 4];
                store_bits(Scalar::F32, value.to_bits(Scalar::F32), &mut bytes);
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), out, bytes.len());
            }
            ResultShape::Scalar(scalar) => {
                // integer results travel as a full register
                let bits = value.to_bits(*scalar);
                let widened = if scalar.is_signed() {
                    Value::from_bits(*scalar, bits).as_i64() as u64
                } else {
                    bits
                };
                std::ptr::write_unaligned(out as *mut u64, widened);
            }
            ResultShape::Struct(layout) => match value.as_struct_bytes() {
                Some(bytes) if bytes.len() == layout.size() => {
                    std::ptr::copy_nonoverlapping(bytes.as_ptr(), out, bytes.len());
                }
                _ => fatal!(
                    "{}.{} returned {:?} for a {}-byte struct result",
                    self.class_name,
                    self.selector,
                    value,
                    layout.size()
                ),
            },
        }
    }
}

unsafe extern "C" fn method_trampoline(
    _cif: &raw::ffi_cif,
    result: &mut u64,
    args: *const *const c_void,
    entry: &MethodEntry,
) {
    let out = result as *mut u64 as *mut u8;
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let call = entry.decode(args);
        let value = (entry.body)(&call);
        entry.encode_return(value, out);
    }));
    if outcome.is_err() {
        tracing::error!(
            class = %entry.class_name,
            selector = %entry.selector,
            "host method panicked inside a foreign callback; aborting"
        );
        std::process::abort();
    }
}

/// A host closure made callable as a native method implementation.
pub(crate) struct Trampoline {
    entry: &'static MethodEntry,
    // owns the executable trampoline at `code`
    _closure: Closure<'static>,
    code: usize,
}

// The closure is immutable after creation and its user data is Sync.
unsafe impl Send for Trampoline {}
unsafe impl Sync for Trampoline {}

impl Trampoline {
    pub(crate) fn new(
        class_name: &str,
        class: NativeHandle,
        selector: &str,
        signature: MethodSignature,
        body: Box<MethodFn>,
    ) -> Self {
        let fields: Vec<Field> = signature
            .args()
            .iter()
            .map(|code| match code.field() {
                Some(field) => field,
                None => fatal!(
                    "void argument in encoding '{}' of {}.{}",
                    signature.encoding(),
                    class_name,
                    selector
                ),
            })
            .collect();
        let ret = signature.ret().result_shape();
        let cif = build_cif(&fields, &ret);

        let entry: &'static MethodEntry = Box::leak(Box::new(MethodEntry {
            class_name: class_name.to_string(),
            class,
            selector: selector.to_string(),
            signature,
            ret,
            body,
        }));
        let closure = Closure::new(cif, method_trampoline, entry);
        let code = *closure.code_ptr() as usize;
        Self {
            entry,
            _closure: closure,
            code,
        }
    }

    /// Address to install as the method implementation
    pub(crate) fn code(&self) -> usize {
        self.code
    }

    /// Type encoding the method was declared with
    pub(crate) fn encoding(&self) -> &str {
        self.entry.signature.encoding()
    }
}
