//! The generic invoker
//!
//! Every message send and every direct function call made by the bridge ends
//! up in [`call_function`]. Arguments are laid out by their ABI field type and
//! handed to libffi, which assigns integer-class and float-class values to the
//! right registers and falls back to a hidden out pointer for struct results
//! that do not fit in registers.
//!
//! The invoker knows nothing about specific classes or selectors. Malformed
//! arguments are binding defects and terminate the process.

use crate::runtime::ForeignRuntime;
use libffi::middle::{Cif, CodePtr, Type};
use libffi::raw;
use msgbridge_sdk::value::{load_bits, store_bits};
use msgbridge_sdk::{Arg, Field, FromValue, NativeHandle, ResultShape, Scalar, Sel, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::rc::Rc;

const WORD: usize = std::mem::size_of::<u64>();

// ============================================================================
// Call interfaces
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CifKey {
    args: Vec<Field>,
    ret: ResultShape,
}

thread_local! {
    // Rc so the borrow ends before the call; callees may re-enter the invoker.
    static CIF_CACHE: RefCell<HashMap<CifKey, Rc<Cif>>> = RefCell::new(HashMap::new());
}

fn scalar_type(scalar: Scalar) -> Type {
    match scalar {
        Scalar::Bool | Scalar::U8 => Type::u8(),
        Scalar::I8 => Type::i8(),
        Scalar::I16 => Type::i16(),
        Scalar::U16 => Type::u16(),
        Scalar::I32 => Type::i32(),
        Scalar::U32 => Type::u32(),
        Scalar::I64 => Type::i64(),
        Scalar::U64 => Type::u64(),
        Scalar::F32 => Type::f32(),
        Scalar::F64 => Type::f64(),
        Scalar::Pointer => Type::pointer(),
    }
}

/// libffi type of one field
pub(crate) fn ffi_type(field: &Field) -> Type {
    match field {
        Field::Scalar(scalar) => scalar_type(*scalar),
        Field::Struct(layout) => {
            if layout.is_empty() {
                fatal!("empty struct layout cannot cross the boundary");
            }
            Type::structure(layout.fields().iter().map(ffi_type))
        }
    }
}

/// libffi type of a result
pub(crate) fn result_type(shape: &ResultShape) -> Type {
    match shape {
        ResultShape::Void => Type::void(),
        ResultShape::Scalar(scalar) => scalar_type(*scalar),
        ResultShape::Struct(layout) => ffi_type(&Field::Struct(layout.clone())),
    }
}

/// A fresh call interface; closures take ownership of theirs.
pub(crate) fn build_cif(args: &[Field], ret: &ResultShape) -> Cif {
    Cif::new(args.iter().map(ffi_type), result_type(ret))
}

fn cached_cif(args: &[Field], ret: &ResultShape) -> Rc<Cif> {
    let key = CifKey {
        args: args.to_vec(),
        ret: ret.clone(),
    };
    CIF_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        let cif = cache
            .entry(key)
            .or_insert_with(|| Rc::new(build_cif(args, ret)));
        Rc::clone(cif)
    })
}

#[cfg(test)]
fn cached_signatures() -> usize {
    CIF_CACHE.with(|cache| cache.borrow().len())
}

// ============================================================================
// Argument and result encoding
// ============================================================================

fn words_from_bytes(bytes: &[u8]) -> Vec<u64> {
    bytes
        .chunks(WORD)
        .map(|chunk| {
            let mut word = [0u8; WORD];
            word[..chunk.len()].copy_from_slice(chunk);
            u64::from_ne_bytes(word)
        })
        .collect()
}

fn bytes_from_words(words: &[u64]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_ne_bytes()).collect()
}

/// Word-aligned storage holding one argument as the callee expects to read it
fn encode_arg(index: usize, arg: &Arg) -> Vec<u64> {
    match arg {
        Arg::Struct(value) => {
            if value.layout().is_empty() {
                fatal!("empty struct layout in argument {}", index);
            }
            if !value.is_consistent() {
                fatal!(
                    "struct argument {} has {} bytes but its layout needs {}",
                    index,
                    value.bytes().len(),
                    value.layout().size()
                );
            }
            words_from_bytes(value.bytes())
        }
        scalar => {
            let (Some(kind), Some(bits)) = (scalar.scalar(), scalar.bits()) else {
                fatal!("argument {} has no scalar encoding: {:?}", index, scalar)
            };
            let mut word = [0u8; WORD];
            store_bits(kind, bits, &mut word);
            vec![u64::from_ne_bytes(word)]
        }
    }
}

fn decode_result(shape: &ResultShape, bytes: &[u8]) -> Value {
    match shape {
        ResultShape::Void => Value::Void,
        ResultShape::Scalar(Scalar::F32) => Value::from_bits(Scalar::F32, load_bits(Scalar::F32, bytes)),
        // integer results are widened to a full register by the callee
        ResultShape::Scalar(scalar) => Value::from_bits(*scalar, load_bits(Scalar::U64, bytes)),
        ResultShape::Struct(layout) => Value::Struct(bytes[..layout.size()].to_vec()),
    }
}

/// The value a send to nil produces: zero of the expected shape
pub fn zero_value(shape: &ResultShape) -> Value {
    match shape {
        ResultShape::Void => Value::Void,
        ResultShape::Scalar(scalar) => Value::from_bits(*scalar, 0),
        ResultShape::Struct(layout) => Value::Struct(vec![0; layout.size()]),
    }
}

// ============================================================================
// Calls
// ============================================================================

/// Call the C function at `address` with `args`, decoding a result of `shape`.
///
/// # Safety
///
/// `address` must be a function whose C signature matches the argument
/// fields and result shape exactly. Pointer arguments must be valid for
/// whatever the callee does with them.
pub unsafe fn call_function(address: usize, args: &[Arg], shape: &ResultShape) -> Value {
    if address == 0 {
        fatal!("call through a null function address");
    }

    let mut storage: Vec<Vec<u64>> = args
        .iter()
        .enumerate()
        .map(|(index, arg)| encode_arg(index, arg))
        .collect();
    let fields: Vec<Field> = args.iter().map(Arg::field).collect();
    let mut avalue: Vec<*mut c_void> = storage
        .iter_mut()
        .map(|slot| slot.as_mut_ptr() as *mut c_void)
        .collect();

    let cif = cached_cif(&fields, shape);
    let code = CodePtr(address as *mut c_void);

    let bytes = if shape.fits_register() {
        let mut slot = 0u64;
        raw::ffi_call(
            cif.as_raw_ptr(),
            Some(*code.as_safe_fun()),
            &mut slot as *mut u64 as *mut c_void,
            avalue.as_mut_ptr(),
        );
        slot.to_ne_bytes().to_vec()
    } else {
        let mut buffer = vec![0u64; shape.size().div_ceil(WORD)];
        raw::ffi_call(
            cif.as_raw_ptr(),
            Some(*code.as_safe_fun()),
            buffer.as_mut_ptr() as *mut c_void,
            avalue.as_mut_ptr(),
        );
        bytes_from_words(&buffer)
    };

    decode_result(shape, &bytes)
}

fn implicit_args(receiver: NativeHandle, sel: Sel, args: &[Arg]) -> Vec<Arg> {
    let mut full = Vec::with_capacity(args.len() + 2);
    full.push(Arg::object(receiver));
    full.push(Arg::Sel(sel));
    full.extend_from_slice(args);
    full
}

fn describe(runtime: &dyn ForeignRuntime, sel: Sel) -> String {
    runtime
        .selector_name(sel)
        .unwrap_or_else(|| format!("{:#x}", sel.as_raw()))
}

/// Send `sel` to `receiver`. A nil receiver yields [`zero_value`] without
/// calling anything.
///
/// # Safety
///
/// The method's C signature must match `args` and `shape`.
pub unsafe fn invoke(
    runtime: &dyn ForeignRuntime,
    receiver: NativeHandle,
    sel: Sel,
    args: &[Arg],
    shape: &ResultShape,
) -> Value {
    if receiver.is_nil() {
        tracing::trace!(selector = %describe(runtime, sel), "send to nil");
        return zero_value(shape);
    }
    let target = runtime.dispatch_target(receiver, sel, shape);
    tracing::trace!(
        receiver = %receiver,
        selector = %describe(runtime, sel),
        args = args.len(),
        "send"
    );
    call_function(target, &implicit_args(receiver, sel, args), shape)
}

/// Typed [`invoke`]: the result shape comes from `R`.
///
/// # Safety
///
/// As for [`invoke`].
pub unsafe fn send<R: FromValue>(
    runtime: &dyn ForeignRuntime,
    receiver: NativeHandle,
    sel: Sel,
    args: &[Arg],
) -> R {
    let value = invoke(runtime, receiver, sel, args, &R::result_shape());
    match R::from_value(value) {
        Some(result) => result,
        None => fatal!(
            "result of {} does not decode as {}",
            describe(runtime, sel),
            std::any::type_name::<R>()
        ),
    }
}

/// Send `sel` to `receiver` using the implementation inherited by `class`,
/// skipping any override on `class` itself.
///
/// # Safety
///
/// As for [`invoke`]; `class` must be the class of the method making the
/// super-send.
pub unsafe fn invoke_super(
    runtime: &dyn ForeignRuntime,
    receiver: NativeHandle,
    class: NativeHandle,
    sel: Sel,
    args: &[Arg],
    shape: &ResultShape,
) -> Value {
    if receiver.is_nil() {
        return zero_value(shape);
    }
    let superclass = runtime.superclass(class);
    if superclass.is_nil() {
        fatal!("super-send of {} from a root class", describe(runtime, sel));
    }
    let imp = runtime.method_implementation(superclass, sel, shape);
    if imp == 0 {
        fatal!(
            "superclass of {} does not implement {}",
            class,
            describe(runtime, sel)
        );
    }
    tracing::trace!(receiver = %receiver, selector = %describe(runtime, sel), "super send");
    call_function(imp, &implicit_args(receiver, sel, args), shape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use msgbridge_sdk::{NSPoint, NSRect, NSSize, NativeStruct, StructLayout, StructValue};

    extern "C" fn add_i32(a: i32, b: i32) -> i32 {
        a + b
    }

    extern "C" fn half(value: f32) -> f32 {
        value / 2.0
    }

    extern "C" fn mixed(a: u8, b: f64, c: u64, d: f32) -> f64 {
        a as f64 + b + c as f64 + d as f64
    }

    extern "C" fn offset_point(point: NSPoint, dx: f64) -> NSPoint {
        NSPoint::new(point.x + dx, point.y)
    }

    extern "C" fn make_rect(x: f64, y: f64, w: f64, h: f64) -> NSRect {
        NSRect::new(x, y, w, h)
    }

    extern "C" fn is_positive(value: i64) -> bool {
        value > 0
    }

    #[test]
    fn test_signed_result_is_sign_extended() {
        let value = unsafe {
            call_function(
                add_i32 as usize,
                &[Arg::I32(-7), Arg::I32(2)],
                &ResultShape::Scalar(Scalar::I32),
            )
        };
        assert_eq!(value, Value::Int(-5));
    }

    #[test]
    fn test_float_register_class() {
        let value = unsafe {
            call_function(half as usize, &[Arg::F32(3.0)], &ResultShape::Scalar(Scalar::F32))
        };
        assert_eq!(value, Value::Float(1.5));

        let value = unsafe {
            call_function(
                mixed as usize,
                &[Arg::U8(1), Arg::F64(0.5), Arg::U64(10), Arg::F32(0.25)],
                &ResultShape::Scalar(Scalar::F64),
            )
        };
        assert_eq!(value, Value::Float(11.75));
    }

    #[test]
    fn test_struct_argument_and_register_result() {
        let value = unsafe {
            call_function(
                offset_point as usize,
                &[NSPoint::new(1.0, 2.0).to_arg(), Arg::F64(3.0)],
                &ResultShape::Struct(NSPoint::layout()),
            )
        };
        let point = NSPoint::from_bytes(value.as_struct_bytes().unwrap()).unwrap();
        assert_eq!(point, NSPoint::new(4.0, 2.0));
    }

    #[test]
    fn test_wide_struct_result_uses_out_buffer() {
        let shape = ResultShape::Struct(NSRect::layout());
        assert!(!shape.fits_register());
        let value = unsafe {
            call_function(
                make_rect as usize,
                &[Arg::F64(1.0), Arg::F64(2.0), Arg::F64(30.0), Arg::F64(40.0)],
                &shape,
            )
        };
        let rect = NSRect::from_bytes(value.as_struct_bytes().unwrap()).unwrap();
        assert_eq!(rect, NSRect::new(1.0, 2.0, 30.0, 40.0));
        assert_eq!(rect.size, NSSize::new(30.0, 40.0));
    }

    #[test]
    fn test_bool_result() {
        let yes = unsafe {
            call_function(is_positive as usize, &[Arg::I64(3)], &ResultShape::Scalar(Scalar::Bool))
        };
        let no = unsafe {
            call_function(is_positive as usize, &[Arg::I64(-3)], &ResultShape::Scalar(Scalar::Bool))
        };
        assert_eq!(yes, Value::Bool(true));
        assert_eq!(no, Value::Bool(false));
    }

    #[test]
    fn test_call_interfaces_are_cached_per_signature() {
        let shape = ResultShape::Scalar(Scalar::I32);
        let args = [Arg::I32(1), Arg::I32(1)];
        unsafe { call_function(add_i32 as usize, &args, &shape) };
        let after_first = cached_signatures();
        unsafe { call_function(add_i32 as usize, &args, &shape) };
        assert_eq!(cached_signatures(), after_first);
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(zero_value(&ResultShape::Void), Value::Void);
        assert_eq!(zero_value(&ResultShape::POINTER), Value::Pointer(0));
        assert_eq!(zero_value(&ResultShape::Scalar(Scalar::F64)), Value::Float(0.0));
        assert_eq!(
            zero_value(&ResultShape::Struct(NSRect::layout())),
            Value::Struct(vec![0; 32])
        );
    }

    #[test]
    #[should_panic(expected = "struct argument 0")]
    fn test_inconsistent_struct_is_fatal() {
        let bad = Arg::Struct(StructValue::new(NSPoint::layout(), vec![0; 3]));
        unsafe { call_function(offset_point as usize, &[bad, Arg::F64(0.0)], &ResultShape::Void) };
    }

    #[test]
    #[should_panic(expected = "empty struct")]
    fn test_empty_struct_is_fatal() {
        let bad = Arg::Struct(StructValue::new(StructLayout::new(Vec::new()), Vec::new()));
        unsafe { call_function(add_i32 as usize, &[bad], &ResultShape::Void) };
    }
}
