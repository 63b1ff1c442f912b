//! Conversions between host types and invocation values

use crate::types::{NSPoint, NSRect, NSSize, NativeHandle, ResultShape, Scalar, Sel, StructLayout};
use crate::value::{Arg, StructValue, Value};
use std::ffi::CString;

/// A `#[repr(C)]` plain-data struct that can cross the boundary by value.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]`, contain only plain data, accept any bit
/// pattern, and report a [`StructLayout`] whose size equals
/// `size_of::<Self>()`.
pub unsafe trait NativeStruct: Copy + Sized {
    /// Field layout
    fn layout() -> StructLayout;

    /// Raw bytes of this value
    fn to_bytes(&self) -> Vec<u8> {
        let ptr = self as *const Self as *const u8;
        // SAFETY: Self is plain repr(C) data of exactly size_of::<Self>() bytes
        unsafe { std::slice::from_raw_parts(ptr, std::mem::size_of::<Self>()) }.to_vec()
    }

    /// Rebuild from raw bytes; `None` on a size mismatch
    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != std::mem::size_of::<Self>() {
            return None;
        }
        // SAFETY: length checked, any bit pattern is valid, read_unaligned
        // tolerates the Vec's byte alignment
        Some(unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const Self) })
    }

    /// Wrap as a by-value argument
    fn to_arg(&self) -> Arg {
        Arg::Struct(StructValue::new(Self::layout(), self.to_bytes()))
    }
}

unsafe impl NativeStruct for NSPoint {
    fn layout() -> StructLayout {
        StructLayout::of(&[Scalar::F64, Scalar::F64])
    }
}

unsafe impl NativeStruct for NSSize {
    fn layout() -> StructLayout {
        StructLayout::of(&[Scalar::F64, Scalar::F64])
    }
}

unsafe impl NativeStruct for NSRect {
    fn layout() -> StructLayout {
        StructLayout::new(vec![NSPoint::layout().into(), NSSize::layout().into()])
    }
}

/// Types a typed send can decode its result into.
pub trait FromValue: Sized {
    /// Shape the callee is expected to return
    fn result_shape() -> ResultShape;

    /// Convert a result decoded with [`FromValue::result_shape`]; `None` if
    /// the value has the wrong shape
    fn from_value(value: Value) -> Option<Self>;
}

impl FromValue for () {
    fn result_shape() -> ResultShape {
        ResultShape::Void
    }

    fn from_value(_: Value) -> Option<Self> {
        Some(())
    }
}

impl FromValue for bool {
    fn result_shape() -> ResultShape {
        ResultShape::Scalar(Scalar::Bool)
    }

    fn from_value(value: Value) -> Option<Self> {
        Some(value.as_bool())
    }
}

impl FromValue for NativeHandle {
    fn result_shape() -> ResultShape {
        ResultShape::POINTER
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_pointer().map(NativeHandle::from_raw)
    }
}

impl FromValue for Sel {
    fn result_shape() -> ResultShape {
        ResultShape::POINTER
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_pointer().map(Sel::from_raw)
    }
}

macro_rules! impl_from_value_int {
    ($($ty:ty => $scalar:expr),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn result_shape() -> ResultShape {
                    ResultShape::Scalar($scalar)
                }

                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::Int(v) => Some(v as $ty),
                        Value::UInt(v) => Some(v as $ty),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_from_value_int! {
    i8 => Scalar::I8,
    u8 => Scalar::U8,
    i16 => Scalar::I16,
    u16 => Scalar::U16,
    i32 => Scalar::I32,
    u32 => Scalar::U32,
    i64 => Scalar::I64,
    u64 => Scalar::U64,
    isize => Scalar::I64,
    usize => Scalar::U64,
}

impl FromValue for f32 {
    fn result_shape() -> ResultShape {
        ResultShape::Scalar(Scalar::F32)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(v as f32),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    fn result_shape() -> ResultShape {
        ResultShape::Scalar(Scalar::F64)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(v),
            _ => None,
        }
    }
}

macro_rules! impl_from_value_struct {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn result_shape() -> ResultShape {
                    ResultShape::Struct(<$ty as NativeStruct>::layout())
                }

                fn from_value(value: Value) -> Option<Self> {
                    value.as_struct_bytes().and_then(<$ty as NativeStruct>::from_bytes)
                }
            }

            impl From<$ty> for Arg {
                fn from(v: $ty) -> Self {
                    v.to_arg()
                }
            }
        )*
    };
}

impl_from_value_struct!(NSPoint, NSSize, NSRect);

macro_rules! impl_into_arg {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Arg {
                fn from(v: $ty) -> Self {
                    Arg::$variant(v)
                }
            }
        )*
    };
}

impl_into_arg! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Sel => Sel,
    CString => CString,
}

impl From<usize> for Arg {
    fn from(v: usize) -> Self {
        Arg::U64(v as u64)
    }
}

impl From<NativeHandle> for Arg {
    fn from(v: NativeHandle) -> Self {
        Arg::object(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_bytes() {
        let rect = NSRect::new(1.0, 2.0, 30.0, 40.0);
        let bytes = rect.to_bytes();
        assert_eq!(bytes.len(), NSRect::layout().size());
        assert_eq!(NSRect::from_bytes(&bytes), Some(rect));
        assert_eq!(NSRect::from_bytes(&bytes[..16]), None);
    }

    #[test]
    fn test_rect_arg_is_consistent() {
        match Arg::from(NSRect::new(0.0, 0.0, 1.0, 1.0)) {
            Arg::Struct(value) => assert!(value.is_consistent()),
            other => panic!("expected struct arg, got {:?}", other),
        }
    }

    #[test]
    fn test_from_value() {
        assert_eq!(u64::from_value(Value::UInt(9)), Some(9));
        assert_eq!(i32::from_value(Value::Int(-4)), Some(-4));
        assert_eq!(f64::from_value(Value::Float(0.5)), Some(0.5));
        assert_eq!(f64::from_value(Value::UInt(1)), None);
        assert_eq!(
            NativeHandle::from_value(Value::Pointer(0x40)),
            Some(NativeHandle::from_raw(0x40))
        );
        assert!(bool::from_value(Value::Bool(true)).unwrap());
    }

    #[test]
    fn test_into_arg() {
        assert_eq!(Arg::from(3u32), Arg::U32(3));
        assert_eq!(Arg::from(NativeHandle::NIL), Arg::Pointer(0));
        assert_eq!(Arg::from(7usize), Arg::U64(7));
    }
}
