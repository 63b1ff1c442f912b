//! Invocation arguments and decoded results

use crate::types::{Field, NativeHandle, RegisterClass, Scalar, Sel, StructLayout};
use std::ffi::CString;

// ============================================================================
// Arguments
// ============================================================================

/// Raw bytes of a struct passed by value, with the layout they claim to have.
///
/// Nothing is validated at construction time; the invoker rejects values whose
/// bytes do not match their layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructValue {
    layout: StructLayout,
    bytes: Vec<u8>,
}

impl StructValue {
    /// Wrap bytes with a layout
    pub fn new(layout: StructLayout, bytes: Vec<u8>) -> Self {
        Self { layout, bytes }
    }

    /// Declared layout
    pub fn layout(&self) -> &StructLayout {
        &self.layout
    }

    /// Raw bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// True when the layout is expressible and the bytes fill it exactly
    pub fn is_consistent(&self) -> bool {
        !self.layout.is_empty() && self.bytes.len() == self.layout.size()
    }
}

/// One argument of a foreign invocation.
///
/// Every variant carries its ABI width implicitly through [`Arg::field`].
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// One-byte boolean
    Bool(bool),
    /// Signed 8-bit integer
    I8(i8),
    /// Unsigned 8-bit integer
    U8(u8),
    /// Signed 16-bit integer
    I16(i16),
    /// Unsigned 16-bit integer
    U16(u16),
    /// Signed 32-bit integer
    I32(i32),
    /// Unsigned 32-bit integer
    U32(u32),
    /// Signed 64-bit integer
    I64(i64),
    /// Unsigned 64-bit integer
    U64(u64),
    /// Single precision float
    F32(f32),
    /// Double precision float
    F64(f64),
    /// Opaque pointer or object identity
    Pointer(usize),
    /// Interned selector
    Sel(Sel),
    /// NUL-terminated string, borrowed by the callee for the call duration
    CString(CString),
    /// Struct passed by value
    Struct(StructValue),
}

impl Arg {
    /// Object argument
    pub fn object(handle: NativeHandle) -> Self {
        Arg::Pointer(handle.as_raw())
    }

    /// The nil object
    pub fn nil() -> Self {
        Arg::Pointer(0)
    }

    /// Scalar kind, `None` for structs
    pub fn scalar(&self) -> Option<Scalar> {
        Some(match self {
            Arg::Bool(_) => Scalar::Bool,
            Arg::I8(_) => Scalar::I8,
            Arg::U8(_) => Scalar::U8,
            Arg::I16(_) => Scalar::I16,
            Arg::U16(_) => Scalar::U16,
            Arg::I32(_) => Scalar::I32,
            Arg::U32(_) => Scalar::U32,
            Arg::I64(_) => Scalar::I64,
            Arg::U64(_) => Scalar::U64,
            Arg::F32(_) => Scalar::F32,
            Arg::F64(_) => Scalar::F64,
            Arg::Pointer(_) | Arg::Sel(_) | Arg::CString(_) => Scalar::Pointer,
            Arg::Struct(_) => return None,
        })
    }

    /// ABI field description of this argument
    pub fn field(&self) -> Field {
        match self {
            Arg::Struct(value) => Field::Struct(value.layout().clone()),
            other => Field::Scalar(other.scalar().unwrap_or(Scalar::Pointer)),
        }
    }

    /// Width in bytes as passed to the callee
    pub fn width(&self) -> usize {
        self.field().size()
    }

    /// Register class of a scalar argument; structs report `None` because
    /// their classification depends on their fields.
    pub fn register_class(&self) -> Option<RegisterClass> {
        self.scalar().map(Scalar::register_class)
    }

    /// Bit pattern of a scalar argument, zero-extended to 64 bits.
    ///
    /// Returns `None` for structs.
    pub fn bits(&self) -> Option<u64> {
        Some(match self {
            Arg::Bool(b) => *b as u64,
            Arg::I8(v) => *v as u8 as u64,
            Arg::U8(v) => *v as u64,
            Arg::I16(v) => *v as u16 as u64,
            Arg::U16(v) => *v as u64,
            Arg::I32(v) => *v as u32 as u64,
            Arg::U32(v) => *v as u64,
            Arg::I64(v) => *v as u64,
            Arg::U64(v) => *v,
            Arg::F32(v) => v.to_bits() as u64,
            Arg::F64(v) => v.to_bits(),
            Arg::Pointer(p) => *p as u64,
            Arg::Sel(sel) => sel.as_raw() as u64,
            Arg::CString(s) => s.as_ptr() as usize as u64,
            Arg::Struct(_) => return None,
        })
    }
}

// ============================================================================
// Results
// ============================================================================

/// A decoded result, or a decoded callback argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value
    Void,
    /// Boolean
    Bool(bool),
    /// Signed integer, sign-extended
    Int(i64),
    /// Unsigned integer, zero-extended
    UInt(u64),
    /// Floating point, widened to f64
    Float(f64),
    /// Pointer, object, class, or selector
    Pointer(usize),
    /// Struct bytes
    Struct(Vec<u8>),
}

impl Value {
    /// Decode a scalar from its zero-extended bit pattern
    pub fn from_bits(scalar: Scalar, bits: u64) -> Self {
        match scalar {
            Scalar::Bool => Value::Bool(bits as u8 != 0),
            Scalar::I8 => Value::Int(bits as u8 as i8 as i64),
            Scalar::I16 => Value::Int(bits as u16 as i16 as i64),
            Scalar::I32 => Value::Int(bits as u32 as i32 as i64),
            Scalar::I64 => Value::Int(bits as i64),
            Scalar::U8 => Value::UInt(bits as u8 as u64),
            Scalar::U16 => Value::UInt(bits as u16 as u64),
            Scalar::U32 => Value::UInt(bits as u32 as u64),
            Scalar::U64 => Value::UInt(bits),
            Scalar::F32 => Value::Float(f32::from_bits(bits as u32) as f64),
            Scalar::F64 => Value::Float(f64::from_bits(bits)),
            Scalar::Pointer => Value::Pointer(bits as usize),
        }
    }

    /// Encode into the bit pattern of `scalar`, converting numerically
    pub fn to_bits(&self, scalar: Scalar) -> u64 {
        match scalar {
            Scalar::F32 => (self.as_f64() as f32).to_bits() as u64,
            Scalar::F64 => self.as_f64().to_bits(),
            Scalar::Bool => self.as_bool() as u64,
            _ => {
                let raw = self.as_u64();
                match scalar.size() {
                    1 => raw as u8 as u64,
                    2 => raw as u16 as u64,
                    4 => raw as u32 as u64,
                    _ => raw,
                }
            }
        }
    }

    /// True for `Void`
    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    /// Truthiness: non-zero numbers and non-null pointers
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Void => false,
            Value::Bool(b) => *b,
            Value::Int(v) => *v != 0,
            Value::UInt(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Pointer(p) => *p != 0,
            Value::Struct(bytes) => bytes.iter().any(|b| *b != 0),
        }
    }

    /// Numeric value as i64
    pub fn as_i64(&self) -> i64 {
        match self {
            Value::Int(v) => *v,
            Value::Float(v) => *v as i64,
            other => other.as_u64() as i64,
        }
    }

    /// Numeric value as u64
    pub fn as_u64(&self) -> u64 {
        match self {
            Value::Void | Value::Struct(_) => 0,
            Value::Bool(b) => *b as u64,
            Value::Int(v) => *v as u64,
            Value::UInt(v) => *v,
            Value::Float(v) => *v as u64,
            Value::Pointer(p) => *p as u64,
        }
    }

    /// Numeric value as f64
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Float(v) => *v,
            Value::Int(v) => *v as f64,
            other => other.as_u64() as f64,
        }
    }

    /// Pointer value, if this is a pointer
    pub fn as_pointer(&self) -> Option<usize> {
        match self {
            Value::Pointer(p) => Some(*p),
            _ => None,
        }
    }

    /// Object handle; non-pointers decode as nil
    pub fn as_handle(&self) -> NativeHandle {
        NativeHandle::from_raw(self.as_pointer().unwrap_or(0))
    }

    /// Struct bytes, if this is a struct
    pub fn as_struct_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Struct(bytes) => Some(bytes),
            _ => None,
        }
    }
}

// ============================================================================
// Byte-level helpers
// ============================================================================

/// Write the low `scalar.size()` bytes of `bits` into `out` in native order.
///
/// Panics if `out` is shorter than the scalar.
pub fn store_bits(scalar: Scalar, bits: u64, out: &mut [u8]) {
    match scalar.size() {
        1 => out[0] = bits as u8,
        2 => out[..2].copy_from_slice(&(bits as u16).to_ne_bytes()),
        4 => out[..4].copy_from_slice(&(bits as u32).to_ne_bytes()),
        _ => out[..8].copy_from_slice(&bits.to_ne_bytes()),
    }
}

/// Read a scalar stored in native order, zero-extended to 64 bits.
///
/// Panics if `bytes` is shorter than the scalar.
pub fn load_bits(scalar: Scalar, bytes: &[u8]) -> u64 {
    match scalar.size() {
        1 => bytes[0] as u64,
        2 => u16::from_ne_bytes([bytes[0], bytes[1]]) as u64,
        4 => u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64,
        _ => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[..8]);
            u64::from_ne_bytes(raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_widths() {
        assert_eq!(Arg::Bool(true).width(), 1);
        assert_eq!(Arg::I16(-1).width(), 2);
        assert_eq!(Arg::F32(1.0).width(), 4);
        assert_eq!(Arg::F64(1.0).width(), 8);
        assert_eq!(Arg::nil().width(), std::mem::size_of::<usize>());
        let rect = StructLayout::of(&[Scalar::F64; 4]);
        let value = StructValue::new(rect, vec![0; 32]);
        assert_eq!(Arg::Struct(value).width(), 32);
    }

    #[test]
    fn test_register_classes() {
        assert_eq!(Arg::F64(0.5).register_class(), Some(RegisterClass::Float));
        assert_eq!(Arg::U64(7).register_class(), Some(RegisterClass::Integer));
        assert_eq!(
            Arg::CString(CString::new("x").unwrap()).register_class(),
            Some(RegisterClass::Integer)
        );
        let value = StructValue::new(StructLayout::of(&[Scalar::F64]), vec![0; 8]);
        assert_eq!(Arg::Struct(value).register_class(), None);
    }

    #[test]
    fn test_sign_handling() {
        let bits = Arg::I8(-2).bits().unwrap();
        assert_eq!(bits, 0xfe);
        assert_eq!(Value::from_bits(Scalar::I8, bits), Value::Int(-2));
        assert_eq!(Value::from_bits(Scalar::U8, bits), Value::UInt(0xfe));
    }

    #[test]
    fn test_float_bits() {
        let bits = Arg::F32(1.5).bits().unwrap();
        assert_eq!(Value::from_bits(Scalar::F32, bits), Value::Float(1.5));
        assert_eq!(Value::Float(2.25).to_bits(Scalar::F32), 2.25f32.to_bits() as u64);
        assert_eq!(Value::Int(3).to_bits(Scalar::F64), 3.0f64.to_bits());
    }

    #[test]
    fn test_to_bits_truncates() {
        assert_eq!(Value::UInt(0x1_0000_0001).to_bits(Scalar::U32), 1);
        assert_eq!(Value::Int(-1).to_bits(Scalar::U16), 0xffff);
        assert_eq!(Value::Pointer(0).to_bits(Scalar::Bool), 0);
    }

    #[test]
    fn test_store_and_load() {
        let mut buf = [0u8; 8];
        store_bits(Scalar::U16, 0xbeef, &mut buf);
        assert_eq!(load_bits(Scalar::U16, &buf), 0xbeef);
        assert_eq!(&buf[2..], &[0; 6]);
    }

    #[test]
    fn test_struct_consistency() {
        let layout = StructLayout::of(&[Scalar::F64, Scalar::F64]);
        assert!(StructValue::new(layout.clone(), vec![0; 16]).is_consistent());
        assert!(!StructValue::new(layout, vec![0; 8]).is_consistent());
        assert!(!StructValue::new(StructLayout::new(vec![]), vec![]).is_consistent());
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Pointer(0x20).as_handle(), NativeHandle::from_raw(0x20));
        assert!(Value::Int(5).as_handle().is_nil());
        assert_eq!(Value::Bool(true).as_u64(), 1);
        assert_eq!(Value::Float(2.9).as_i64(), 2);
        assert!(!Value::Void.as_bool());
    }
}
