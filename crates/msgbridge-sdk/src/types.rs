//! Handles, scalar kinds, and struct layouts
//!
//! These types describe values at the ABI level: what a foreign identity is,
//! how wide a scalar is, which register class it travels in, and how a C
//! struct is laid out in memory.

use std::fmt;

// ============================================================================
// Handles
// ============================================================================

/// Opaque identity of a class, object, or function inside the foreign runtime.
///
/// Equality is identity equality. The zero handle is `nil`.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct NativeHandle(usize);

impl NativeHandle {
    /// The nil handle
    pub const NIL: NativeHandle = NativeHandle(0);

    /// Wrap a raw address
    #[inline]
    pub const fn from_raw(raw: usize) -> Self {
        NativeHandle(raw)
    }

    /// Raw address value
    #[inline]
    pub const fn as_raw(self) -> usize {
        self.0
    }

    /// True for the nil handle
    #[inline]
    pub const fn is_nil(self) -> bool {
        self.0 == 0
    }

    /// `None` for nil, `Some(self)` otherwise
    #[inline]
    pub fn non_nil(self) -> Option<Self> {
        if self.is_nil() {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Interned operation name (selector).
///
/// Selectors are content-addressed: registering the same name twice yields
/// the same value.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Sel(usize);

impl Sel {
    /// Wrap a raw selector value
    #[inline]
    pub const fn from_raw(raw: usize) -> Self {
        Sel(raw)
    }

    /// Raw selector value
    #[inline]
    pub const fn as_raw(self) -> usize {
        self.0
    }

    /// True for the null selector
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

// ============================================================================
// Scalars
// ============================================================================

/// CPU register class an argument or result travels in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RegisterClass {
    /// General purpose registers (integers, pointers, booleans)
    Integer,
    /// Floating point / vector registers
    Float,
}

/// Scalar C types understood by the bridge.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Scalar {
    /// C99 `bool` / one-byte `BOOL`
    Bool,
    /// `int8_t` / `char`
    I8,
    /// `uint8_t`
    U8,
    /// `int16_t`
    I16,
    /// `uint16_t`
    U16,
    /// `int32_t`
    I32,
    /// `uint32_t`
    U32,
    /// `int64_t` / `NSInteger`
    I64,
    /// `uint64_t` / `NSUInteger`
    U64,
    /// `float`
    F32,
    /// `double` / `CGFloat`
    F64,
    /// Any pointer-sized opaque value (objects, classes, selectors, C strings)
    Pointer,
}

impl Scalar {
    /// Size in bytes
    pub const fn size(self) -> usize {
        match self {
            Scalar::Bool | Scalar::I8 | Scalar::U8 => 1,
            Scalar::I16 | Scalar::U16 => 2,
            Scalar::I32 | Scalar::U32 | Scalar::F32 => 4,
            Scalar::I64 | Scalar::U64 | Scalar::F64 => 8,
            Scalar::Pointer => std::mem::size_of::<usize>(),
        }
    }

    /// Natural alignment in bytes
    pub const fn align(self) -> usize {
        self.size()
    }

    /// Register class used by the C calling convention
    pub const fn register_class(self) -> RegisterClass {
        match self {
            Scalar::F32 | Scalar::F64 => RegisterClass::Float,
            _ => RegisterClass::Integer,
        }
    }

    /// True for signed integer kinds
    pub const fn is_signed(self) -> bool {
        matches!(self, Scalar::I8 | Scalar::I16 | Scalar::I32 | Scalar::I64)
    }
}

// ============================================================================
// Struct layouts
// ============================================================================

/// One field of a C struct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    /// Scalar field
    Scalar(Scalar),
    /// Nested struct field
    Struct(StructLayout),
}

impl Field {
    /// Size in bytes
    pub fn size(&self) -> usize {
        match self {
            Field::Scalar(s) => s.size(),
            Field::Struct(layout) => layout.size(),
        }
    }

    /// Alignment in bytes
    pub fn align(&self) -> usize {
        match self {
            Field::Scalar(s) => s.align(),
            Field::Struct(layout) => layout.align(),
        }
    }
}

impl From<Scalar> for Field {
    fn from(scalar: Scalar) -> Self {
        Field::Scalar(scalar)
    }
}

impl From<StructLayout> for Field {
    fn from(layout: StructLayout) -> Self {
        Field::Struct(layout)
    }
}

/// Memory layout of a C struct, following the platform C layout rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructLayout {
    fields: Vec<Field>,
}

impl StructLayout {
    /// Build a layout from its fields
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Build a layout of scalar fields
    pub fn of(scalars: &[Scalar]) -> Self {
        Self {
            fields: scalars.iter().copied().map(Field::Scalar).collect(),
        }
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// True when the struct has no fields (not expressible in C)
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Alignment: the largest field alignment
    pub fn align(&self) -> usize {
        self.fields.iter().map(Field::align).max().unwrap_or(1)
    }

    /// Byte offset of every field
    pub fn offsets(&self) -> Vec<usize> {
        let mut offset = 0;
        let mut offsets = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            offset = align_up(offset, field.align());
            offsets.push(offset);
            offset += field.size();
        }
        offsets
    }

    /// Total size including tail padding
    pub fn size(&self) -> usize {
        let end = match (self.offsets().last(), self.fields.last()) {
            (Some(offset), Some(field)) => offset + field.size(),
            _ => 0,
        };
        align_up(end, self.align())
    }
}

fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

// ============================================================================
// Result shapes
// ============================================================================

/// Expected shape of an invocation result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResultShape {
    /// No result
    Void,
    /// A single scalar
    Scalar(Scalar),
    /// A struct returned by value
    Struct(StructLayout),
}

impl ResultShape {
    /// Pointer-sized result
    pub const POINTER: ResultShape = ResultShape::Scalar(Scalar::Pointer);

    /// Size in bytes of the result value
    pub fn size(&self) -> usize {
        match self {
            ResultShape::Void => 0,
            ResultShape::Scalar(s) => s.size(),
            ResultShape::Struct(layout) => layout.size(),
        }
    }

    /// True when the result fits a single general purpose register
    pub fn fits_register(&self) -> bool {
        self.size() <= std::mem::size_of::<u64>()
    }

    /// True for struct results
    pub fn is_struct(&self) -> bool {
        matches!(self, ResultShape::Struct(_))
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// `CGPoint` / `NSPoint`
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct NSPoint {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

/// `CGSize` / `NSSize`
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct NSSize {
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

/// `CGRect` / `NSRect`
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct NSRect {
    /// Origin (bottom-left in AppKit coordinates)
    pub origin: NSPoint,
    /// Extent
    pub size: NSSize,
}

impl NSPoint {
    /// Create a point
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl NSSize {
    /// Create a size
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl NSRect {
    /// Create a rect from origin and extent
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: NSPoint::new(x, y),
            size: NSSize::new(width, height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_nil() {
        assert!(NativeHandle::NIL.is_nil());
        assert_eq!(NativeHandle::from_raw(0x10).non_nil(), Some(NativeHandle::from_raw(0x10)));
        assert_eq!(NativeHandle::NIL.non_nil(), None);
    }

    #[test]
    fn test_register_class() {
        assert_eq!(Scalar::F64.register_class(), RegisterClass::Float);
        assert_eq!(Scalar::F32.register_class(), RegisterClass::Float);
        assert_eq!(Scalar::Pointer.register_class(), RegisterClass::Integer);
        assert_eq!(Scalar::Bool.register_class(), RegisterClass::Integer);
    }

    #[test]
    fn test_rect_layout_matches_repr_c() {
        let point = StructLayout::of(&[Scalar::F64, Scalar::F64]);
        let rect = StructLayout::new(vec![point.clone().into(), point.into()]);
        assert_eq!(rect.size(), std::mem::size_of::<NSRect>());
        assert_eq!(rect.align(), std::mem::align_of::<NSRect>());
        assert_eq!(rect.offsets(), vec![0, 16]);
    }

    #[test]
    fn test_padding() {
        let layout = StructLayout::of(&[Scalar::U8, Scalar::F64, Scalar::U16]);
        assert_eq!(layout.offsets(), vec![0, 8, 16]);
        assert_eq!(layout.size(), 24);
        assert_eq!(layout.align(), 8);
    }

    #[test]
    fn test_result_shape_register_fit() {
        assert!(ResultShape::Void.fits_register());
        assert!(ResultShape::POINTER.fits_register());
        assert!(ResultShape::Struct(StructLayout::of(&[Scalar::F32, Scalar::F32])).fits_register());
        assert!(!ResultShape::Struct(StructLayout::of(&[Scalar::F64, Scalar::F64])).fits_register());
    }
}
