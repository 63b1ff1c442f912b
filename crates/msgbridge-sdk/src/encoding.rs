//! Method type encodings
//!
//! Parses the compact type strings the foreign runtime uses to describe a
//! method: return type first, then the receiver, the selector, and the
//! explicit arguments. `"v@:"` is a method taking no arguments and returning
//! nothing; `"B@:@"` takes one object and returns a boolean. Stack offsets and
//! type qualifiers are accepted and ignored.

use crate::types::{Field, ResultShape, Scalar, StructLayout};

/// Errors while parsing a type encoding
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    /// The encoding string was empty
    #[error("empty type encoding")]
    Empty,

    /// The encoding ended in the middle of a type
    #[error("unexpected end of type encoding '{0}'")]
    UnexpectedEnd(String),

    /// A type code the bridge cannot marshal
    #[error("unsupported type code '{code}' in '{encoding}'")]
    Unsupported {
        /// Offending code
        code: char,
        /// Full encoding
        encoding: String,
    },

    /// A struct with no fields
    #[error("empty struct in '{0}'")]
    EmptyStruct(String),

    /// A method encoding without receiver and selector
    #[error("method encoding '{0}' lacks receiver and selector")]
    MissingImplicitArguments(String),
}

/// One decoded type code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeCode {
    /// `v`
    Void,
    /// Numeric and boolean codes
    Scalar(Scalar),
    /// `@`
    Object,
    /// `#`
    Class,
    /// `:`
    Selector,
    /// `*`
    CString,
    /// `^type` and `?`
    Pointer,
    /// `{Name=...}`
    Struct(StructLayout),
}

impl TypeCode {
    /// ABI field description, `None` for `Void`
    pub fn field(&self) -> Option<Field> {
        match self {
            TypeCode::Void => None,
            TypeCode::Scalar(s) => Some(Field::Scalar(*s)),
            TypeCode::Struct(layout) => Some(Field::Struct(layout.clone())),
            _ => Some(Field::Scalar(Scalar::Pointer)),
        }
    }

    /// Result shape for this code in return position
    pub fn result_shape(&self) -> ResultShape {
        match self.field() {
            None => ResultShape::Void,
            Some(Field::Scalar(s)) => ResultShape::Scalar(s),
            Some(Field::Struct(layout)) => ResultShape::Struct(layout),
        }
    }
}

/// Parsed method signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    encoding: String,
    ret: TypeCode,
    args: Vec<TypeCode>,
}

impl MethodSignature {
    /// Parse a method encoding. The first two arguments must be the receiver
    /// (`@`) and the selector (`:`).
    pub fn parse(encoding: &str) -> Result<Self, EncodingError> {
        let mut types = parse_types(encoding)?;
        if types.len() < 3 || types[1] != TypeCode::Object || types[2] != TypeCode::Selector {
            return Err(EncodingError::MissingImplicitArguments(encoding.to_string()));
        }
        let ret = types.remove(0);
        Ok(Self {
            encoding: encoding.to_string(),
            ret,
            args: types,
        })
    }

    /// Encoding string as given
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Return type
    pub fn ret(&self) -> &TypeCode {
        &self.ret
    }

    /// All arguments, including receiver and selector
    pub fn args(&self) -> &[TypeCode] {
        &self.args
    }

    /// Arguments after receiver and selector
    pub fn explicit_args(&self) -> &[TypeCode] {
        &self.args[2..]
    }
}

/// Parse a sequence of type codes with no method structure imposed.
pub fn parse_types(encoding: &str) -> Result<Vec<TypeCode>, EncodingError> {
    if encoding.is_empty() {
        return Err(EncodingError::Empty);
    }
    let mut parser = Parser {
        encoding,
        chars: encoding.chars().collect(),
        pos: 0,
    };
    let mut types = Vec::new();
    while parser.skip_noise() {
        types.push(parser.parse_one()?);
    }
    Ok(types)
}

struct Parser<'a> {
    encoding: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl Parser<'_> {
    /// Skip qualifiers and offsets; false at end of input
    fn skip_noise(&mut self) -> bool {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || matches!(c, 'r' | 'n' | 'N' | 'o' | 'O' | 'R' | 'V' | 'A') {
                self.pos += 1;
            } else {
                return true;
            }
        }
        false
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn next(&mut self) -> Result<char, EncodingError> {
        let c = self
            .peek()
            .ok_or_else(|| EncodingError::UnexpectedEnd(self.encoding.to_string()))?;
        self.pos += 1;
        Ok(c)
    }

    fn unsupported(&self, code: char) -> EncodingError {
        EncodingError::Unsupported {
            code,
            encoding: self.encoding.to_string(),
        }
    }

    fn parse_one(&mut self) -> Result<TypeCode, EncodingError> {
        if !self.skip_noise() {
            return Err(EncodingError::UnexpectedEnd(self.encoding.to_string()));
        }
        let code = self.next()?;
        let ty = match code {
            'v' => TypeCode::Void,
            'B' => TypeCode::Scalar(Scalar::Bool),
            'c' => TypeCode::Scalar(Scalar::I8),
            'C' => TypeCode::Scalar(Scalar::U8),
            's' => TypeCode::Scalar(Scalar::I16),
            'S' => TypeCode::Scalar(Scalar::U16),
            'i' | 'l' => TypeCode::Scalar(Scalar::I32),
            'I' | 'L' => TypeCode::Scalar(Scalar::U32),
            'q' => TypeCode::Scalar(Scalar::I64),
            'Q' => TypeCode::Scalar(Scalar::U64),
            'f' => TypeCode::Scalar(Scalar::F32),
            'd' => TypeCode::Scalar(Scalar::F64),
            '*' => TypeCode::CString,
            '#' => TypeCode::Class,
            ':' => TypeCode::Selector,
            '?' => TypeCode::Pointer,
            '@' => {
                match self.peek() {
                    // block
                    Some('?') => self.pos += 1,
                    // @"ClassName"
                    Some('"') => {
                        self.pos += 1;
                        while self.next()? != '"' {}
                    }
                    _ => {}
                }
                TypeCode::Object
            }
            '^' => {
                // pointee layout is irrelevant behind a pointer, and may be opaque
                match self.peek() {
                    Some('{') => self.skip_aggregate('{', '}')?,
                    Some('(') => self.skip_aggregate('(', ')')?,
                    _ => {
                        self.parse_one()?;
                    }
                }
                TypeCode::Pointer
            }
            '{' => self.parse_struct()?,
            other => return Err(self.unsupported(other)),
        };
        Ok(ty)
    }

    /// Consume a bracketed aggregate, including nested ones, without
    /// decoding its fields.
    fn skip_aggregate(&mut self, open: char, close: char) -> Result<(), EncodingError> {
        let mut depth = 0usize;
        loop {
            match self.next()? {
                '"' => while self.next()? != '"' {},
                c if c == open => depth += 1,
                c if c == close => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }

    fn parse_struct(&mut self) -> Result<TypeCode, EncodingError> {
        // struct name up to '='; an opaque struct cannot be passed by value
        loop {
            match self.next()? {
                '=' => break,
                '}' => return Err(EncodingError::EmptyStruct(self.encoding.to_string())),
                _ => {}
            }
        }
        let mut fields = Vec::new();
        loop {
            if self.peek() == Some('}') {
                self.pos += 1;
                break;
            }
            match self.parse_one()? {
                TypeCode::Void => return Err(self.unsupported('v')),
                other => {
                    if let Some(field) = other.field() {
                        fields.push(field);
                    }
                }
            }
        }
        if fields.is_empty() {
            return Err(EncodingError::EmptyStruct(self.encoding.to_string()));
        }
        Ok(TypeCode::Struct(StructLayout::new(fields)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_method() {
        let sig = MethodSignature::parse("v@:").unwrap();
        assert_eq!(sig.ret(), &TypeCode::Void);
        assert_eq!(sig.args(), &[TypeCode::Object, TypeCode::Selector]);
        assert!(sig.explicit_args().is_empty());
    }

    #[test]
    fn test_bool_and_object_args() {
        let sig = MethodSignature::parse("B@:@").unwrap();
        assert_eq!(sig.ret(), &TypeCode::Scalar(Scalar::Bool));
        assert_eq!(sig.explicit_args(), &[TypeCode::Object]);
    }

    #[test]
    fn test_offsets_ignored() {
        let sig = MethodSignature::parse("Q24@0:8@16").unwrap();
        assert_eq!(sig.ret(), &TypeCode::Scalar(Scalar::U64));
        assert_eq!(sig.explicit_args(), &[TypeCode::Object]);
    }

    #[test]
    fn test_rect_struct() {
        let sig = MethodSignature::parse("v@:{CGRect={CGPoint=dd}{CGSize=dd}}").unwrap();
        let layout = match &sig.explicit_args()[0] {
            TypeCode::Struct(layout) => layout.clone(),
            other => panic!("expected struct, got {:?}", other),
        };
        assert_eq!(layout.size(), 32);
        assert_eq!(layout.fields().len(), 2);
    }

    #[test]
    fn test_pointer_and_qualifiers() {
        let types = parse_types("r^{Opaque=i}@\"NSString\"@?").unwrap();
        assert_eq!(types, vec![TypeCode::Pointer, TypeCode::Object, TypeCode::Object]);

        // opaque CoreFoundation-style references
        let sig = MethodSignature::parse("v@:^{CGContext=}").unwrap();
        assert_eq!(sig.explicit_args(), &[TypeCode::Pointer]);
        let sig = MethodSignature::parse("@@:^{_NSZone=}").unwrap();
        assert_eq!(sig.ret(), &TypeCode::Object);
        assert_eq!(sig.explicit_args(), &[TypeCode::Pointer]);
        let sig = MethodSignature::parse("v@:^{__CFString}").unwrap();
        assert_eq!(sig.explicit_args(), &[TypeCode::Pointer]);

        let types = parse_types("^^{__CFArray}^{Outer={Inner=}i}^(U=if)q").unwrap();
        assert_eq!(
            types,
            vec![
                TypeCode::Pointer,
                TypeCode::Pointer,
                TypeCode::Pointer,
                TypeCode::Scalar(Scalar::I64)
            ]
        );
    }

    #[test]
    fn test_long_is_32_bit() {
        let types = parse_types("lL").unwrap();
        assert_eq!(
            types,
            vec![TypeCode::Scalar(Scalar::I32), TypeCode::Scalar(Scalar::U32)]
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse_types(""), Err(EncodingError::Empty));
        assert!(matches!(
            parse_types("(U=i)"),
            Err(EncodingError::Unsupported { code: '(', .. })
        ));
        assert!(matches!(parse_types("{S=}"), Err(EncodingError::EmptyStruct(_))));
        assert!(matches!(parse_types("{S=i"), Err(EncodingError::UnexpectedEnd(_))));
        assert!(matches!(
            MethodSignature::parse("v@"),
            Err(EncodingError::MissingImplicitArguments(_))
        ));
    }

    #[test]
    fn test_result_shape() {
        assert_eq!(TypeCode::Void.result_shape(), ResultShape::Void);
        assert_eq!(TypeCode::Object.result_shape(), ResultShape::POINTER);
        assert_eq!(
            TypeCode::Scalar(Scalar::F64).result_shape(),
            ResultShape::Scalar(Scalar::F64)
        );
    }
}
