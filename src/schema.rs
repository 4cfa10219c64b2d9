//! Data types for representing a schema, and the macro for constructing them
//! with syntactic sugar.


/// Description of how raw binary data encodes less tedious structures of
/// semantic primitives.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Schema {
    /// Some scalar data type.
    Scalar(ScalarType),
    /// Utf8 string.
    Str,
    /// Byte string.
    Bytes,
    /// Unit (0 bytes).
    Unit,
    /// Option (some or none).
    Option(Box<Schema>),
    /// Homogenous sequence. May be fixed or variable length.
    Seq(SeqSchema),
    /// Heterogenous fixed-length sequence.
    Tuple(Vec<Schema>),
    /// Sequence of fields with names and ordinals.
    Struct(Vec<StructSchemaField>),
    /// Tagged union of variants with names and ordinals.
    Enum(Vec<EnumSchemaVariant>),
    /// Recurse type. This allows a schema to be self-referential.
    ///
    /// Represents a reference to the type n layers above self in the schema
    /// tree. So for eg, a binary search tree could be represented as:
    ///
    /// ```
    /// use binschema::{Schema, ScalarType};
    ///
    /// Schema::Enum(vec![
    ///     ("Branch", Schema::Struct(vec![
    ///         ("left", Schema::Recurse(2)).into(),
    ///         ("right", Schema::Recurse(2)).into(),
    ///     ])).into(),
    ///     ("Leaf", Schema::Scalar(ScalarType::I32)).into(),
    /// ]);
    /// ```
    ///
    /// `Recurse(0)` would recurse to itself, but it is illegal, as attempting
    /// to resolve leads to an infinite loop.
    Recurse(usize),
}

#[macro_export]
macro_rules! schema {
    (u8)=>{ $crate::Schema::Scalar($crate::ScalarType::U8) };
    (u16)=>{ $crate::Schema::Scalar($crate::ScalarType::U16) };
    (u32)=>{ $crate::Schema::Scalar($crate::ScalarType::U32) };
    (u64)=>{ $crate::Schema::Scalar($crate::ScalarType::U64) };
    (u128)=>{ $crate::Schema::Scalar($crate::ScalarType::U128) };
    (i8)=>{ $crate::Schema::Scalar($crate::ScalarType::I8) };
    (i16)=>{ $crate::Schema::Scalar($crate::ScalarType::I16) };
    (i32)=>{ $crate::Schema::Scalar($crate::ScalarType::I32) };
    (i64)=>{ $crate::Schema::Scalar($crate::ScalarType::I64) };
    (i128)=>{ $crate::Schema::Scalar($crate::ScalarType::I128) };
    (f32)=>{ $crate::Schema::Scalar($crate::ScalarType::F32) };
    (f64)=>{ $crate::Schema::Scalar($crate::ScalarType::F64) };
    (char)=>{ $crate::Schema::Scalar($crate::ScalarType::Char) };
    (bool)=>{ $crate::Schema::Scalar($crate::ScalarType::Bool) };
    (str)=>{ $crate::Schema::Str };
    (bytes)=>{ $crate::Schema::Bytes };
    (unit)=>{ $crate::Schema::Unit };
    (option($($inner:tt)*))=>{ $crate::Schema::Option(::std::boxed::Box::new($crate::schema!($($inner)*))) };
    (seq(varlen)($($inner:tt)*))=>{ $crate::Schema::Seq($crate::SeqSchema { len: ::core::option::Option::None, inner: ::std::boxed::Box::new($crate::schema!($($inner)*)) }) };
    (seq($len:expr)($($inner:tt)*))=>{ $crate::Schema::Seq($crate::SeqSchema { len: ::core::option::Option::Some($len), inner: ::std::boxed::Box::new($crate::schema!($($inner)*)) }) };
    (tuple { $(($($item:tt)*)),*$(,)? })=>{ $crate::Schema::Tuple(::std::vec![$( $crate::schema!($($item)*), )*]) };
    (struct { $(($name:ident: $($field:tt)*)),*$(,)? })=>{ $crate::Schema::Struct(::std::vec![$( $crate::StructSchemaField { name: ::std::string::String::from(::core::stringify!($name)), inner: $crate::schema!($($field)*) }, )*]) };
    (enum { $($name:ident($($variant:tt)*)),*$(,)? })=>{ $crate::Schema::Enum(::std::vec![$( $crate::EnumSchemaVariant { name: ::std::string::String::from(::core::stringify!($name)), inner: $crate::schema!($($variant)*) }, )*]) };
    (recurse($n:expr))=>{ $crate::Schema::Recurse($n) };
    (%$schema:expr)=>{ $schema };
}

pub use schema;

impl Schema {
    pub(crate) fn non_recursive_display_str(&self) -> &'static str {
        match self {
            Schema::Scalar(st) => st.display_str(),
            Schema::Str => "str",
            Schema::Bytes => "bytes",
            Schema::Unit => "unit",
            Schema::Option(_) => "option(..)",
            Schema::Seq(_) => "seq(..)(..)",
            Schema::Tuple(_) => "tuple {..}",
            Schema::Struct(_) => "struct {..}",
            Schema::Enum(_) => "enum {..}",
            Schema::Recurse(_) => "recurse(_)",
        }
    }

    /// The fixed schema whose values are themselves schemas (§4.5). Encoding
    /// a `Schema` is done by running the value codec with this schema as the
    /// schema and `schema_to_value(schema)` as the value; see
    /// [`crate::encode_schema`] and [`crate::decode_schema`].
    ///
    /// Variant order is part of the wire format and must not change:
    /// `Scalar, Str, Bytes, Unit, Option, Seq, Tuple, Struct, Enum, Recurse`.
    pub fn meta_schema() -> Schema {
        schema!(enum {
            Scalar(enum {
                U8(unit),
                U16(unit),
                U32(unit),
                U64(unit),
                U128(unit),
                I8(unit),
                I16(unit),
                I32(unit),
                I64(unit),
                I128(unit),
                F32(unit),
                F64(unit),
                Char(unit),
                Bool(unit),
            }),
            Str(unit),
            Bytes(unit),
            Unit(unit),
            Option(recurse(1)),
            Seq(struct {
                (len: option(u64)),
                (inner: recurse(2)),
            }),
            Tuple(seq(varlen)(recurse(2))),
            Struct(seq(varlen)(struct {
                (name: str),
                (inner: recurse(3)),
            })),
            Enum(seq(varlen)(struct {
                (name: str),
                (inner: recurse(3)),
            })),
            Recurse(u64),
        })
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ScalarType {
    /// Encoded as-is.
    U8,
    /// Encoded little-endian.
    U16,
    /// Encoded var len.
    U32,
    /// Encoded var len.
    U64,
    /// Encoded var len.
    U128,
    /// Encoded as-is.
    I8,
    /// Encoded little-endian.
    I16,
    /// Encoded var len.
    I32,
    /// Encoded var len.
    I64,
    /// Encoded var len.
    I128,
    /// Encoded little-endian.
    F32,
    /// Encoded little-endian.
    F64,
    Char,
    /// Encoded as 1 byte, 0 or 1.
    Bool,
}

impl ScalarType {
    fn display_str(self) -> &'static str {
        match self {
            ScalarType::U8 => "u8",
            ScalarType::U16 => "u16",
            ScalarType::U32 => "u32",
            ScalarType::U64 => "u64",
            ScalarType::U128 => "u128",
            ScalarType::I8 => "i8",
            ScalarType::I16 => "i16",
            ScalarType::I32 => "i32",
            ScalarType::I64 => "i64",
            ScalarType::I128 => "i128",
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
            ScalarType::Char => "char",
            ScalarType::Bool => "bool",
        }
    }

    /// All 14 scalar types, in the ordinal order fixed by the meta-schema.
    pub(crate) const ALL: [ScalarType; 14] = [
        ScalarType::U8,
        ScalarType::U16,
        ScalarType::U32,
        ScalarType::U64,
        ScalarType::U128,
        ScalarType::I8,
        ScalarType::I16,
        ScalarType::I32,
        ScalarType::I64,
        ScalarType::I128,
        ScalarType::F32,
        ScalarType::F64,
        ScalarType::Char,
        ScalarType::Bool,
    ];
}

/// Value in `Schema::Seq`.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SeqSchema {
    pub len: Option<usize>,
    pub inner: Box<Schema>,
}

/// Item in `Schema::Struct`.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct StructSchemaField {
    pub name: String,
    pub inner: Schema,
}

impl<S: Into<String>> From<(S, Schema)> for StructSchemaField {
    fn from((name, inner): (S, Schema)) -> Self {
        StructSchemaField {
            name: name.into(),
            inner,
        }
    }
}

/// Item in `Schema::Enum`.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct EnumSchemaVariant {
    pub name: String,
    pub inner: Schema,
}

impl<S: Into<String>> From<(S, Schema)> for EnumSchemaVariant {
    fn from((name, inner): (S, Schema)) -> Self {
        EnumSchemaVariant {
            name: name.into(),
            inner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_schema_outer_enum_has_ten_variants() {
        match Schema::meta_schema() {
            Schema::Enum(variants) => assert_eq!(variants.len(), 10),
            _ => panic!("meta-schema is not an enum"),
        }
    }

    #[test]
    fn scalar_macro_matches_scalar_type() {
        assert_eq!(schema!(u8), Schema::Scalar(ScalarType::U8));
        assert_eq!(schema!(bool), Schema::Scalar(ScalarType::Bool));
    }

    #[test]
    fn recurse_macro() {
        assert_eq!(schema!(recurse(2)), Schema::Recurse(2));
    }
}
