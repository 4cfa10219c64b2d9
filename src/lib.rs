//! This serialization system is designed around the idea that a _schema_, a
//! specification for what values are permitted and how they're encoded as
//! raw bytes, is a data structure that can be manipulated programmatically
//! at runtime and is itself serializable under the same machinery used for
//! ordinary data. This can be used to achieve bincode-levels of efficiency,
//! protobuf levels of validation, and JSON levels of easy debugging. For
//! example, one could arrange a key/value store such that the store
//! contains, on-disk, the serialized schemas for the keys and the values.
//! Or, an RPC protocol could be designed such that, upon initialization, the
//! server sends down its list of endpoints and the serialized schemas for
//! their parameters and return types.
//!
//! Typical usage pattern:
//!
//! - create `CoderStateAlloc`
//! - to encode (serialize) a value:
//!     1. combine `&Schema` and `CoderStateAlloc` into `CoderState`
//!     2. combine `&mut CoderState` and `&mut W` where `W: Write` into `Encoder`
//!     3. pass `&mut Encoder` and the value into the procedure for encoding it
//!     4. on `CoderState`, call `.is_finished_or_err()?` to guarantee that
//!        valid schema-conformant data was fully written to `W`
//!     5. convert `CoderState` back into `CoderStateAlloc` so it can be reused
//! - to decode (deserialize) a value:
//!     1. combine `&Schema` and `CoderStateAlloc` into `CoderState`
//!     2. combine `&mut CoderState` and `&mut R` where `R: Read` into `Decoder`
//!     3. pass `&mut Decoder` into the procedure for decoding the value
//!     4. on `CoderState`, call `.is_finished_or_err()?` to guarantee that
//!        valid schema-conformant data was fully read from `R`, and no more
//!     5. convert `CoderState` back into `CoderStateAlloc` so it can be reused
//!
//! The data model supports:
//!
//! - `u8` through `u128`, `i8` through `i128` (32 bits and above are encoded
//!   variable length)
//! - `f32` and `f64`, `char`, `bool`
//! - utf8 string, byte string
//! - option
//! - fixed length sequence, variable length sequence
//! - tuple (just values back-to-back)
//! - struct (just values back-to-back, but at schema-time the fields have
//!   names)
//! - enum, as in rust-style enum, as in tagged union, as in "one of"
//! - recursing up in the schema, so as to support recursive schema types like
//!   trees
//!
//! [`Value`] is a dynamic, schema-agnostic representation of any value this
//! crate can encode or decode, analogous to `serde_json::Value`. Schemas
//! themselves encode to bytes by converting to a `Value` via
//! [`value::schema_to_value`] and running the value codec against
//! [`Schema::meta_schema`]; [`encode_schema`] and [`decode_schema`] do this
//! for you.


pub mod error;
pub mod value;

mod schema;
mod do_if_err;
mod var_len;
mod coder;
mod encoder;
mod decoder;

pub use crate::{
    coder::{
        coder::CoderState,
        coder_alloc::CoderStateAlloc,
    },
    encoder::Encoder,
    decoder::Decoder,
    schema::{
        Schema,
        ScalarType,
        SeqSchema,
        StructSchemaField,
        EnumSchemaVariant,
    },
    value::Value,
};


use crate::error::Result;
use std::io::{Write, Read};


/// Encode a value to a byte vec under a schema. Fails with
/// `ErrorKind::SchemaNonConformance` if `value` doesn't conform to `schema`,
/// or `ErrorKind::IllegalSchema` if `schema` contains an unresolvable
/// `Recurse`.
pub fn encode_value(schema: &Schema, value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let coder_alloc = CoderStateAlloc::new();
    let mut coder = CoderState::new(schema, coder_alloc, None);
    let mut encoder = Encoder::new(&mut coder, &mut out);
    value.encode_to(&mut encoder)?;
    coder.is_finished_or_err()?;
    Ok(out)
}

/// Decode a value from a byte source under a schema.
pub fn decode_value<R: Read>(schema: &Schema, read: &mut R) -> Result<Value> {
    let coder_alloc = CoderStateAlloc::new();
    let mut coder = CoderState::new(schema, coder_alloc, None);
    let mut decoder = Decoder::new(&mut coder, read);
    let value = Value::decode_from(&mut decoder)?;
    coder.is_finished_or_err()?;
    Ok(value)
}

/// Encode a schema to a byte vec, by encoding `value::schema_to_value(schema)`
/// under `Schema::meta_schema()`. See §4.5 of the format.
pub fn encode_schema(schema: &Schema) -> Result<Vec<u8>> {
    let meta = Schema::meta_schema();
    encode_value(&meta, &value::schema_to_value(schema))
}

/// Decode a schema from a byte source, the inverse of [`encode_schema`].
pub fn decode_schema<R: Read>(read: &mut R) -> Result<Schema> {
    let meta = Schema::meta_schema();
    let value = decode_value(&meta, read)?;
    value::value_to_schema(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{ScalarValue, StructValueField, EnumValue};

    #[test]
    fn bool_concrete_scenarios() {
        let s = schema!(bool);
        assert_eq!(encode_value(&s, &Value::Scalar(ScalarValue::Bool(true))).unwrap(), vec![0x01]);
        assert_eq!(encode_value(&s, &Value::Scalar(ScalarValue::Bool(false))).unwrap(), vec![0x00]);
        assert!(decode_value(&s, &mut &[0x02][..]).is_err());
    }

    #[test]
    fn str_concrete_scenarios() {
        let s = schema!(str);
        assert_eq!(encode_value(&s, &Value::Str("".into())).unwrap(), vec![0x00]);
        assert_eq!(
            encode_value(&s, &Value::Str("hi".into())).unwrap(),
            vec![0x02, b'h', b'i'],
        );
    }

    #[test]
    fn enum_ordinal_width_scenarios() {
        let s3 = schema!(enum { A(unit), B(unit), C(unit) });
        let v = Value::Enum(EnumValue {
            variant_ord: 1,
            variant_name: "B".into(),
            value: Box::new(Value::Unit),
        });
        assert_eq!(encode_value(&s3, &v).unwrap(), vec![0x01]);

        let variants_256: Vec<_> = (0..256)
            .map(|i| crate::EnumSchemaVariant::from((format!("V{i}"), schema!(unit))))
            .collect();
        let s256 = Schema::Enum(variants_256);
        let v255 = Value::Enum(EnumValue {
            variant_ord: 255,
            variant_name: "V255".into(),
            value: Box::new(Value::Unit),
        });
        assert_eq!(encode_value(&s256, &v255).unwrap().len(), 1);

        let variants_257: Vec<_> = (0..257)
            .map(|i| crate::EnumSchemaVariant::from((format!("V{i}"), schema!(unit))))
            .collect();
        let s257 = Schema::Enum(variants_257);
        let v256 = Value::Enum(EnumValue {
            variant_ord: 256,
            variant_name: "V256".into(),
            value: Box::new(Value::Unit),
        });
        assert_eq!(encode_value(&s257, &v256).unwrap().len(), 2);
    }

    /// `Enum{Branch{value: i32, next: Option(Recurse(2))}, Leaf}`-style
    /// linked list: `Struct { value: i32, next: Option(Recurse(2)) }`.
    fn linked_list_schema() -> Schema {
        schema!(struct {
            (value: i32),
            (next: option(recurse(2))),
        })
    }

    #[test]
    fn linked_list_concrete_scenario() {
        let s = linked_list_schema();
        // (value=7, next=some((value=8, next=none)))
        let v = Value::Struct(vec![
            StructValueField { name: "value".into(), value: Value::Scalar(ScalarValue::I32(7)) },
            StructValueField {
                name: "next".into(),
                value: Value::Option(Some(Box::new(Value::Struct(vec![
                    StructValueField { name: "value".into(), value: Value::Scalar(ScalarValue::I32(8)) },
                    StructValueField { name: "next".into(), value: Value::Option(None) },
                ])))),
            },
        ]);
        let bytes = encode_value(&s, &v).unwrap();
        assert_eq!(bytes, vec![0x07, 0x01, 0x08, 0x00]);
        let decoded = decode_value(&s, &mut bytes.as_slice()).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn meta_schema_concrete_scenarios() {
        assert_eq!(encode_schema(&schema!(u8)).unwrap(), vec![0x00, 0x00]);
        assert_eq!(encode_schema(&schema!(recurse(2))).unwrap(), vec![0x09, 0x02]);
    }

    #[test]
    fn schema_round_trips_through_meta_schema() {
        for s in [
            schema!(u8),
            schema!(str),
            schema!(option(bool)),
            linked_list_schema(),
            Schema::meta_schema(),
        ] {
            let bytes = encode_schema(&s).unwrap();
            let decoded = decode_schema(&mut bytes.as_slice()).unwrap();
            assert_eq!(decoded, s);
        }
    }

    #[test]
    fn value_round_trip_consumes_exact_bytes() {
        let s = schema!(struct {
            (a: u32),
            (b: seq(varlen)(str)),
        });
        let v = Value::Struct(vec![
            StructValueField { name: "a".into(), value: Value::Scalar(ScalarValue::U32(300)) },
            StructValueField {
                name: "b".into(),
                value: Value::VarLenSeq(vec![Value::Str("a".into()), Value::Str("bb".into())]),
            },
        ]);
        let bytes = encode_value(&s, &v).unwrap();
        let mut cursor = bytes.as_slice();
        let decoded = decode_value(&s, &mut cursor).unwrap();
        assert_eq!(decoded, v);
        assert!(cursor.is_empty(), "decoder must consume exactly the encoded bytes");
    }

    #[test]
    fn fixed_len_seq_arity_mismatch_rejected() {
        let s = schema!(seq(3)(u8));
        let v = Value::FixedLenSeq(vec![
            Value::Scalar(ScalarValue::U8(1)),
            Value::Scalar(ScalarValue::U8(2)),
        ]);
        assert!(encode_value(&s, &v).is_err());
    }

    #[test]
    fn illegal_recurse_is_rejected() {
        // Recurse(0) is always illegal.
        let s = schema!(recurse(0));
        assert!(encode_value(&s, &Value::Unit).is_err());

        // Recurse(1) at the root has no ancestor.
        let s = Schema::Recurse(1);
        assert!(encode_value(&s, &Value::Unit).is_err());
    }

    #[test]
    fn zero_variant_enum_cannot_encode() {
        let s = Schema::Enum(vec![]);
        // There's no legal Value to pass; any enum value is non-conforming.
        let v = Value::Enum(EnumValue {
            variant_ord: 0,
            variant_name: "X".into(),
            value: Box::new(Value::Unit),
        });
        assert!(encode_value(&s, &v).is_err());
    }
}
