//! Dynamic representation of data within the serialized data model, analogous
//! to `serde_json::Value`. This is the type that [`crate::encode_value`] and
//! [`crate::decode_value`] operate on, and it is also what schemas themselves
//! are converted to/from when they are encoded under the meta-schema (see
//! [`schema_to_value`] and [`value_to_schema`]).

use crate::{
    error::{
        Result,
        Error,
        bail,
    },
    schema::{
        Schema,
        ScalarType,
        SeqSchema,
    },
    Encoder,
    Decoder,
};
use std::io::{
    Write,
    Read,
};


/// Upper bound on how many elements are pre-reserved based on a var-len
/// seq's declared count, which is read from the payload and therefore
/// attacker-controlled. The rest of the capacity is grown incrementally via
/// `Vec::push` as elements are actually decoded, rather than allocated
/// up front from an untrusted length.
const MAX_SEQ_PREALLOC: usize = 4096;


#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum Value {
    Scalar(ScalarValue),
    Str(String),
    Bytes(Vec<u8>),
    Unit,
    Option(Option<Box<Value>>),
    FixedLenSeq(Vec<Value>),
    VarLenSeq(Vec<Value>),
    Tuple(Vec<Value>),
    Struct(Vec<StructValueField>),
    Enum(EnumValue),
}

#[derive(Debug, Copy, Clone, PartialEq, PartialOrd)]
pub enum ScalarValue {
    U8(u8), U16(u16), U32(u32), U64(u64), U128(u128),
    I8(i8), I16(i16), I32(i32), I64(i64), I128(i128),
    F32(f32), F64(f64),
    Char(char),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct StructValueField {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct EnumValue {
    pub variant_ord: usize,
    pub variant_name: String,
    pub value: Box<Value>,
}


impl Value {
    pub fn encode_to<W: Write>(&self, e: &mut Encoder<W>) -> Result<()> {
        match self {
            &Value::Scalar(s) => s.encode_to(e),
            &Value::Str(ref s) => e.encode_str(s),
            &Value::Bytes(ref b) => e.encode_bytes(b),
            &Value::Unit => e.encode_unit(),
            &Value::Option(None) => e.encode_none(),
            &Value::Option(Some(ref value)) => {
                e.begin_some()?;
                value.encode_to(e)
            }
            &Value::FixedLenSeq(ref elems) => {
                e.begin_fixed_len_seq(elems.len())?;
                for elem in elems {
                    e.begin_seq_elem()?;
                    elem.encode_to(e)?;
                }
                e.finish_seq()
            }
            &Value::VarLenSeq(ref elems) => {
                e.begin_var_len_seq(elems.len())?;
                for elem in elems {
                    e.begin_seq_elem()?;
                    elem.encode_to(e)?;
                }
                e.finish_seq()
            }
            &Value::Tuple(ref elems) => {
                e.begin_tuple()?;
                for elem in elems {
                    e.begin_tuple_elem()?;
                    elem.encode_to(e)?;
                }
                e.finish_tuple()
            }
            &Value::Struct(ref fields) => {
                e.begin_struct()?;
                for field in fields {
                    e.begin_struct_field(&field.name)?;
                    field.value.encode_to(e)?;
                }
                e.finish_struct()
            }
            &Value::Enum(EnumValue {
                variant_ord,
                ref variant_name,
                ref value,
            }) => {
                e.begin_enum(variant_ord, variant_name)?;
                value.encode_to(e)
            }
        }
    }

    pub fn decode_from<R: Read>(d: &mut Decoder<R>) -> Result<Self> {
        Ok(match d.need()? {
            &Schema::Scalar(scalar_type) =>
                Value::Scalar(ScalarValue::decode_from(d, scalar_type)?),
            &Schema::Str => Value::Str(d.decode_str()?),
            &Schema::Bytes => Value::Bytes(d.decode_bytes()?),
            &Schema::Unit => {
                d.decode_unit()?;
                Value::Unit
            }
            &Schema::Option(_) => {
                if d.begin_option()? {
                    let inner = Value::decode_from(d)?;
                    Value::Option(Some(Box::new(inner)))
                } else {
                    Value::Option(None)
                }
            }
            &Schema::Seq(SeqSchema {
                len: Some(len),
                inner: _,
            }) => {
                d.begin_fixed_len_seq(len)?;
                let mut elems = Vec::with_capacity(len);
                for _ in 0..len {
                    d.begin_seq_elem()?;
                    elems.push(Value::decode_from(d)?);
                }
                d.finish_seq()?;
                Value::FixedLenSeq(elems)
            }
            &Schema::Seq(SeqSchema {
                len: None,
                inner: _,
            }) => {
                let len = d.begin_var_len_seq()?;
                let mut elems = Vec::with_capacity(len.min(MAX_SEQ_PREALLOC));
                for _ in 0..len {
                    d.begin_seq_elem()?;
                    elems.push(Value::decode_from(d)?);
                }
                d.finish_seq()?;
                Value::VarLenSeq(elems)
            }
            &Schema::Tuple(ref inner_schemas) => {
                d.begin_tuple()?;
                let mut elems = Vec::with_capacity(inner_schemas.len());
                for _ in 0..inner_schemas.len() {
                    d.begin_tuple_elem()?;
                    elems.push(Value::decode_from(d)?);
                }
                d.finish_tuple()?;
                Value::Tuple(elems)
            }
            &Schema::Struct(ref schema_fields) => {
                d.begin_struct()?;
                let mut fields = Vec::with_capacity(schema_fields.len());
                for schema_field in schema_fields {
                    d.begin_struct_field(&schema_field.name)?;
                    fields.push(StructValueField {
                        name: schema_field.name.clone(),
                        value: Value::decode_from(d)?,
                    });
                }
                d.finish_struct()?;
                Value::Struct(fields)
            }
            &Schema::Enum(ref variants) => {
                let variant_ord = d.begin_enum()?;
                let variant = &variants[variant_ord];
                d.begin_enum_variant(&variant.name)?;
                let inner = Value::decode_from(d)?;
                Value::Enum(EnumValue {
                    variant_ord,
                    variant_name: variant.name.clone(),
                    value: Box::new(inner),
                })
            }
            &Schema::Recurse(_) => unreachable!(),
        })
    }
}

impl ScalarValue {
    pub fn encode_to<W: Write>(self, e: &mut Encoder<W>) -> Result<()> {
        match self {
            ScalarValue::U8(n) => e.encode_u8(n),
            ScalarValue::U16(n) => e.encode_u16(n),
            ScalarValue::U32(n) => e.encode_u32(n),
            ScalarValue::U64(n) => e.encode_u64(n),
            ScalarValue::U128(n) => e.encode_u128(n),
            ScalarValue::I8(n) => e.encode_i8(n),
            ScalarValue::I16(n) => e.encode_i16(n),
            ScalarValue::I32(n) => e.encode_i32(n),
            ScalarValue::I64(n) => e.encode_i64(n),
            ScalarValue::I128(n) => e.encode_i128(n),
            ScalarValue::F32(n) => e.encode_f32(n),
            ScalarValue::F64(n) => e.encode_f64(n),
            ScalarValue::Char(c) => e.encode_char(c),
            ScalarValue::Bool(b) => e.encode_bool(b),
        }
    }

    pub fn decode_from<R: Read>(
        d: &mut Decoder<R>,
        scalar_type: ScalarType,
    ) -> Result<Self> {
        Ok(match scalar_type {
            ScalarType::U8 => ScalarValue::U8(d.decode_u8()?),
            ScalarType::U16 => ScalarValue::U16(d.decode_u16()?),
            ScalarType::U32 => ScalarValue::U32(d.decode_u32()?),
            ScalarType::U64 => ScalarValue::U64(d.decode_u64()?),
            ScalarType::U128 => ScalarValue::U128(d.decode_u128()?),
            ScalarType::I8 => ScalarValue::I8(d.decode_i8()?),
            ScalarType::I16 => ScalarValue::I16(d.decode_i16()?),
            ScalarType::I32 => ScalarValue::I32(d.decode_i32()?),
            ScalarType::I64 => ScalarValue::I64(d.decode_i64()?),
            ScalarType::I128 => ScalarValue::I128(d.decode_i128()?),
            ScalarType::F32 => ScalarValue::F32(d.decode_f32()?),
            ScalarType::F64 => ScalarValue::F64(d.decode_f64()?),
            ScalarType::Char => ScalarValue::Char(d.decode_char()?),
            ScalarType::Bool => ScalarValue::Bool(d.decode_bool()?),
        })
    }
}

fn scalar_variant(scalar_type: ScalarType) -> (usize, &'static str) {
    let ord = ScalarType::ALL
        .iter()
        .position(|&t| t == scalar_type)
        .expect("ScalarType::ALL covers every variant");
    let name = match scalar_type {
        ScalarType::U8 => "U8",
        ScalarType::U16 => "U16",
        ScalarType::U32 => "U32",
        ScalarType::U64 => "U64",
        ScalarType::U128 => "U128",
        ScalarType::I8 => "I8",
        ScalarType::I16 => "I16",
        ScalarType::I32 => "I32",
        ScalarType::I64 => "I64",
        ScalarType::I128 => "I128",
        ScalarType::F32 => "F32",
        ScalarType::F64 => "F64",
        ScalarType::Char => "Char",
        ScalarType::Bool => "Bool",
    };
    (ord, name)
}

fn enum_of(variant_ord: usize, variant_name: &str, value: Value) -> Value {
    Value::Enum(EnumValue {
        variant_ord,
        variant_name: variant_name.to_string(),
        value: Box::new(value),
    })
}

/// Convert a schema into the generic value it encodes to under
/// [`Schema::meta_schema`]. Total over every well-formed `Schema`.
pub fn schema_to_value(schema: &Schema) -> Value {
    match schema {
        &Schema::Scalar(scalar_type) => {
            let (ord, name) = scalar_variant(scalar_type);
            enum_of(0, "Scalar", enum_of(ord, name, Value::Unit))
        }
        &Schema::Str => enum_of(1, "Str", Value::Unit),
        &Schema::Bytes => enum_of(2, "Bytes", Value::Unit),
        &Schema::Unit => enum_of(3, "Unit", Value::Unit),
        &Schema::Option(ref inner) => enum_of(4, "Option", schema_to_value(inner)),
        &Schema::Seq(SeqSchema { len, ref inner }) => {
            let len_value = Value::Option(
                len.map(|l| Box::new(Value::Scalar(ScalarValue::U64(l as u64)))),
            );
            enum_of(5, "Seq", Value::Struct(vec![
                StructValueField { name: "len".into(), value: len_value },
                StructValueField { name: "inner".into(), value: schema_to_value(inner) },
            ]))
        }
        &Schema::Tuple(ref inners) => {
            let seq = inners.iter().map(schema_to_value).collect();
            enum_of(6, "Tuple", Value::VarLenSeq(seq))
        }
        &Schema::Struct(ref fields) => {
            let seq = fields
                .iter()
                .map(|field| Value::Struct(vec![
                    StructValueField { name: "name".into(), value: Value::Str(field.name.clone()) },
                    StructValueField { name: "inner".into(), value: schema_to_value(&field.inner) },
                ]))
                .collect();
            enum_of(7, "Struct", Value::VarLenSeq(seq))
        }
        &Schema::Enum(ref variants) => {
            let seq = variants
                .iter()
                .map(|variant| Value::Struct(vec![
                    StructValueField { name: "name".into(), value: Value::Str(variant.name.clone()) },
                    StructValueField { name: "inner".into(), value: schema_to_value(&variant.inner) },
                ]))
                .collect();
            enum_of(8, "Enum", Value::VarLenSeq(seq))
        }
        &Schema::Recurse(level) => enum_of(9, "Recurse", Value::Scalar(ScalarValue::U64(level as u64))),
    }
}

/// Inverse of [`schema_to_value`]. Expects a value shaped by
/// [`Schema::meta_schema`]; any other shape is an `Other` error rather than
/// a schema error, since such a value could not have been produced by
/// decoding under the meta-schema in the first place.
pub fn value_to_schema(value: &Value) -> Result<Schema> {
    let &Value::Enum(EnumValue { variant_ord, ref value, .. }) = value else {
        bail!(Other, None, "meta-schema value is not an enum");
    };
    Ok(match variant_ord {
        0 => {
            let &Value::Enum(EnumValue { variant_ord: scalar_ord, .. }) = &**value else {
                bail!(Other, None, "Scalar value is not an enum");
            };
            let scalar_type = *ScalarType::ALL.get(scalar_ord).ok_or_else(|| {
                Error::other(format!("scalar ordinal {} out of range", scalar_ord))
            })?;
            Schema::Scalar(scalar_type)
        }
        1 => Schema::Str,
        2 => Schema::Bytes,
        3 => Schema::Unit,
        4 => Schema::Option(Box::new(value_to_schema(value)?)),
        5 => {
            let &Value::Struct(ref fields) = &**value else {
                bail!(Other, None, "Seq value is not a struct");
            };
            let len = match &fields[0].value {
                Value::Option(None) => None,
                Value::Option(Some(inner)) => match &**inner {
                    &Value::Scalar(ScalarValue::U64(n)) => Some(n as usize),
                    _ => bail!(Other, None, "Seq.len is not a u64"),
                },
                _ => bail!(Other, None, "Seq.len is not an option"),
            };
            let inner = value_to_schema(&fields[1].value)?;
            Schema::Seq(SeqSchema { len, inner: Box::new(inner) })
        }
        6 => {
            let &Value::VarLenSeq(ref elems) = &**value else {
                bail!(Other, None, "Tuple value is not a seq");
            };
            Schema::Tuple(elems.iter().map(value_to_schema).collect::<Result<_>>()?)
        }
        7 => Schema::Struct(decode_named_fields(value)?
            .into_iter()
            .map(|(name, inner)| crate::StructSchemaField { name, inner })
            .collect()),
        8 => Schema::Enum(decode_named_fields(value)?
            .into_iter()
            .map(|(name, inner)| crate::EnumSchemaVariant { name, inner })
            .collect()),
        9 => {
            let &Value::Scalar(ScalarValue::U64(level)) = &**value else {
                bail!(Other, None, "Recurse value is not a u64");
            };
            Schema::Recurse(level as usize)
        }
        other => bail!(Other, None, "meta-schema ordinal {} out of range", other),
    })
}

fn decode_named_fields(value: &Value) -> Result<Vec<(String, Schema)>> {
    let &Value::VarLenSeq(ref elems) = value else {
        bail!(Other, None, "Struct/Enum value is not a seq");
    };
    elems
        .iter()
        .map(|elem| {
            let &Value::Struct(ref fields) = elem else {
                bail!(Other, None, "named field entry is not a struct");
            };
            let name = match &fields[0].value {
                Value::Str(s) => s.clone(),
                _ => bail!(Other, None, "field name is not a str"),
            };
            let inner = value_to_schema(&fields[1].value)?;
            Ok((name, inner))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    #[test]
    fn scalar_schema_round_trips_through_value() {
        let s = schema!(u8);
        let v = schema_to_value(&s);
        assert_eq!(value_to_schema(&v).unwrap(), s);
    }

    #[test]
    fn recurse_schema_round_trips_through_value() {
        let s = schema!(recurse(2));
        let v = schema_to_value(&s);
        assert_eq!(value_to_schema(&v).unwrap(), s);
    }

    #[test]
    fn struct_schema_round_trips_through_value() {
        let s = schema!(struct {
            (a: u8),
            (b: option(str)),
        });
        let v = schema_to_value(&s);
        assert_eq!(value_to_schema(&v).unwrap(), s);
    }
}
