//! Serde 序列化模块
//!
//! 把任意 `Serialize` 类型转换为 `Value` / `Document`，再由编码器输出。
//!
//! 类型映射:
//! - i8/i16/i32/u8/u16 -> int32，i64/u32 -> int64，u64 -> uint64
//! - f32/f64 -> double，char/str -> string，bytes -> binary(generic)
//! - unit/None -> null，seq/tuple -> array，map/struct -> document
//! - 枚举按外部标记表示，单元变体为字符串

use crate::codec::encode_to_vec;
use crate::document::{Array, Document};
use crate::pair::Pair;
use crate::spec::BinarySubtype;
use crate::value::{Binary, Value};
use crate::{BisonError, BisonResult};
use compact_str::CompactString;
use serde::ser::{self, Serialize};

pub struct Serializer {
    output: Value,
}

impl Serializer {
    pub fn new() -> Self {
        Self {
            output: Value::Null,
        }
    }

    pub fn into_value(self) -> Value {
        self.output
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

/// 序列化为 Value
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> BisonResult<Value> {
    let mut serializer = Serializer::new();
    value.serialize(&mut serializer)?;
    Ok(serializer.into_value())
}

/// 序列化为 Document
///
/// # Returns
/// 顶层不是 map/struct 时返回 `Serialization` 错误
pub fn to_document<T: Serialize + ?Sized>(value: &T) -> BisonResult<Document> {
    match to_value(value)? {
        Value::Document(doc) => Ok(doc),
        other => Err(BisonError::Serialization(format!(
            "top-level value must be a document, got {}",
            other.type_name()
        ))),
    }
}

/// 序列化并编码为字节
pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> BisonResult<Vec<u8>> {
    encode_to_vec(&to_document(value)?)
}

fn single_entry(variant: &'static str, value: Value) -> BisonResult<Value> {
    let mut doc = Document::with_capacity(1);
    doc.push(Pair::new(variant, value)?);
    Ok(Value::Document(doc))
}

impl<'a> ser::Serializer for &'a mut Serializer {
    type Ok = ();
    type Error = BisonError;
    type SerializeSeq = SeqSerializer<'a>;
    type SerializeTuple = SeqSerializer<'a>;
    type SerializeTupleStruct = SeqSerializer<'a>;
    type SerializeTupleVariant = SeqSerializer<'a>;
    type SerializeMap = MapSerializer<'a>;
    type SerializeStruct = MapSerializer<'a>;
    type SerializeStructVariant = MapSerializer<'a>;

    fn serialize_bool(self, v: bool) -> BisonResult<()> {
        self.output = Value::Boolean(v);
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> BisonResult<()> {
        self.serialize_i32(v as i32)
    }

    fn serialize_i16(self, v: i16) -> BisonResult<()> {
        self.serialize_i32(v as i32)
    }

    fn serialize_i32(self, v: i32) -> BisonResult<()> {
        self.output = Value::Int32(v);
        Ok(())
    }

    fn serialize_i64(self, v: i64) -> BisonResult<()> {
        self.output = Value::Int64(v);
        Ok(())
    }

    fn serialize_u8(self, v: u8) -> BisonResult<()> {
        self.serialize_i32(v as i32)
    }

    fn serialize_u16(self, v: u16) -> BisonResult<()> {
        self.serialize_i32(v as i32)
    }

    fn serialize_u32(self, v: u32) -> BisonResult<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_u64(self, v: u64) -> BisonResult<()> {
        self.output = Value::Uint64(v);
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> BisonResult<()> {
        self.serialize_f64(v as f64)
    }

    fn serialize_f64(self, v: f64) -> BisonResult<()> {
        self.output = Value::Double(v);
        Ok(())
    }

    fn serialize_char(self, v: char) -> BisonResult<()> {
        let mut buf = [0u8; 4];
        self.serialize_str(v.encode_utf8(&mut buf))
    }

    fn serialize_str(self, v: &str) -> BisonResult<()> {
        self.output = Value::String(CompactString::from(v));
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> BisonResult<()> {
        self.output = Value::Binary(Binary::new(BinarySubtype::GENERIC, v));
        Ok(())
    }

    fn serialize_none(self) -> BisonResult<()> {
        self.serialize_unit()
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> BisonResult<()> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> BisonResult<()> {
        self.output = Value::Null;
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> BisonResult<()> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> BisonResult<()> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> BisonResult<()> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> BisonResult<()> {
        self.output = single_entry(variant, to_value(value)?)?;
        Ok(())
    }

    fn serialize_seq(self, len: Option<usize>) -> BisonResult<SeqSerializer<'a>> {
        Ok(SeqSerializer {
            serializer: self,
            variant: None,
            elements: Array::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> BisonResult<SeqSerializer<'a>> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> BisonResult<SeqSerializer<'a>> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> BisonResult<SeqSerializer<'a>> {
        Ok(SeqSerializer {
            serializer: self,
            variant: Some(variant),
            elements: Array::with_capacity(len),
        })
    }

    fn serialize_map(self, len: Option<usize>) -> BisonResult<MapSerializer<'a>> {
        Ok(MapSerializer {
            serializer: self,
            variant: None,
            doc: Document::with_capacity(len.unwrap_or(0)),
            current_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> BisonResult<MapSerializer<'a>> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> BisonResult<MapSerializer<'a>> {
        Ok(MapSerializer {
            serializer: self,
            variant: Some(variant),
            doc: Document::with_capacity(len),
            current_key: None,
        })
    }
}

pub struct SeqSerializer<'a> {
    serializer: &'a mut Serializer,
    variant: Option<&'static str>,
    elements: Array,
}

impl<'a> ser::SerializeSeq for SeqSerializer<'a> {
    type Ok = ();
    type Error = BisonError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> BisonResult<()> {
        self.elements.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> BisonResult<()> {
        let array = Value::Array(self.elements);
        self.serializer.output = match self.variant {
            Some(variant) => single_entry(variant, array)?,
            None => array,
        };
        Ok(())
    }
}

impl<'a> ser::SerializeTuple for SeqSerializer<'a> {
    type Ok = ();
    type Error = BisonError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> BisonResult<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> BisonResult<()> {
        ser::SerializeSeq::end(self)
    }
}

impl<'a> ser::SerializeTupleStruct for SeqSerializer<'a> {
    type Ok = ();
    type Error = BisonError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> BisonResult<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> BisonResult<()> {
        ser::SerializeSeq::end(self)
    }
}

impl<'a> ser::SerializeTupleVariant for SeqSerializer<'a> {
    type Ok = ();
    type Error = BisonError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> BisonResult<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> BisonResult<()> {
        ser::SerializeSeq::end(self)
    }
}

pub struct MapSerializer<'a> {
    serializer: &'a mut Serializer,
    variant: Option<&'static str>,
    doc: Document,
    current_key: Option<CompactString>,
}

impl<'a> ser::SerializeMap for MapSerializer<'a> {
    type Ok = ();
    type Error = BisonError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> BisonResult<()> {
        self.current_key = match to_value(key)? {
            Value::String(s) => Some(s),
            other => {
                return Err(BisonError::Serialization(format!(
                    "map key must be a string, got {}",
                    other.type_name()
                )))
            }
        };
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> BisonResult<()> {
        let key = self
            .current_key
            .take()
            .ok_or_else(|| BisonError::Serialization("value without a key".to_string()))?;
        self.doc.push(Pair::new(key, to_value(value)?)?);
        Ok(())
    }

    fn end(self) -> BisonResult<()> {
        let doc = Value::Document(self.doc);
        self.serializer.output = match self.variant {
            Some(variant) => single_entry(variant, doc)?,
            None => doc,
        };
        Ok(())
    }
}

impl<'a> ser::SerializeStruct for MapSerializer<'a> {
    type Ok = ();
    type Error = BisonError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> BisonResult<()> {
        self.doc.push(Pair::new(key, to_value(value)?)?);
        Ok(())
    }

    fn end(self) -> BisonResult<()> {
        ser::SerializeMap::end(self)
    }
}

impl<'a> ser::SerializeStructVariant for MapSerializer<'a> {
    type Ok = ();
    type Error = BisonError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> BisonResult<()> {
        ser::SerializeStruct::serialize_field(self, key, value)
    }

    fn end(self) -> BisonResult<()> {
        ser::SerializeMap::end(self)
    }
}

impl ser::Error for BisonError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        BisonError::Serialization(msg.to_string())
    }
}
