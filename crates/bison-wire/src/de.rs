//! Serde 反序列化模块
//!
//! 直接在 `RawDocument` 上实现 Serde Deserializer，不经过中间 `Value`。
//!
//! - 字符串、键与二进制可零拷贝借用输入 (`&str`, `&[u8]`)
//! - null -> `None` / unit
//! - 枚举: 字符串表示单元变体，单键文档表示带数据的变体
//! - 整数宽度由 Serde 的访问器按范围转换

use crate::raw::{RawArrayIter, RawDocument, RawElement, RawIter};
use crate::scalar::{
    decode_binary, decode_bool, decode_f64, decode_i32, decode_i64, decode_str, decode_u64,
};
use crate::spec::TypeTag;
use crate::{BisonError, BisonResult};
use serde::de::value::BorrowedStrDeserializer;
use serde::de::{self, DeserializeSeed, IntoDeserializer, MapAccess, SeqAccess, Visitor};
use serde::forward_to_deserialize_any;
use serde::Deserialize;
use std::fmt;

/// 从完整的文档字节反序列化
pub fn from_slice<'de, T: Deserialize<'de>>(data: &'de [u8]) -> BisonResult<T> {
    from_raw(RawDocument::parse(data)?)
}

/// 从已解析的文档视图反序列化
pub fn from_raw<'de, T: Deserialize<'de>>(doc: RawDocument<'de>) -> BisonResult<T> {
    T::deserialize(Deserializer::new(doc))
}

/// 从单个元素反序列化
pub fn from_element<'de, T: Deserialize<'de>>(element: RawElement<'de>) -> BisonResult<T> {
    T::deserialize(ElementDeserializer::new(element))
}

impl de::Error for BisonError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        BisonError::Deserialization(msg.to_string())
    }
}

/// 顶层文档反序列化器
pub struct Deserializer<'de> {
    doc: RawDocument<'de>,
}

impl<'de> Deserializer<'de> {
    pub fn new(doc: RawDocument<'de>) -> Self {
        Self { doc }
    }
}

impl<'de> de::Deserializer<'de> for Deserializer<'de> {
    type Error = BisonError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> BisonResult<V::Value> {
        visitor.visit_map(MapDeserializer::new(self.doc.iter()))
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> BisonResult<V::Value> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> BisonResult<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> BisonResult<V::Value> {
        visit_tagged_enum(self.doc, visitor)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
        identifier ignored_any
    }
}

/// 单个元素的反序列化器
pub struct ElementDeserializer<'de> {
    element: RawElement<'de>,
}

impl<'de> ElementDeserializer<'de> {
    pub fn new(element: RawElement<'de>) -> Self {
        Self { element }
    }
}

impl<'de> de::Deserializer<'de> for ElementDeserializer<'de> {
    type Error = BisonError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> BisonResult<V::Value> {
        let value = self.element.value_bytes();
        match self.element.tag() {
            TypeTag::Double => visitor.visit_f64(decode_f64(value)?),
            TypeTag::String => visitor.visit_borrowed_str(decode_str(value)?),
            TypeTag::Document => {
                let doc = self.element.as_document()?;
                visitor.visit_map(MapDeserializer::new(doc.iter()))
            }
            TypeTag::Array => {
                let arr = self.element.as_array()?;
                visitor.visit_seq(SeqDeserializer { iter: arr.iter() })
            }
            TypeTag::Binary => visitor.visit_borrowed_bytes(decode_binary(value)?.bytes),
            TypeTag::Boolean => visitor.visit_bool(decode_bool(value)?),
            TypeTag::Null => visitor.visit_unit(),
            TypeTag::Int32 => visitor.visit_i32(decode_i32(value)?),
            TypeTag::Uint64 => visitor.visit_u64(decode_u64(value)?),
            TypeTag::Int64 => visitor.visit_i64(decode_i64(value)?),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> BisonResult<V::Value> {
        if self.element.tag() == TypeTag::Null {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> BisonResult<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> BisonResult<V::Value> {
        match self.element.tag() {
            TypeTag::String => {
                let variant = decode_str(self.element.value_bytes())?;
                visitor.visit_enum(variant.into_deserializer())
            }
            TypeTag::Document => visit_tagged_enum(self.element.as_document()?, visitor),
            other => Err(BisonError::Deserialization(format!(
                "expected string or document for enum, got {}",
                other
            ))),
        }
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> BisonResult<V::Value> {
        visitor.visit_unit()
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
        identifier
    }
}

fn visit_tagged_enum<'de, V: Visitor<'de>>(
    doc: RawDocument<'de>,
    visitor: V,
) -> BisonResult<V::Value> {
    let mut iter = doc.iter();
    let element = match iter.next() {
        Some(element) => element?,
        None => {
            return Err(BisonError::Deserialization(
                "expected a single-key document for enum, got an empty one".to_string(),
            ))
        }
    };
    if iter.next().is_some() {
        return Err(BisonError::Deserialization(
            "expected a single-key document for enum".to_string(),
        ));
    }
    visitor.visit_enum(EnumDeserializer { element })
}

struct MapDeserializer<'de> {
    iter: RawIter<'de>,
    value: Option<RawElement<'de>>,
}

impl<'de> MapDeserializer<'de> {
    fn new(iter: RawIter<'de>) -> Self {
        Self { iter, value: None }
    }
}

impl<'de> MapAccess<'de> for MapDeserializer<'de> {
    type Error = BisonError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> BisonResult<Option<K::Value>> {
        match self.iter.next() {
            Some(element) => {
                let element = element?;
                self.value = Some(element);
                seed.deserialize(BorrowedStrDeserializer::new(element.key()))
                    .map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> BisonResult<V::Value> {
        let element = self
            .value
            .take()
            .ok_or_else(|| BisonError::Deserialization("value requested before key".to_string()))?;
        seed.deserialize(ElementDeserializer::new(element))
    }
}

struct SeqDeserializer<'de> {
    iter: RawArrayIter<'de>,
}

impl<'de> SeqAccess<'de> for SeqDeserializer<'de> {
    type Error = BisonError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> BisonResult<Option<T::Value>> {
        match self.iter.next() {
            Some(element) => seed.deserialize(ElementDeserializer::new(element?)).map(Some),
            None => Ok(None),
        }
    }
}

struct EnumDeserializer<'de> {
    element: RawElement<'de>,
}

impl<'de> de::EnumAccess<'de> for EnumDeserializer<'de> {
    type Error = BisonError;
    type Variant = VariantDeserializer<'de>;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> BisonResult<(V::Value, VariantDeserializer<'de>)> {
        let variant = seed.deserialize(BorrowedStrDeserializer::<BisonError>::new(
            self.element.key(),
        ))?;
        Ok((variant, VariantDeserializer { element: self.element }))
    }
}

struct VariantDeserializer<'de> {
    element: RawElement<'de>,
}

impl<'de> de::VariantAccess<'de> for VariantDeserializer<'de> {
    type Error = BisonError;

    fn unit_variant(self) -> BisonResult<()> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> BisonResult<T::Value> {
        seed.deserialize(ElementDeserializer::new(self.element))
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> BisonResult<V::Value> {
        de::Deserializer::deserialize_seq(ElementDeserializer::new(self.element), visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> BisonResult<V::Value> {
        de::Deserializer::deserialize_map(ElementDeserializer::new(self.element), visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_to_vec;
    use crate::spec::BinarySubtype;
    use crate::value::{Binary, Value};
    use crate::{array, doc};
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Inner {
        x: i32,
        label: String,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    enum Shape {
        Empty,
        Circle(f64),
        Point(i32, i32),
        Rect { w: i32, h: i32 },
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        name: String,
        count: u32,
        big: u64,
        ratio: f64,
        flag: bool,
        note: Option<String>,
        inner: Inner,
        items: Vec<i64>,
        shapes: Vec<Shape>,
    }

    fn record() -> Record {
        Record {
            name: "bison".to_string(),
            count: 3,
            big: u64::MAX,
            ratio: 0.25,
            flag: true,
            note: None,
            inner: Inner {
                x: -1,
                label: "in".to_string(),
            },
            items: vec![1, 2, 3],
            shapes: vec![
                Shape::Empty,
                Shape::Circle(2.0),
                Shape::Point(1, 2),
                Shape::Rect { w: 3, h: 4 },
            ],
        }
    }

    #[test]
    fn test_roundtrip_struct() {
        let original = record();
        let bytes = crate::ser::to_vec(&original).unwrap();
        let restored: Record = from_slice(&bytes).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn test_borrowed_fields() {
        #[derive(Deserialize)]
        struct View<'a> {
            name: &'a str,
            data: &'a [u8],
        }

        let bytes = encode_to_vec(&doc! {
            "name" => "zero-copy",
            "data" => Binary::new(BinarySubtype::GENERIC, vec![9, 8, 7]),
        })
        .unwrap();
        let view: View = from_slice(&bytes).unwrap();
        assert_eq!(view.name, "zero-copy");
        assert_eq!(view.data, &[9, 8, 7]);

        let name_offset = bytes
            .windows(9)
            .position(|w| w == b"zero-copy")
            .unwrap();
        assert_eq!(view.name.as_ptr(), bytes[name_offset..].as_ptr());
    }

    #[test]
    fn test_null_and_missing_option() {
        #[derive(Debug, PartialEq, Deserialize)]
        struct Opt {
            a: Option<i32>,
            b: Option<i32>,
            c: Option<i32>,
        }

        let bytes = encode_to_vec(&doc! { "a" => Value::Null, "b" => 5i32 }).unwrap();
        let opt: Opt = from_slice(&bytes).unwrap();
        assert_eq!(
            opt,
            Opt {
                a: None,
                b: Some(5),
                c: None
            }
        );
    }

    #[test]
    fn test_map_and_integer_widening() {
        let bytes = encode_to_vec(&doc! { "a" => 1i32, "b" => 2i64 }).unwrap();
        let map: HashMap<String, i64> = from_slice(&bytes).unwrap();
        assert_eq!(map["a"], 1);
        assert_eq!(map["b"], 2);

        let narrow: HashMap<&str, u8> = from_slice(&bytes).unwrap();
        assert_eq!(narrow["b"], 2);
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        let bytes = encode_to_vec(&doc! {
            "x" => 1i32,
            "extra" => array![doc! { "deep" => true }],
            "label" => "l",
        })
        .unwrap();
        let inner: Inner = from_slice(&bytes).unwrap();
        assert_eq!(
            inner,
            Inner {
                x: 1,
                label: "l".to_string()
            }
        );
    }

    #[test]
    fn test_type_errors() {
        let bytes = encode_to_vec(&doc! { "x" => "not a number", "label" => "l" }).unwrap();
        assert!(matches!(
            from_slice::<Inner>(&bytes),
            Err(BisonError::Deserialization(_))
        ));

        let bytes = encode_to_vec(&doc! { "x" => 1i32 }).unwrap();
        assert!(matches!(
            from_slice::<Inner>(&bytes),
            Err(BisonError::Deserialization(_))
        ));
    }

    #[test]
    fn test_structural_errors_propagate() {
        assert!(matches!(
            from_slice::<Inner>(&[0x01, 0x02]),
            Err(BisonError::DataTooShort { .. })
        ));
    }
}
