//! JSON 互转模块
//!
//! JSON 的数值类型无法区分 int32/int64/uint64，部分类型使用扩展 JSON 表示：
//! - uint64: `{"$timestamp": {"t": 高 32 位, "i": 低 32 位}}`
//! - binary: `{"$binary": {"base64": "...", "subType": "00"}}`
//! - 非有限 double: `{"$numberDouble": "NaN" | "Infinity" | "-Infinity"}`

use crate::document::{Array, Document};
use crate::pair::Pair;
use crate::raw::{RawDocument, RawElement};
use crate::scalar::{
    decode_binary, decode_bool, decode_f64, decode_i32, decode_i64, decode_str, decode_u64,
};
use crate::spec::{BinarySubtype, TypeTag};
use crate::value::{Binary, Value};
use crate::{BisonError, BisonResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Map, Number, Value as JsonValue};

fn double_to_json(f: f64) -> JsonValue {
    match Number::from_f64(f) {
        Some(n) => JsonValue::Number(n),
        None => {
            let repr = if f.is_nan() {
                "NaN"
            } else if f > 0.0 {
                "Infinity"
            } else {
                "-Infinity"
            };
            json!({ "$numberDouble": repr })
        }
    }
}

fn uint64_to_json(n: u64) -> JsonValue {
    json!({ "$timestamp": { "t": n >> 32, "i": n & 0xFFFF_FFFF } })
}

fn binary_to_json(subtype: BinarySubtype, bytes: &[u8]) -> JsonValue {
    json!({
        "$binary": {
            "base64": STANDARD.encode(bytes),
            "subType": format!("{:02x}", subtype.0),
        }
    })
}

/// 将 Value 转换为 JSON
///
/// # Brief
/// `Absent` 转换为 null；文档中的重复键只保留第一个
pub fn to_json(value: &Value) -> JsonValue {
    match value {
        Value::Double(f) => double_to_json(*f),
        Value::String(s) => JsonValue::String(s.to_string()),
        Value::Document(doc) => document_to_json(doc),
        Value::Array(arr) => JsonValue::Array(arr.iter().map(to_json).collect()),
        Value::Binary(b) => binary_to_json(b.subtype, &b.bytes),
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Null | Value::Absent => JsonValue::Null,
        Value::Int32(n) => json!(*n),
        Value::Uint64(n) => uint64_to_json(*n),
        Value::Int64(n) => json!(*n),
    }
}

/// 将 Document 转换为 JSON 对象
pub fn document_to_json(doc: &Document) -> JsonValue {
    let mut map = Map::new();
    for pair in doc.iter() {
        map.entry(pair.key())
            .or_insert_with(|| to_json(pair.value()));
    }
    JsonValue::Object(map)
}

/// 直接从已解析的文档生成 JSON，不物化中间 Value
pub fn raw_to_json(doc: &RawDocument<'_>) -> BisonResult<JsonValue> {
    let mut map = Map::new();
    for element in doc.iter() {
        let element = element?;
        if !map.contains_key(element.key()) {
            map.insert(element.key().to_string(), element_to_json(&element)?);
        }
    }
    Ok(JsonValue::Object(map))
}

/// 单个元素转换为 JSON
pub fn element_to_json(element: &RawElement<'_>) -> BisonResult<JsonValue> {
    let value = element.value_bytes();
    Ok(match element.tag() {
        TypeTag::Double => double_to_json(decode_f64(value)?),
        TypeTag::String => JsonValue::String(decode_str(value)?.to_string()),
        TypeTag::Document => raw_to_json(&element.as_document()?)?,
        TypeTag::Array => {
            let items = element
                .as_array()?
                .iter()
                .map(|item| element_to_json(&item?))
                .collect::<BisonResult<Vec<_>>>()?;
            JsonValue::Array(items)
        }
        TypeTag::Binary => {
            let binary = decode_binary(value)?;
            binary_to_json(binary.subtype, binary.bytes)
        }
        TypeTag::Boolean => JsonValue::Bool(decode_bool(value)?),
        TypeTag::Null => JsonValue::Null,
        TypeTag::Int32 => json!(decode_i32(value)?),
        TypeTag::Uint64 => uint64_to_json(decode_u64(value)?),
        TypeTag::Int64 => json!(decode_i64(value)?),
    })
}

fn invalid(what: &str, value: &JsonValue) -> BisonError {
    BisonError::Deserialization(format!("invalid {}: {}", what, value))
}

fn timestamp_from_json(value: &JsonValue) -> BisonResult<u64> {
    let part = |name: &str| {
        value
            .get(name)
            .and_then(JsonValue::as_u64)
            .filter(|n| *n <= u32::MAX as u64)
            .ok_or_else(|| invalid("$timestamp", value))
    };
    Ok((part("t")? << 32) | part("i")?)
}

fn binary_from_json(value: &JsonValue) -> BisonResult<Binary> {
    let encoded = value
        .get("base64")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| invalid("$binary", value))?;
    let subtype = value
        .get("subType")
        .and_then(JsonValue::as_str)
        .and_then(|s| u8::from_str_radix(s, 16).ok())
        .ok_or_else(|| invalid("$binary subType", value))?;
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| BisonError::Deserialization(format!("invalid base64: {}", e)))?;
    Ok(Binary::new(BinarySubtype(subtype), bytes))
}

fn double_from_json(value: &JsonValue) -> BisonResult<f64> {
    match value.as_str() {
        Some("NaN") => Ok(f64::NAN),
        Some("Infinity") => Ok(f64::INFINITY),
        Some("-Infinity") => Ok(f64::NEG_INFINITY),
        Some(s) => s.parse().map_err(|_| invalid("$numberDouble", value)),
        None => Err(invalid("$numberDouble", value)),
    }
}

/// 识别单键扩展 JSON 对象
fn extended_from_json(map: &Map<String, JsonValue>) -> Option<BisonResult<Value>> {
    if map.len() != 1 {
        return None;
    }
    let (key, inner) = map.iter().next()?;
    let value = match key.as_str() {
        "$timestamp" => timestamp_from_json(inner).map(Value::Uint64),
        "$binary" => binary_from_json(inner).map(Value::Binary),
        "$numberDouble" => double_from_json(inner).map(Value::Double),
        _ => return None,
    };
    Some(value)
}

/// 从 JSON 转换为 Value
///
/// # Brief
/// 识别扩展 JSON 格式；整数在 i32 范围内为 int32，否则为 int64，
/// 超出 i64 的正整数为 uint64
///
/// # Returns
/// 键无效或扩展格式不完整时返回错误
pub fn from_json(value: &JsonValue) -> BisonResult<Value> {
    Ok(match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Boolean(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                match i32::try_from(i) {
                    Ok(small) => Value::Int32(small),
                    Err(_) => Value::Int64(i),
                }
            } else if let Some(u) = n.as_u64() {
                Value::Uint64(u)
            } else {
                Value::Double(n.as_f64().ok_or_else(|| invalid("number", value))?)
            }
        }
        JsonValue::String(s) => Value::from(s.as_str()),
        JsonValue::Array(items) => Value::Array(
            items
                .iter()
                .map(from_json)
                .collect::<BisonResult<Array>>()?,
        ),
        JsonValue::Object(map) => match extended_from_json(map) {
            Some(extended) => extended?,
            None => Value::Document(object_to_document(map)?),
        },
    })
}

fn object_to_document(map: &Map<String, JsonValue>) -> BisonResult<Document> {
    let mut doc = Document::with_capacity(map.len());
    for (key, value) in map {
        doc.push(Pair::new(key.as_str(), from_json(value)?)?);
    }
    Ok(doc)
}

/// 从 JSON 对象转换为 Document
pub fn document_from_json(value: &JsonValue) -> BisonResult<Document> {
    match from_json(value)? {
        Value::Document(doc) => Ok(doc),
        other => Err(BisonError::Deserialization(format!(
            "expected a JSON object, got {}",
            other.type_name()
        ))),
    }
}

/// 转换为 JSON 字符串
pub fn to_json_string(value: &Value) -> String {
    to_json(value).to_string()
}

/// 解析 JSON 字符串
pub fn from_json_str(json_str: &str) -> BisonResult<Value> {
    let json: JsonValue = serde_json::from_str(json_str)
        .map_err(|e| BisonError::Deserialization(e.to_string()))?;
    from_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_to_vec;
    use crate::{array, doc};

    #[test]
    fn test_basic_types() {
        assert_eq!(to_json(&Value::Null), JsonValue::Null);
        assert_eq!(to_json(&Value::Boolean(true)), json!(true));
        assert_eq!(to_json(&Value::Int32(42)), json!(42));
        assert_eq!(to_json(&Value::Int64(-42)), json!(-42));
        assert_eq!(to_json(&Value::from("hi")), json!("hi"));
        assert_eq!(to_json(&Value::Double(1.5)), json!(1.5));
        assert_eq!(
            to_json(&Value::Double(f64::NEG_INFINITY)),
            json!({ "$numberDouble": "-Infinity" })
        );
    }

    #[test]
    fn test_extended_forms() {
        let ts = (7u64 << 32) | 9;
        assert_eq!(
            to_json(&Value::Uint64(ts)),
            json!({ "$timestamp": { "t": 7, "i": 9 } })
        );
        assert_eq!(
            to_json(&Value::Binary(Binary::new(BinarySubtype::MD5, vec![1, 2, 3]))),
            json!({ "$binary": { "base64": "AQID", "subType": "05" } })
        );
    }

    #[test]
    fn test_integer_widths_from_json() {
        assert_eq!(from_json(&json!(1)).unwrap(), Value::Int32(1));
        assert_eq!(
            from_json(&json!(1i64 << 40)).unwrap(),
            Value::Int64(1 << 40)
        );
        assert_eq!(from_json(&json!(u64::MAX)).unwrap(), Value::Uint64(u64::MAX));
        assert_eq!(from_json(&json!(0.5)).unwrap(), Value::Double(0.5));
    }

    #[test]
    fn test_round_trip() {
        let doc = doc! {
            "name" => "bison",
            "n" => 1i32,
            "big" => 1i64 << 40,
            "ts" => (3u64 << 32) | 4,
            "bin" => Binary::new(BinarySubtype(0x80), vec![0xFF]),
            "inf" => f64::INFINITY,
            "list" => array![true, Value::Null, doc! { "x" => 2i32 }],
        };
        let json = document_to_json(&doc);
        assert_eq!(document_from_json(&json).unwrap(), doc);
    }

    #[test]
    fn test_raw_matches_owned() {
        let doc = doc! {
            "a" => 1i32,
            "a" => 2i32,
            "nested" => doc! { "list" => array![1u64, "s"] },
        };
        let bytes = encode_to_vec(&doc).unwrap();
        let raw = RawDocument::parse(&bytes).unwrap();
        let json = raw_to_json(&raw).unwrap();
        assert_eq!(json, document_to_json(&doc));
        assert_eq!(json["a"], json!(1));
    }

    #[test]
    fn test_key_order_preserved() {
        let doc = doc! { "z" => 1i32, "a" => 2i32 };
        assert_eq!(to_json_string(&Value::Document(doc)), r#"{"z":1,"a":2}"#);
    }

    #[test]
    fn test_invalid_input() {
        assert!(matches!(
            from_json_str("{not json"),
            Err(BisonError::Deserialization(_))
        ));
        assert!(matches!(
            from_json(&json!({ "$binary": { "base64": "!!", "subType": "00" } })),
            Err(BisonError::Deserialization(_))
        ));
        assert_eq!(
            from_json(&json!({ "": 1 })).unwrap_err(),
            BisonError::InvalidKey(String::new())
        );
        assert!(matches!(
            document_from_json(&json!([1, 2])),
            Err(BisonError::Deserialization(_))
        ));
    }
}
