//! 与 `bson` crate 的互转模块
//!
//! 线格式与 BSON 相同，本模块在值层面与 `bson::Bson` 互转，
//! 也用于在测试中校验逐字节兼容。
//!
//! uint64 (0x11) 对应 BSON Timestamp：高 32 位为 time，低 32 位为 increment。
//!
//! 二进制子类型 0x02 在 `bson` crate 中带有额外的内层长度，与本线格式不同。
//! 值层面的互转保留子类型与负载；字节层面的互转遇到 0x02 直接报错。

use crate::document::{Array, Document};
use crate::pair::Pair;
use crate::raw::RawDocument;
use crate::spec::{BinarySubtype, TypeTag};
use crate::value::{Binary, BinaryRef, Value};
use crate::{BisonError, BisonResult};
use bson::{Bson, Document as BsonDocument, Timestamp};

/// 将 Value 转换为 BSON
///
/// # 类型映射
/// - Double/String/Boolean/Null/Int32/Int64 -> 同名 BSON 类型
/// - Uint64 -> Timestamp
/// - Binary -> Binary (子类型原样保留)
/// - Document/Array -> Document/Array，`Absent` 项被跳过
///
/// # Arguments
/// * `value` - 要转换的值；顶层 `Absent` 转为 Null
pub fn to_bson(value: &Value) -> Bson {
    match value {
        Value::Double(f) => Bson::Double(*f),
        Value::String(s) => Bson::String(s.to_string()),
        Value::Document(doc) => Bson::Document(to_bson_document(doc)),
        Value::Array(arr) => Bson::Array(arr.iter().map(to_bson).collect()),
        Value::Binary(b) => Bson::Binary(bson::Binary {
            subtype: b.subtype.0.into(),
            bytes: b.bytes.clone(),
        }),
        Value::Boolean(b) => Bson::Boolean(*b),
        Value::Null | Value::Absent => Bson::Null,
        Value::Int32(n) => Bson::Int32(*n),
        Value::Uint64(n) => Bson::Timestamp(Timestamp {
            time: (*n >> 32) as u32,
            increment: *n as u32,
        }),
        Value::Int64(n) => Bson::Int64(*n),
    }
}

/// 将 Document 转换为 BSON 文档
///
/// `bson::Document` 不允许重复键，只保留第一个。
pub fn to_bson_document(doc: &Document) -> BsonDocument {
    let mut out = BsonDocument::new();
    for pair in doc.iter() {
        if !out.contains_key(pair.key()) {
            out.insert(pair.key(), to_bson(pair.value()));
        }
    }
    out
}

/// 从 BSON 转换为 Value
///
/// # Returns
/// 线格式不支持的 BSON 类型返回 `UnsupportedTypeTag`
pub fn from_bson(bson: &Bson) -> BisonResult<Value> {
    Ok(match bson {
        Bson::Double(f) => Value::Double(*f),
        Bson::String(s) => Value::from(s.as_str()),
        Bson::Document(doc) => Value::Document(from_bson_document(doc)?),
        Bson::Array(items) => Value::Array(
            items
                .iter()
                .map(from_bson)
                .collect::<BisonResult<Array>>()?,
        ),
        Bson::Binary(b) => Value::Binary(Binary::new(
            BinarySubtype(u8::from(b.subtype)),
            b.bytes.clone(),
        )),
        Bson::Boolean(b) => Value::Boolean(*b),
        Bson::Null => Value::Null,
        Bson::Int32(n) => Value::Int32(*n),
        Bson::Timestamp(ts) => Value::Uint64(((ts.time as u64) << 32) | ts.increment as u64),
        Bson::Int64(n) => Value::Int64(*n),
        other => return Err(BisonError::UnsupportedTypeTag(other.element_type() as u8)),
    })
}

/// 从 BSON 文档转换为 Document
pub fn from_bson_document(doc: &BsonDocument) -> BisonResult<Document> {
    let mut out = Document::with_capacity(doc.len());
    for (key, value) in doc {
        out.push(Pair::new(key.as_str(), from_bson(value)?)?);
    }
    Ok(out)
}

const BINARY_OLD_LAYOUT: &str = "binary subtype 0x02 has a different layout in the bson crate";

fn has_binary_old(value: &Value) -> bool {
    match value {
        Value::Binary(b) => b.subtype == BinarySubtype::BINARY_OLD,
        Value::Document(doc) => doc.iter().any(|pair| has_binary_old(pair.value())),
        Value::Array(arr) => arr.iter().any(has_binary_old),
        _ => false,
    }
}

/// 遍历到第一个错误为止；无法遍历的部分交给 `bson` crate 报告
fn raw_has_binary_old(doc: RawDocument<'_>) -> bool {
    doc.iter().map_while(Result::ok).any(|element| match element.tag() {
        TypeTag::Binary => element
            .get::<BinaryRef>()
            .map_or(false, |b| b.subtype == BinarySubtype::BINARY_OLD),
        TypeTag::Document => element.as_document().map_or(false, raw_has_binary_old),
        TypeTag::Array => element
            .as_array()
            .map_or(false, |arr| raw_has_binary_old(arr.as_document())),
        _ => false,
    })
}

/// 经由 `bson` crate 编码
///
/// # Returns
/// 含子类型 0x02 的二进制时返回 `Serialization`
pub fn to_bson_bytes(doc: &Document) -> BisonResult<Vec<u8>> {
    if doc.iter().any(|pair| has_binary_old(pair.value())) {
        return Err(BisonError::Serialization(BINARY_OLD_LAYOUT.to_string()));
    }
    let mut bytes = Vec::new();
    to_bson_document(doc)
        .to_writer(&mut bytes)
        .map_err(|e| BisonError::Serialization(format!("BSON serialization failed: {}", e)))?;
    Ok(bytes)
}

/// 经由 `bson` crate 解码
///
/// # Returns
/// 含子类型 0x02 的二进制时返回 `Deserialization`
pub fn from_bson_bytes(bytes: &[u8]) -> BisonResult<Document> {
    let binary_old = || BisonError::Deserialization(BINARY_OLD_LAYOUT.to_string());
    if RawDocument::parse(bytes).map_or(false, raw_has_binary_old) {
        return Err(binary_old());
    }
    let doc = BsonDocument::from_reader(&mut &bytes[..])
        .map_err(|e| BisonError::Deserialization(format!("BSON deserialization failed: {}", e)))?;
    let doc = from_bson_document(&doc)?;
    if doc.iter().any(|pair| has_binary_old(pair.value())) {
        return Err(binary_old());
    }
    Ok(doc)
}
