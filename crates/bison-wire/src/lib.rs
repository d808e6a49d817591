//! # bison-wire - 长度前缀二进制文档编解码
//!
//! 实现 BSON 线格式的编码与解码：
//!
//! - **标量编解码**：定长小端整数/浮点、带长度前缀的字符串与二进制
//! - **键值对**：`[类型][键][NUL][值]` 元素布局
//! - **组合引擎**：按声明顺序组装异构键值对，惰性展平为单一字节序列
//! - **文档解析**：校验长度与结束符，按需物化字段
//!
//! ## 快速开始
//!
//! ```rust,ignore
//! use bison_wire::{doc, decode, encode_to_vec};
//!
//! let doc = doc! { "ok" => true };
//! let bytes = encode_to_vec(&doc).unwrap();
//! assert_eq!(bytes, [0x0A, 0, 0, 0, 0x08, b'o', b'k', 0, 0x01, 0]);
//!
//! let raw = decode(&bytes).unwrap();
//! let ok: bool = raw.get_as("ok").unwrap();
//! ```

pub mod bson;
pub mod codec;
pub mod compose;
pub mod de;
pub mod document;
pub mod json;
pub mod pair;
pub mod raw;
pub mod scalar;
pub mod ser;
pub mod spec;
pub mod value;

pub use bison_common::CodecConfig;
pub use codec::{decode, decode_with, encode, encode_to_vec, Body, Encoder};
pub use compose::{Branch, Node};
pub use document::{Array, Document};
pub use pair::Pair;
pub use raw::{FromRaw, RawArray, RawDocument, RawElement};
pub use spec::{BinarySubtype, TypeTag};
pub use value::{Binary, BinaryRef, Value};

use thiserror::Error;

/// 编解码操作的错误类型
///
/// 解码错误只中止当前文档，不做部分恢复。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BisonError {
    /// 输入短于该类型要求的最小长度
    #[error("Data too short: need {need}, have {actual}")]
    DataTooShort { need: usize, actual: usize },

    /// 声明长度与实际长度不一致
    #[error("Size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: i64, actual: i64 },

    /// 字符串或键不是有效的 UTF-8
    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// 未知的类型标记字节
    #[error("Unsupported type tag: 0x{0:02X}")]
    UnsupportedTypeTag(u8),

    /// 元素越过文档结束符
    #[error("Truncated element")]
    TruncatedElement,

    /// 文档结构无效
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// 按键查找未命中
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// 长度超出 32 位长度前缀的表示范围
    #[error("Value too large: {0} bytes")]
    ValueTooLarge(usize),

    /// 键为空或包含 NUL 字节
    #[error("Invalid key: {0:?}")]
    InvalidKey(String),

    /// 元素类型与请求的类型不符
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: TypeTag, actual: TypeTag },

    /// 嵌套层级过深
    #[error("Nesting too deep: max {0}")]
    NestingTooDeep(usize),

    /// 文档体积超出配置限制
    #[error("Document too large: max {0} bytes")]
    DocumentTooLarge(usize),

    /// 序列化过程错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 反序列化过程错误
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

/// 编解码 Result 类型别名
pub type BisonResult<T> = Result<T, BisonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_to_end_ok_document() {
        let doc = doc! { "ok" => true };
        let bytes = encode_to_vec(&doc).unwrap();
        assert_eq!(
            bytes,
            [0x0A, 0x00, 0x00, 0x00, 0x08, 0x6F, 0x6B, 0x00, 0x01, 0x00]
        );

        let raw = decode(&bytes).unwrap();
        let elements: Vec<_> = raw.iter().collect::<BisonResult<_>>().unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].key(), "ok");
        assert_eq!(elements[0].tag(), TypeTag::Boolean);
        assert_eq!(elements[0].to_value().unwrap(), Value::Boolean(true));
        assert_eq!(raw.to_document().unwrap(), doc);
    }

    #[test]
    fn test_error_display() {
        let err = BisonError::UnsupportedTypeTag(0x07);
        assert_eq!(err.to_string(), "Unsupported type tag: 0x07");
        let err = BisonError::TypeMismatch {
            expected: TypeTag::Int32,
            actual: TypeTag::String,
        };
        assert_eq!(err.to_string(), "Type mismatch: expected int32, got string");
    }
}
