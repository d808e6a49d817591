//! 值类型定义模块
//!
//! 定义可写入文档的全部值类型。值的类型标记由其种类唯一推导，
//! 不能单独设置。

use crate::document::{Array, Document};
use crate::scalar::length_prefix;
use crate::spec::{BinarySubtype, TypeTag, BINARY_HEADER_SIZE, LENGTH_PREFIX_SIZE};
use crate::BisonResult;
use compact_str::CompactString;
use std::fmt;

/// 文档值的枚举类型
///
/// `Absent` 编码为零字节：值为 `Absent` 的键值对整体不输出，
/// 用于可选组合。`Null` 则输出一个类型为 0x0A、无负载的元素。
///
/// # 示例
///
/// ```rust,ignore
/// use bison_wire::Value;
///
/// let value = Value::from("hello");
/// assert_eq!(value.type_name(), "string");
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// 64位 IEEE-754 浮点数
    Double(f64),
    /// UTF-8 字符串
    String(CompactString),
    /// 嵌套文档
    Document(Document),
    /// 数组（键为位置下标）
    Array(Array),
    /// 带子类型的二进制数据
    Binary(Binary),
    /// 布尔值
    Boolean(bool),
    /// 空值
    #[default]
    Null,
    /// 32位有符号整数
    Int32(i32),
    /// 64位无符号整数（线格式中的 timestamp 类型）
    Uint64(u64),
    /// 64位有符号整数
    Int64(i64),
    /// 不存在，编码为零字节
    Absent,
}

/// 二进制值
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Binary {
    pub subtype: BinarySubtype,
    pub bytes: Vec<u8>,
}

impl Binary {
    pub fn new(subtype: BinarySubtype, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            subtype,
            bytes: bytes.into(),
        }
    }

    pub fn borrowed(&self) -> BinaryRef<'_> {
        BinaryRef {
            subtype: self.subtype,
            bytes: &self.bytes,
        }
    }
}

/// 借用输入缓冲区的二进制值，由解码产生
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryRef<'a> {
    pub subtype: BinarySubtype,
    pub bytes: &'a [u8],
}

impl BinaryRef<'_> {
    pub fn to_binary(&self) -> Binary {
        Binary {
            subtype: self.subtype,
            bytes: self.bytes.to_vec(),
        }
    }
}

impl Value {
    /// 获取值的类型标记
    ///
    /// # Returns
    /// `Absent` 没有线格式表示，返回 `None`
    pub fn tag(&self) -> Option<TypeTag> {
        match self {
            Value::Double(_) => Some(TypeTag::Double),
            Value::String(_) => Some(TypeTag::String),
            Value::Document(_) => Some(TypeTag::Document),
            Value::Array(_) => Some(TypeTag::Array),
            Value::Binary(_) => Some(TypeTag::Binary),
            Value::Boolean(_) => Some(TypeTag::Boolean),
            Value::Null => Some(TypeTag::Null),
            Value::Int32(_) => Some(TypeTag::Int32),
            Value::Uint64(_) => Some(TypeTag::Uint64),
            Value::Int64(_) => Some(TypeTag::Int64),
            Value::Absent => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.tag().map(TypeTag::name).unwrap_or("absent")
    }

    /// 计算值部分的编码字节数
    ///
    /// # Brief
    /// 同时校验所有长度前缀都能用 32 位表示；嵌套文档递归校验。
    ///
    /// # Returns
    /// 字节数，或 `ValueTooLarge`
    pub fn encoded_len(&self) -> BisonResult<usize> {
        match self {
            Value::Double(_) | Value::Uint64(_) | Value::Int64(_) => Ok(8),
            Value::Int32(_) => Ok(4),
            Value::Boolean(_) => Ok(1),
            Value::Null | Value::Absent => Ok(0),
            Value::String(s) => {
                length_prefix(s.len() + 1)?;
                Ok(LENGTH_PREFIX_SIZE + s.len() + 1)
            }
            Value::Binary(b) => {
                length_prefix(b.bytes.len())?;
                Ok(BINARY_HEADER_SIZE + b.bytes.len())
            }
            Value::Document(doc) => doc.encoded_len(),
            Value::Array(arr) => arr.encoded_len(),
        }
    }

    /// 不做校验的长度计算，仅在 `encoded_len` 通过后用于流式输出
    pub(crate) fn wire_len(&self) -> usize {
        match self {
            Value::String(s) => LENGTH_PREFIX_SIZE + s.len() + 1,
            Value::Binary(b) => BINARY_HEADER_SIZE + b.bytes.len(),
            Value::Document(doc) => doc.wire_len(),
            Value::Array(arr) => arr.wire_len(),
            Value::Double(_) | Value::Uint64(_) | Value::Int64(_) => 8,
            Value::Int32(_) => 4,
            Value::Boolean(_) => 1,
            Value::Null | Value::Absent => 0,
        }
    }

    /// 嵌套层数：文档/数组为 1 加其内部最大层数，标量为 0
    pub fn nesting_depth(&self) -> usize {
        match self {
            Value::Document(doc) => 1 + doc.nesting_depth(),
            Value::Array(arr) => 1 + arr.nesting_depth(),
            _ => 0,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(n) => Some(*n),
            _ => None,
        }
    }

    /// 尝试获取 i64 值
    ///
    /// # Returns
    /// Int32 与 Int64 均可取得；Uint64 超出范围时返回 `None`
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(n) => Some(*n as i64),
            Value::Int64(n) => Some(*n),
            Value::Uint64(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Uint64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&Binary> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Double(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s.as_str()),
            Value::Document(doc) => write!(f, "{}", doc),
            Value::Array(arr) => write!(f, "{}", arr),
            Value::Binary(b) => write!(f, "<binary:{:02x} {} bytes>", b.subtype.0, b.bytes.len()),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
            Value::Int32(n) => write!(f, "{}", n),
            Value::Uint64(n) => write!(f, "{}u64", n),
            Value::Int64(n) => write!(f, "{}i64", n),
            Value::Absent => write!(f, "<absent>"),
        }
    }
}

// ============================================================================
// From 特征实现 - 支持从各种 Rust 类型转换为 Value
// ============================================================================

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Double(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(CompactString::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(CompactString::from(v))
    }
}

impl From<CompactString> for Value {
    fn from(v: CompactString) -> Self {
        Value::String(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Int32(v as i32)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int32(v as i32)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::Int32(v as i32)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int64(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint64(v)
    }
}

impl From<Binary> for Value {
    fn from(v: Binary) -> Self {
        Value::Binary(v)
    }
}

impl From<BinaryRef<'_>> for Value {
    fn from(v: BinaryRef<'_>) -> Self {
        Value::Binary(v.to_binary())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(Binary::new(BinarySubtype::GENERIC, v))
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Binary(Binary::new(BinarySubtype::GENERIC, v))
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Document(v)
    }
}

impl From<Array> for Value {
    fn from(v: Array) -> Self {
        Value::Array(v)
    }
}

/// `None` 编码为 null 元素；要省略整个元素请使用 `Value::Absent`
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
