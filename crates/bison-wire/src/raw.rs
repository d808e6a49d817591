//! 文档解析模块
//!
//! `RawDocument` 是对输入字节的已校验借用视图：构造时只检查长度前缀
//! 和结束符，元素在遍历时逐个定界，值在调用方需要时才物化。

use crate::compose::IndexKey;
use crate::document::{Array, Document};
use crate::pair::Pair;
use crate::scalar::{
    decode_binary, decode_bool, decode_f64, decode_i32, decode_i64, decode_str, decode_u64,
    read_prefix,
};
use crate::spec::{TypeTag, BINARY_HEADER_SIZE, LENGTH_PREFIX_SIZE, MIN_DOCUMENT_SIZE};
use crate::value::{Binary, BinaryRef, Value};
use crate::{BisonError, BisonResult};
use bison_common::CodecConfig;
use tracing::debug;

/// 已校验的文档视图
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDocument<'a> {
    data: &'a [u8],
    config: CodecConfig,
    depth: usize,
}

impl<'a> RawDocument<'a> {
    /// 使用默认配置解析
    pub fn parse(data: &'a [u8]) -> BisonResult<Self> {
        Self::parse_with(data, CodecConfig::default())
    }

    /// 使用指定配置解析
    ///
    /// # Brief
    /// 依次校验：最小长度、声明长度、结束符、体积上限
    ///
    /// # Arguments
    /// * `data` - 完整的文档字节
    /// * `config` - 解码限制
    ///
    /// # Returns
    /// 成功返回借用 `data` 的视图
    pub fn parse_with(data: &'a [u8], config: CodecConfig) -> BisonResult<Self> {
        Self::parse_at_depth(data, config, 0)
    }

    fn parse_at_depth(data: &'a [u8], config: CodecConfig, depth: usize) -> BisonResult<Self> {
        if data.len() < MIN_DOCUMENT_SIZE {
            debug!("Rejecting document: {} bytes is below minimum", data.len());
            return Err(BisonError::DataTooShort {
                need: MIN_DOCUMENT_SIZE,
                actual: data.len(),
            });
        }
        let declared = read_prefix(data) as i64;
        if declared != data.len() as i64 {
            debug!(
                "Rejecting document: declared size {} but have {} bytes",
                declared,
                data.len()
            );
            return Err(BisonError::SizeMismatch {
                expected: declared,
                actual: data.len() as i64,
            });
        }
        if data[data.len() - 1] != 0 {
            debug!("Rejecting document: missing terminator");
            return Err(BisonError::MalformedDocument(
                "document is not terminated by 0x00".to_string(),
            ));
        }
        if data.len() > config.max_document_size {
            debug!(
                "Rejecting document: {} bytes exceeds limit {}",
                data.len(),
                config.max_document_size
            );
            return Err(BisonError::DocumentTooLarge(config.max_document_size));
        }
        Ok(Self {
            data,
            config,
            depth,
        })
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// 当前嵌套层级，顶层为 0
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// 按顺序遍历元素
    pub fn iter(&self) -> RawIter<'a> {
        RawIter {
            data: self.data,
            pos: LENGTH_PREFIX_SIZE,
            config: self.config,
            depth: self.depth,
            done: false,
        }
    }

    /// 按键查找第一个匹配的元素
    ///
    /// # Returns
    /// 未命中返回 `KeyNotFound`；命中之前遇到的结构错误原样返回
    pub fn get(&self, key: &str) -> BisonResult<RawElement<'a>> {
        for element in self.iter() {
            let element = element?;
            if element.key == key {
                return Ok(element);
            }
        }
        Err(BisonError::KeyNotFound(key.to_string()))
    }

    /// 按键查找并转换为指定类型
    pub fn get_as<T: FromRaw<'a>>(&self, key: &str) -> BisonResult<T> {
        self.get(key)?.get()
    }

    pub fn contains_key(&self, key: &str) -> BisonResult<bool> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(BisonError::KeyNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// 物化为拥有所有权的文档
    pub fn to_document(&self) -> BisonResult<Document> {
        let mut doc = Document::new();
        for element in self.iter() {
            let element = element?;
            doc.push(Pair::new(element.key, element.to_value()?)?);
        }
        Ok(doc)
    }
}

impl<'a> IntoIterator for RawDocument<'a> {
    type Item = BisonResult<RawElement<'a>>;
    type IntoIter = RawIter<'a>;

    fn into_iter(self) -> RawIter<'a> {
        self.iter()
    }
}

impl<'a> IntoIterator for &RawDocument<'a> {
    type Item = BisonResult<RawElement<'a>>;
    type IntoIter = RawIter<'a>;

    fn into_iter(self) -> RawIter<'a> {
        self.iter()
    }
}

/// 元素迭代器
///
/// 产出一个错误后即结束。
#[derive(Debug, Clone)]
pub struct RawIter<'a> {
    data: &'a [u8],
    pos: usize,
    config: CodecConfig,
    depth: usize,
    done: bool,
}

impl<'a> RawIter<'a> {
    /// 结束符所在下标
    fn end(&self) -> usize {
        self.data.len() - 1
    }

    fn read_element(&mut self) -> BisonResult<RawElement<'a>> {
        let end = self.end();
        let tag_byte = self.data[self.pos];
        let tag = TypeTag::from_u8(tag_byte).ok_or(BisonError::UnsupportedTypeTag(tag_byte))?;

        let key_start = self.pos + 1;
        let key_len = self.data[key_start..end]
            .iter()
            .position(|&b| b == 0)
            .ok_or(BisonError::TruncatedElement)?;
        let key = std::str::from_utf8(&self.data[key_start..key_start + key_len])?;

        let value_start = key_start + key_len + 1;
        let value_len = self.value_len(tag, value_start)?;
        let value_end = value_start
            .checked_add(value_len)
            .ok_or(BisonError::TruncatedElement)?;
        if value_end > end {
            return Err(BisonError::TruncatedElement);
        }

        self.pos = value_end;
        Ok(RawElement {
            key,
            tag,
            value: &self.data[value_start..value_end],
            config: self.config,
            depth: self.depth,
        })
    }

    fn value_len(&self, tag: TypeTag, start: usize) -> BisonResult<usize> {
        if let Some(size) = tag.fixed_size() {
            return Ok(size);
        }
        if start + LENGTH_PREFIX_SIZE > self.end() {
            return Err(BisonError::TruncatedElement);
        }
        let declared = read_prefix(&self.data[start..]);
        match tag {
            TypeTag::String if declared < 1 => Err(BisonError::MalformedDocument(format!(
                "string length {} is below 1",
                declared
            ))),
            TypeTag::String => Ok(LENGTH_PREFIX_SIZE + declared as usize),
            TypeTag::Binary if declared < 0 => Err(BisonError::MalformedDocument(format!(
                "negative binary length {}",
                declared
            ))),
            TypeTag::Binary => Ok(BINARY_HEADER_SIZE + declared as usize),
            _ if declared < MIN_DOCUMENT_SIZE as i32 => Err(BisonError::MalformedDocument(
                format!("embedded {} length {} is below 5", tag, declared),
            )),
            _ => Ok(declared as usize),
        }
    }
}

impl<'a> Iterator for RawIter<'a> {
    type Item = BisonResult<RawElement<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.end() {
            self.done = true;
            return None;
        }
        match self.read_element() {
            Ok(element) => Some(Ok(element)),
            Err(e) => {
                debug!("Element walk stopped at offset {}: {}", self.pos, e);
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for RawIter<'_> {}

/// 已定界的元素
///
/// 值字节尚未解释，按需通过 `get` / `to_value` 转换。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawElement<'a> {
    key: &'a str,
    tag: TypeTag,
    value: &'a [u8],
    config: CodecConfig,
    depth: usize,
}

impl<'a> RawElement<'a> {
    pub fn key(&self) -> &'a str {
        self.key
    }

    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    pub fn value_bytes(&self) -> &'a [u8] {
        self.value
    }

    fn expect(&self, expected: TypeTag) -> BisonResult<&'a [u8]> {
        if self.tag != expected {
            return Err(BisonError::TypeMismatch {
                expected,
                actual: self.tag,
            });
        }
        Ok(self.value)
    }

    fn nested(&self, expected: TypeTag) -> BisonResult<RawDocument<'a>> {
        let value = self.expect(expected)?;
        let depth = self.depth + 1;
        if depth > self.config.max_nesting_depth {
            debug!("Rejecting nesting at depth {}", depth);
            return Err(BisonError::NestingTooDeep(self.config.max_nesting_depth));
        }
        RawDocument::parse_at_depth(value, self.config, depth)
    }

    /// 解析嵌套文档
    pub fn as_document(&self) -> BisonResult<RawDocument<'a>> {
        self.nested(TypeTag::Document)
    }

    /// 解析嵌套数组
    pub fn as_array(&self) -> BisonResult<RawArray<'a>> {
        self.nested(TypeTag::Array).map(|doc| RawArray { doc })
    }

    /// 转换为指定类型
    pub fn get<T: FromRaw<'a>>(&self) -> BisonResult<T> {
        T::from_raw(self)
    }

    /// 物化为拥有所有权的值
    pub fn to_value(&self) -> BisonResult<Value> {
        Ok(match self.tag {
            TypeTag::Double => Value::Double(decode_f64(self.value)?),
            TypeTag::String => Value::String(decode_str(self.value)?.into()),
            TypeTag::Document => Value::Document(self.as_document()?.to_document()?),
            TypeTag::Array => Value::Array(self.as_array()?.to_array()?),
            TypeTag::Binary => Value::Binary(decode_binary(self.value)?.to_binary()),
            TypeTag::Boolean => Value::Boolean(decode_bool(self.value)?),
            TypeTag::Null => Value::Null,
            TypeTag::Int32 => Value::Int32(decode_i32(self.value)?),
            TypeTag::Uint64 => Value::Uint64(decode_u64(self.value)?),
            TypeTag::Int64 => Value::Int64(decode_i64(self.value)?),
        })
    }
}

/// 已校验的数组视图
///
/// 数组与文档共用元素遍历；`strict_array_keys` 打开时遍历会校验
/// 键依次为 "0","1",...
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawArray<'a> {
    doc: RawDocument<'a>,
}

impl<'a> RawArray<'a> {
    /// 使用默认配置把字节解析为顶层数组
    pub fn parse(data: &'a [u8]) -> BisonResult<Self> {
        Self::parse_with(data, CodecConfig::default())
    }

    pub fn parse_with(data: &'a [u8], config: CodecConfig) -> BisonResult<Self> {
        RawDocument::parse_with(data, config).map(|doc| RawArray { doc })
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.doc.data
    }

    /// 作为普通文档查看，不校验键
    pub fn as_document(&self) -> RawDocument<'a> {
        self.doc
    }

    pub fn iter(&self) -> RawArrayIter<'a> {
        RawArrayIter {
            inner: self.doc.iter(),
            index: 0,
            strict: self.doc.config.strict_array_keys,
        }
    }

    /// 校验全部键为从 "0" 开始的连续十进制串
    pub fn validate_keys(&self) -> BisonResult<()> {
        let mut iter = RawArrayIter {
            strict: true,
            ..self.iter()
        };
        iter.try_for_each(|element| element.map(drop))
    }

    /// 按位置取元素
    pub fn get(&self, index: usize) -> BisonResult<RawElement<'a>> {
        for (i, element) in self.iter().enumerate() {
            let element = element?;
            if i == index {
                return Ok(element);
            }
        }
        Err(BisonError::KeyNotFound(index.to_string()))
    }

    pub fn get_as<T: FromRaw<'a>>(&self, index: usize) -> BisonResult<T> {
        self.get(index)?.get()
    }

    /// 物化为拥有所有权的数组
    pub fn to_array(&self) -> BisonResult<Array> {
        let mut arr = Array::new();
        for element in self.iter() {
            arr.push(element?.to_value()?);
        }
        Ok(arr)
    }
}

impl<'a> IntoIterator for RawArray<'a> {
    type Item = BisonResult<RawElement<'a>>;
    type IntoIter = RawArrayIter<'a>;

    fn into_iter(self) -> RawArrayIter<'a> {
        self.iter()
    }
}

/// 数组元素迭代器
#[derive(Debug, Clone)]
pub struct RawArrayIter<'a> {
    inner: RawIter<'a>,
    index: usize,
    strict: bool,
}

impl<'a> Iterator for RawArrayIter<'a> {
    type Item = BisonResult<RawElement<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let element = match self.inner.next()? {
            Ok(element) => element,
            Err(e) => return Some(Err(e)),
        };
        let index = self.index;
        self.index += 1;
        if self.strict && !IndexKey::new(index).eq(element.key.bytes()) {
            self.inner.done = true;
            return Some(Err(BisonError::MalformedDocument(format!(
                "array key {:?} at position {}",
                element.key, index
            ))));
        }
        Some(Ok(element))
    }
}

/// 从已定界元素读取具体类型
///
/// 标记不符时返回 `TypeMismatch`。借用类型（`&str`、`BinaryRef`、
/// 嵌套视图）直接指向输入字节。
pub trait FromRaw<'a>: Sized {
    fn from_raw(element: &RawElement<'a>) -> BisonResult<Self>;
}

macro_rules! impl_from_raw_scalar {
    ($($ty:ty => $tag:ident, $decode:ident;)*) => {
        $(
            impl<'a> FromRaw<'a> for $ty {
                fn from_raw(element: &RawElement<'a>) -> BisonResult<Self> {
                    $decode(element.expect(TypeTag::$tag)?)
                }
            }
        )*
    };
}

impl_from_raw_scalar! {
    i32 => Int32, decode_i32;
    i64 => Int64, decode_i64;
    u64 => Uint64, decode_u64;
    f64 => Double, decode_f64;
    bool => Boolean, decode_bool;
}

impl<'a> FromRaw<'a> for &'a str {
    fn from_raw(element: &RawElement<'a>) -> BisonResult<Self> {
        decode_str(element.expect(TypeTag::String)?)
    }
}

impl<'a> FromRaw<'a> for BinaryRef<'a> {
    fn from_raw(element: &RawElement<'a>) -> BisonResult<Self> {
        decode_binary(element.expect(TypeTag::Binary)?)
    }
}

impl<'a> FromRaw<'a> for String {
    fn from_raw(element: &RawElement<'a>) -> BisonResult<Self> {
        <&str>::from_raw(element).map(str::to_string)
    }
}

impl<'a> FromRaw<'a> for Binary {
    fn from_raw(element: &RawElement<'a>) -> BisonResult<Self> {
        BinaryRef::from_raw(element).map(|b| b.to_binary())
    }
}

impl<'a> FromRaw<'a> for RawDocument<'a> {
    fn from_raw(element: &RawElement<'a>) -> BisonResult<Self> {
        element.as_document()
    }
}

impl<'a> FromRaw<'a> for RawArray<'a> {
    fn from_raw(element: &RawElement<'a>) -> BisonResult<Self> {
        element.as_array()
    }
}

impl<'a> FromRaw<'a> for Document {
    fn from_raw(element: &RawElement<'a>) -> BisonResult<Self> {
        element.as_document()?.to_document()
    }
}

impl<'a> FromRaw<'a> for Array {
    fn from_raw(element: &RawElement<'a>) -> BisonResult<Self> {
        element.as_array()?.to_array()
    }
}

impl<'a> FromRaw<'a> for Value {
    fn from_raw(element: &RawElement<'a>) -> BisonResult<Self> {
        element.to_value()
    }
}

impl<'a, T: FromRaw<'a>> FromRaw<'a> for Option<T> {
    fn from_raw(element: &RawElement<'a>) -> BisonResult<Self> {
        if element.tag == TypeTag::Null {
            return Ok(None);
        }
        T::from_raw(element).map(Some)
    }
}
