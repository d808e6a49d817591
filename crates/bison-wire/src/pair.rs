//! 键值对模块
//!
//! 一个元素的线格式为 `[类型][键][NUL][值]`。键在构造时校验，
//! 不会推迟到编码阶段。

use crate::compose::NodeBytes;
use crate::value::Value;
use crate::{BisonError, BisonResult};
use compact_str::CompactString;

/// 校验键：非空且不含 NUL 字节
pub fn validate_key(key: &str) -> BisonResult<()> {
    if key.is_empty() || key.as_bytes().contains(&0) {
        return Err(BisonError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// 键值对
///
/// 本层不保证键唯一；重复键在线格式中合法，按键查找返回第一个匹配。
#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    key: CompactString,
    value: Value,
}

impl Pair {
    /// 创建键值对
    ///
    /// # Arguments
    /// * `key` - 非空、不含 NUL 的键
    /// * `value` - 任意可转换为 `Value` 的值
    ///
    /// # Returns
    /// 键无效时返回 `InvalidKey`
    pub fn new(key: impl Into<CompactString>, value: impl Into<Value>) -> BisonResult<Self> {
        let key = key.into();
        validate_key(&key)?;
        Ok(Self {
            key,
            value: value.into(),
        })
    }

    pub fn key(&self) -> &str {
        self.key.as_str()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_parts(self) -> (CompactString, Value) {
        (self.key, self.value)
    }

    /// 元素编码长度；值为 `Absent` 时为 0
    pub fn encoded_len(&self) -> BisonResult<usize> {
        if self.value.is_absent() {
            return Ok(0);
        }
        Ok(1 + self.key.len() + 1 + self.value.encoded_len()?)
    }

    pub(crate) fn wire_len(&self) -> usize {
        if self.value.is_absent() {
            return 0;
        }
        1 + self.key.len() + 1 + self.value.wire_len()
    }

    /// 编码为独立的元素字节
    pub fn encode(&self) -> BisonResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len()?);
        out.extend(self.bytes());
        Ok(out)
    }

    /// 惰性字节序列
    pub fn bytes(&self) -> NodeBytes<'_> {
        NodeBytes::pair(self.key.as_bytes(), &self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_layout() {
        let pair = Pair::new("ok", true).unwrap();
        assert_eq!(pair.encode().unwrap(), [0x08, b'o', b'k', 0x00, 0x01]);

        let pair = Pair::new("n", 1i32).unwrap();
        assert_eq!(pair.encode().unwrap(), [0x10, b'n', 0x00, 0x01, 0x00, 0x00, 0x00]);

        let pair = Pair::new("s", "A").unwrap();
        assert_eq!(
            pair.encode().unwrap(),
            [0x02, b's', 0x00, 0x02, 0x00, 0x00, 0x00, 0x41, 0x00]
        );
    }

    #[test]
    fn test_null_and_absent() {
        let pair = Pair::new("n", Value::Null).unwrap();
        assert_eq!(pair.encode().unwrap(), [0x0A, b'n', 0x00]);

        let pair = Pair::new("gone", Value::Absent).unwrap();
        assert_eq!(pair.encoded_len().unwrap(), 0);
        assert!(pair.encode().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_keys_rejected_at_construction() {
        assert_eq!(
            Pair::new("", 1i32),
            Err(BisonError::InvalidKey(String::new()))
        );
        assert_eq!(
            Pair::new("a\0b", 1i32),
            Err(BisonError::InvalidKey("a\0b".to_string()))
        );
    }

    #[test]
    fn test_encoded_len_matches_bytes() {
        let pair = Pair::new("key", 2.5f64).unwrap();
        assert_eq!(pair.encoded_len().unwrap(), pair.encode().unwrap().len());
    }
}
