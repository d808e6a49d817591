//! 线格式常量与类型标记

use std::fmt;

/// 文档最小长度：4 字节长度前缀 + 1 字节结束符
pub const MIN_DOCUMENT_SIZE: usize = 5;

/// 长度前缀字节数
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// 二进制值头部：4 字节长度 + 1 字节子类型
pub const BINARY_HEADER_SIZE: usize = 5;

/// 长度前缀可表示的最大值
pub const MAX_ENCODED_LENGTH: usize = i32::MAX as usize;

/// 元素类型标记
///
/// 每种值类型对应一个固定字节，由值的种类唯一确定。
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Double = 0x01,
    String = 0x02,
    Document = 0x03,
    Array = 0x04,
    Binary = 0x05,
    Boolean = 0x08,
    Null = 0x0A,
    Int32 = 0x10,
    Uint64 = 0x11,
    Int64 = 0x12,
}

impl TypeTag {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Double),
            0x02 => Some(Self::String),
            0x03 => Some(Self::Document),
            0x04 => Some(Self::Array),
            0x05 => Some(Self::Binary),
            0x08 => Some(Self::Boolean),
            0x0A => Some(Self::Null),
            0x10 => Some(Self::Int32),
            0x11 => Some(Self::Uint64),
            0x12 => Some(Self::Int64),
            _ => None,
        }
    }

    /// 定长类型的值字节数；变长类型返回 `None`
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Double | Self::Uint64 | Self::Int64 => Some(8),
            Self::Int32 => Some(4),
            Self::Boolean => Some(1),
            Self::Null => Some(0),
            Self::String | Self::Document | Self::Array | Self::Binary => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::String => "string",
            Self::Document => "document",
            Self::Array => "array",
            Self::Binary => "binary",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::Int32 => "int32",
            Self::Uint64 => "uint64",
            Self::Int64 => "int64",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 二进制子类型
///
/// 未列出的字节原样保留。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BinarySubtype(pub u8);

impl BinarySubtype {
    pub const GENERIC: Self = Self(0x00);
    pub const FUNCTION: Self = Self(0x01);
    pub const BINARY_OLD: Self = Self(0x02);
    pub const UUID_OLD: Self = Self(0x03);
    pub const UUID: Self = Self(0x04);
    pub const MD5: Self = Self(0x05);
    pub const ENCRYPTED: Self = Self(0x06);
    pub const COLUMN: Self = Self(0x07);

    pub fn is_user_defined(self) -> bool {
        self.0 >= 0x80
    }
}

impl From<u8> for BinarySubtype {
    fn from(byte: u8) -> Self {
        Self(byte)
    }
}

impl From<BinarySubtype> for u8 {
    fn from(subtype: BinarySubtype) -> Self {
        subtype.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_bytes() {
        for tag in [
            TypeTag::Double,
            TypeTag::String,
            TypeTag::Document,
            TypeTag::Array,
            TypeTag::Binary,
            TypeTag::Boolean,
            TypeTag::Null,
            TypeTag::Int32,
            TypeTag::Uint64,
            TypeTag::Int64,
        ] {
            assert_eq!(TypeTag::from_u8(tag as u8), Some(tag));
        }
        assert_eq!(TypeTag::from_u8(0x07), None);
        assert_eq!(TypeTag::from_u8(0x00), None);
    }

    #[test]
    fn test_fixed_sizes() {
        assert_eq!(TypeTag::Int32.fixed_size(), Some(4));
        assert_eq!(TypeTag::Double.fixed_size(), Some(8));
        assert_eq!(TypeTag::Null.fixed_size(), Some(0));
        assert_eq!(TypeTag::String.fixed_size(), None);
    }

    #[test]
    fn test_user_defined_subtype() {
        assert!(BinarySubtype(0x80).is_user_defined());
        assert!(!BinarySubtype::UUID.is_user_defined());
    }
}
