//! 标量编解码
//!
//! 每种标量与其字节形式之间的纯函数转换。定长类型按小端写入；
//! 字符串与二进制带 4 字节小端长度前缀。

use crate::spec::{BinarySubtype, BINARY_HEADER_SIZE, LENGTH_PREFIX_SIZE, MAX_ENCODED_LENGTH};
use crate::value::BinaryRef;
use crate::{BisonError, BisonResult};

/// 将长度转换为 32 位长度前缀
///
/// # Brief
/// 超出 `i32::MAX` 时返回 `ValueTooLarge`
pub fn length_prefix(len: usize) -> BisonResult<[u8; 4]> {
    if len > MAX_ENCODED_LENGTH {
        return Err(BisonError::ValueTooLarge(len));
    }
    Ok((len as i32).to_le_bytes())
}

pub fn encode_i32(v: i32) -> [u8; 4] {
    v.to_le_bytes()
}

pub fn encode_i64(v: i64) -> [u8; 8] {
    v.to_le_bytes()
}

pub fn encode_u64(v: u64) -> [u8; 8] {
    v.to_le_bytes()
}

pub fn encode_f64(v: f64) -> [u8; 8] {
    v.to_bits().to_le_bytes()
}

pub fn encode_bool(v: bool) -> [u8; 1] {
    [v as u8]
}

/// 编码字符串
///
/// # Brief
/// 输出 `int32(len + 1) ++ utf8 ++ 0x00`，前缀计入结束符
///
/// # Returns
/// 长度无法用 32 位表示时返回 `ValueTooLarge`
pub fn encode_str(s: &str) -> BisonResult<Vec<u8>> {
    let prefix = length_prefix(s.len() + 1)?;
    let mut out = Vec::with_capacity(LENGTH_PREFIX_SIZE + s.len() + 1);
    out.extend_from_slice(&prefix);
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    Ok(out)
}

/// 编码二进制值
///
/// # Brief
/// 输出 `int32(len) ++ subtype ++ bytes`，前缀不计子类型字节
pub fn encode_binary(subtype: BinarySubtype, bytes: &[u8]) -> BisonResult<Vec<u8>> {
    let prefix = length_prefix(bytes.len())?;
    let mut out = Vec::with_capacity(BINARY_HEADER_SIZE + bytes.len());
    out.extend_from_slice(&prefix);
    out.push(subtype.0);
    out.extend_from_slice(bytes);
    Ok(out)
}

fn fixed<const N: usize>(data: &[u8]) -> BisonResult<[u8; N]> {
    data.try_into().map_err(|_| BisonError::SizeMismatch {
        expected: N as i64,
        actual: data.len() as i64,
    })
}

pub fn decode_i32(data: &[u8]) -> BisonResult<i32> {
    fixed::<4>(data).map(i32::from_le_bytes)
}

pub fn decode_i64(data: &[u8]) -> BisonResult<i64> {
    fixed::<8>(data).map(i64::from_le_bytes)
}

pub fn decode_u64(data: &[u8]) -> BisonResult<u64> {
    fixed::<8>(data).map(u64::from_le_bytes)
}

pub fn decode_f64(data: &[u8]) -> BisonResult<f64> {
    fixed::<8>(data).map(|b| f64::from_bits(u64::from_le_bytes(b)))
}

/// 解码布尔值，任意非零字节为 `true`
pub fn decode_bool(data: &[u8]) -> BisonResult<bool> {
    fixed::<1>(data).map(|[b]| b != 0)
}

/// 读取 4 字节小端长度前缀
///
/// 调用方需保证 `data` 至少 4 字节。
pub(crate) fn read_prefix(data: &[u8]) -> i32 {
    i32::from_le_bytes([data[0], data[1], data[2], data[3]])
}

/// 解码字符串
///
/// # Brief
/// 校验长度前缀与剩余字节数一致、末尾为 NUL，去掉结束符后按 UTF-8 解码。
/// 返回借用输入的 `&str`，不拷贝。
pub fn decode_str(data: &[u8]) -> BisonResult<&str> {
    if data.len() < LENGTH_PREFIX_SIZE + 1 {
        return Err(BisonError::DataTooShort {
            need: LENGTH_PREFIX_SIZE + 1,
            actual: data.len(),
        });
    }
    let declared = read_prefix(data) as i64;
    let remaining = (data.len() - LENGTH_PREFIX_SIZE) as i64;
    if declared != remaining {
        return Err(BisonError::SizeMismatch {
            expected: declared,
            actual: remaining,
        });
    }
    let (body, terminator) = data[LENGTH_PREFIX_SIZE..].split_at(data.len() - LENGTH_PREFIX_SIZE - 1);
    if terminator != [0] {
        return Err(BisonError::MalformedDocument(
            "string is not NUL-terminated".to_string(),
        ));
    }
    Ok(std::str::from_utf8(body)?)
}

/// 解码二进制值
///
/// # Brief
/// 要求至少 5 字节头部，且声明长度 + 5 等于切片总长
pub fn decode_binary(data: &[u8]) -> BisonResult<BinaryRef<'_>> {
    if data.len() < BINARY_HEADER_SIZE {
        return Err(BisonError::DataTooShort {
            need: BINARY_HEADER_SIZE,
            actual: data.len(),
        });
    }
    let declared = read_prefix(data) as i64;
    if declared + BINARY_HEADER_SIZE as i64 != data.len() as i64 {
        return Err(BisonError::SizeMismatch {
            expected: declared + BINARY_HEADER_SIZE as i64,
            actual: data.len() as i64,
        });
    }
    Ok(BinaryRef {
        subtype: BinarySubtype(data[LENGTH_PREFIX_SIZE]),
        bytes: &data[BINARY_HEADER_SIZE..],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_string_example() {
        let encoded = encode_str("A").unwrap();
        assert_eq!(encoded, [0x02, 0x00, 0x00, 0x00, 0x41, 0x00]);
        assert_eq!(decode_str(&encoded).unwrap(), "A");
    }

    #[test]
    fn test_empty_string() {
        let encoded = encode_str("").unwrap();
        assert_eq!(encoded, [0x01, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(decode_str(&encoded).unwrap(), "");
    }

    #[test]
    fn test_multibyte_string_prefix_counts_bytes() {
        let value = "this is a test! \u{10097}";
        let encoded = encode_str(value).unwrap();
        let declared = i32::from_le_bytes(encoded[..4].try_into().unwrap());
        assert_eq!(declared as usize, value.len() + 1);
        assert_eq!(decode_str(&encoded).unwrap(), value);
    }

    #[test]
    fn test_string_errors() {
        assert_eq!(
            decode_str(&[0x01, 0x00, 0x00]),
            Err(BisonError::DataTooShort { need: 5, actual: 3 })
        );
        assert_eq!(
            decode_str(&[0x03, 0x00, 0x00, 0x00, 0x41, 0x00]),
            Err(BisonError::SizeMismatch { expected: 3, actual: 2 })
        );
        assert!(matches!(
            decode_str(&[0x02, 0x00, 0x00, 0x00, 0x41, 0x42]),
            Err(BisonError::MalformedDocument(_))
        ));
        assert!(matches!(
            decode_str(&[0x02, 0x00, 0x00, 0x00, 0xFF, 0x00]),
            Err(BisonError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn test_fixed_width_mismatch() {
        assert_eq!(
            decode_i32(&[1, 2, 3]),
            Err(BisonError::SizeMismatch { expected: 4, actual: 3 })
        );
        assert_eq!(
            decode_f64(&[0; 9]),
            Err(BisonError::SizeMismatch { expected: 8, actual: 9 })
        );
        assert_eq!(
            decode_bool(&[]),
            Err(BisonError::SizeMismatch { expected: 1, actual: 0 })
        );
    }

    #[test]
    fn test_bool_nonzero_is_true() {
        assert_eq!(encode_bool(true), [1]);
        assert_eq!(encode_bool(false), [0]);
        assert!(decode_bool(&[0x7F]).unwrap());
        assert!(!decode_bool(&[0x00]).unwrap());
    }

    #[test]
    fn test_double_bit_pattern() {
        let v = 1.5f64;
        assert_eq!(encode_f64(v), v.to_bits().to_le_bytes());
        assert_eq!(decode_f64(&encode_f64(f64::NAN)).unwrap().to_bits(), f64::NAN.to_bits());
    }

    #[test]
    fn test_binary() {
        let encoded = encode_binary(BinarySubtype::MD5, &[0xAA, 0xBB]).unwrap();
        assert_eq!(encoded, [0x02, 0x00, 0x00, 0x00, 0x05, 0xAA, 0xBB]);
        let decoded = decode_binary(&encoded).unwrap();
        assert_eq!(decoded.subtype, BinarySubtype::MD5);
        assert_eq!(decoded.bytes, &[0xAA, 0xBB]);

        assert_eq!(
            decode_binary(&[0x00, 0x00, 0x00, 0x00]),
            Err(BisonError::DataTooShort { need: 5, actual: 4 })
        );
        assert_eq!(
            decode_binary(&[0x03, 0x00, 0x00, 0x00, 0x00, 0x01]),
            Err(BisonError::SizeMismatch { expected: 8, actual: 6 })
        );
    }

    #[test]
    fn test_length_prefix_overflow() {
        assert_eq!(length_prefix(5).unwrap(), [5, 0, 0, 0]);
        assert_eq!(length_prefix(i32::MAX as usize).unwrap(), i32::MAX.to_le_bytes());
        assert_eq!(
            length_prefix(i32::MAX as usize + 1),
            Err(BisonError::ValueTooLarge(i32::MAX as usize + 1))
        );
    }

    proptest! {
        #[test]
        fn prop_i32_round_trip(v in any::<i32>()) {
            prop_assert_eq!(decode_i32(&encode_i32(v)).unwrap(), v);
        }

        #[test]
        fn prop_i64_round_trip(v in any::<i64>()) {
            prop_assert_eq!(decode_i64(&encode_i64(v)).unwrap(), v);
        }

        #[test]
        fn prop_u64_round_trip(v in any::<u64>()) {
            prop_assert_eq!(decode_u64(&encode_u64(v)).unwrap(), v);
        }

        #[test]
        fn prop_f64_round_trip(v in any::<f64>()) {
            prop_assert_eq!(decode_f64(&encode_f64(v)).unwrap().to_bits(), v.to_bits());
        }

        #[test]
        fn prop_string_round_trip(s in ".*") {
            let encoded = encode_str(&s).unwrap();
            prop_assert_eq!(decode_str(&encoded).unwrap(), s.as_str());
        }

        #[test]
        fn prop_binary_round_trip(subtype in any::<u8>(), bytes in prop::collection::vec(any::<u8>(), 0..64)) {
            let encoded = encode_binary(BinarySubtype(subtype), &bytes).unwrap();
            let decoded = decode_binary(&encoded).unwrap();
            prop_assert_eq!(decoded.subtype, BinarySubtype(subtype));
            prop_assert_eq!(decoded.bytes, bytes.as_slice());
        }
    }
}
