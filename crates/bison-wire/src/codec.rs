//! 编解码入口模块
//!
//! 编码：先计算并校验总长度，再把惰性字节序列一次性写入缓冲区。
//! 解码：返回借用输入的 `RawDocument` 视图，字段按需物化。

use crate::raw::RawDocument;
use crate::scalar::length_prefix;
use crate::spec::{TypeTag, LENGTH_PREFIX_SIZE};
use crate::{BisonError, BisonResult};
use bison_common::CodecConfig;
use bytes::{BufMut, BytesMut};
use tracing::{debug, trace};

/// 可作为顶层编码单元的容器（文档或数组）
///
/// 容器的线格式统一为 `int32 总长 ++ 文档体 ++ 0x00`。
pub trait Body {
    /// 作为嵌套值时使用的类型标记
    const TAG: TypeTag;

    /// 文档体的惰性字节序列
    type Bytes<'a>: Iterator<Item = u8>
    where
        Self: 'a;

    /// 完整编码长度（含长度前缀与结束符）
    fn encoded_len(&self) -> BisonResult<usize>;

    /// 嵌套文档/数组的最大层数
    fn nesting_depth(&self) -> usize;

    /// 文档体字节（不含长度前缀与结束符）
    fn body_bytes(&self) -> Self::Bytes<'_>;
}

/// 编码器
///
/// 持有编解码配置，限制单个文档的最大体积与嵌套层数，
/// 与解码端使用同一组限制。
#[derive(Debug, Clone, Copy, Default)]
pub struct Encoder {
    config: CodecConfig,
}

impl Encoder {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// 编码容器到缓冲区
    ///
    /// # Brief
    /// 在缓冲区末尾追加完整的容器编码，不影响已有内容
    ///
    /// # Arguments
    /// * `body` - 要编码的文档或数组
    /// * `buf` - 目标缓冲区
    ///
    /// # Returns
    /// 长度超限时返回 `ValueTooLarge` 或 `DocumentTooLarge`，
    /// 嵌套过深时返回 `NestingTooDeep`，缓冲区保持原样
    pub fn encode<B: Body>(&self, body: &B, buf: &mut BytesMut) -> BisonResult<()> {
        let total = body.encoded_len()?;
        if total > self.config.max_document_size {
            debug!(
                "Rejecting document of {} bytes, limit is {}",
                total, self.config.max_document_size
            );
            return Err(BisonError::DocumentTooLarge(self.config.max_document_size));
        }
        let depth = body.nesting_depth();
        if depth > self.config.max_nesting_depth {
            debug!(
                "Rejecting document nested {} levels, limit is {}",
                depth, self.config.max_nesting_depth
            );
            return Err(BisonError::NestingTooDeep(self.config.max_nesting_depth));
        }

        let start = buf.len();
        buf.reserve(total);
        buf.put_i32_le(0);
        buf.extend(body.body_bytes());
        buf.put_u8(0);

        let written = buf.len() - start;
        let prefix = match length_prefix(written) {
            Ok(prefix) => prefix,
            Err(e) => {
                buf.truncate(start);
                return Err(e);
            }
        };
        buf[start..start + LENGTH_PREFIX_SIZE].copy_from_slice(&prefix);

        debug_assert_eq!(written, total);
        trace!("Encoded {} ({} bytes)", B::TAG, written);
        Ok(())
    }

    /// 编码容器为字节向量
    pub fn encode_to_vec<B: Body>(&self, body: &B) -> BisonResult<Vec<u8>> {
        let mut buf = BytesMut::new();
        self.encode(body, &mut buf)?;
        Ok(buf.to_vec())
    }
}

/// 使用默认配置编码到缓冲区
pub fn encode<B: Body>(body: &B, buf: &mut BytesMut) -> BisonResult<()> {
    Encoder::default().encode(body, buf)
}

/// 使用默认配置编码为字节向量
///
/// # Arguments
/// * `body` - 要编码的文档或数组
///
/// # Returns
/// 成功返回完整编码, 失败返回错误
pub fn encode_to_vec<B: Body>(body: &B) -> BisonResult<Vec<u8>> {
    Encoder::default().encode_to_vec(body)
}

/// 使用默认配置解析文档
///
/// # Brief
/// 校验长度前缀与结束符，返回借用输入的视图；元素在遍历时才校验
pub fn decode(data: &[u8]) -> BisonResult<RawDocument<'_>> {
    RawDocument::parse(data)
}

/// 使用指定配置解析文档
pub fn decode_with<'a>(data: &'a [u8], config: &CodecConfig) -> BisonResult<RawDocument<'a>> {
    RawDocument::parse_with(data, *config)
}
