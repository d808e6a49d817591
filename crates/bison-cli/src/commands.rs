//! 子命令实现
//!
//! 命令函数只做输入解析与转换，返回要输出的内容，由 `main` 负责写出。

use crate::{CliError, CliResult, Formatter};
use bison_wire::json::{document_from_json, raw_to_json};
use bison_wire::{decode_with, CodecConfig, Encoder};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// `inspect` 的输出形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectOutput {
    Table,
    Json,
}

/// 读取输入文件
///
/// # Arguments
/// * `path` - 文件路径
/// * `hex` - 文件内容是否为十六进制文本（忽略空白）
pub fn read_input(path: &Path, hex: bool) -> CliResult<Vec<u8>> {
    let bytes = fs::read(path)?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    if !hex {
        return Ok(bytes);
    }
    let text = String::from_utf8(bytes)
        .map_err(|_| CliError::InvalidInput("hex input is not valid UTF-8".to_string()))?;
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(hex::decode(digits)?)
}

/// 解析文档并格式化输出
pub fn inspect(
    data: &[u8],
    config: &CodecConfig,
    output: InspectOutput,
    formatter: &Formatter,
) -> CliResult<String> {
    let raw = decode_with(data, config)?;
    info!("Inspecting document of {} bytes", data.len());
    match output {
        InspectOutput::Table => formatter.format_elements(&raw),
        InspectOutput::Json => Ok(serde_json::to_string_pretty(&raw_to_json(&raw)?)?),
    }
}

/// 将 JSON 对象文本编码为文档字节
pub fn encode_json(text: &str, config: &CodecConfig) -> CliResult<Vec<u8>> {
    let json: serde_json::Value = serde_json::from_str(text)?;
    let doc = document_from_json(&json)?;
    let bytes = Encoder::new(*config).encode_to_vec(&doc)?;
    info!("Encoded {} element(s) into {} bytes", doc.len(), bytes.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bison_wire::BisonError;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "name": "bison",
        "count": 3,
        "big": 1099511627776,
        "tags": ["a", "b"],
        "ts": {"$timestamp": {"t": 1, "i": 2}},
        "blob": {"$binary": {"base64": "AQID", "subType": "00"}},
        "none": null
    }"#;

    #[test]
    fn test_encode_then_inspect_json() {
        let config = CodecConfig::default();
        let bytes = encode_json(SAMPLE, &config).unwrap();
        let text = inspect(&bytes, &config, InspectOutput::Json, &Formatter::new(false)).unwrap();
        let round: serde_json::Value = serde_json::from_str(&text).unwrap();
        let original: serde_json::Value = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(round, original);
    }

    #[test]
    fn test_ok_document_bytes() {
        let bytes = encode_json(r#"{"ok": true}"#, &CodecConfig::default()).unwrap();
        assert_eq!(bytes, [0x0A, 0, 0, 0, 0x08, b'o', b'k', 0, 0x01, 0]);
    }

    #[test]
    fn test_read_hex_input() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0a000000 08 6f6b00\n01 00").unwrap();
        let bytes = read_input(file.path(), true).unwrap();
        assert_eq!(bytes, [0x0A, 0, 0, 0, 0x08, b'o', b'k', 0, 0x01, 0]);

        let text = inspect(
            &bytes,
            &CodecConfig::default(),
            InspectOutput::Table,
            &Formatter::new(false),
        )
        .unwrap();
        assert!(text.starts_with("ok  boolean  true\n"));
    }

    #[test]
    fn test_read_raw_input() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[5, 0, 0, 0, 0]).unwrap();
        assert_eq!(read_input(file.path(), false).unwrap(), [5, 0, 0, 0, 0]);
    }

    #[test]
    fn test_errors() {
        let config = CodecConfig::default();
        assert!(matches!(
            encode_json("[1, 2]", &config),
            Err(CliError::Codec(BisonError::Deserialization(_)))
        ));
        assert!(matches!(encode_json("{", &config), Err(CliError::Json(_))));
        assert!(matches!(
            inspect(&[1, 2, 3], &config, InspectOutput::Table, &Formatter::new(false)),
            Err(CliError::Codec(BisonError::DataTooShort { need: 5, actual: 3 }))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "zz").unwrap();
        assert!(matches!(read_input(file.path(), true), Err(CliError::Hex(_))));
    }

    #[test]
    fn test_size_limit_from_config() {
        let config = CodecConfig {
            max_document_size: 8,
            ..CodecConfig::default()
        };
        assert!(matches!(
            encode_json(SAMPLE, &config),
            Err(CliError::Codec(BisonError::DocumentTooLarge(8)))
        ));
    }
}
