//! 配置模块
//!
//! 定义编解码器与日志的配置项，支持从 TOML 文件加载：
//! - 编解码限制(文档最大体积、嵌套深度、数组键校验)
//! - 日志配置(级别、JSON 输出)

use crate::{CommonError, CommonResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// 编解码器配置
///
/// 编码与解码共用的限制项。`Copy` 语义，便于在嵌套解析时按值传递。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// 单个文档允许的最大字节数 (默认: 16 MiB)
    #[serde(default = "default_max_document_size")]
    pub max_document_size: usize,

    /// 文档/数组最大嵌套层级 (默认: 100)
    #[serde(default = "default_max_nesting_depth")]
    pub max_nesting_depth: usize,

    /// 遍历数组时是否校验键为 "0","1",... 的连续十进制串 (默认: true)
    #[serde(default = "default_strict_array_keys")]
    pub strict_array_keys: bool,
}

fn default_max_document_size() -> usize { 16 * 1024 * 1024 }
fn default_max_nesting_depth() -> usize { 100 }
fn default_strict_array_keys() -> bool { true }

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_document_size: default_max_document_size(),
            max_nesting_depth: default_max_nesting_depth(),
            strict_array_keys: default_strict_array_keys(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别或 EnvFilter 指令 (默认: info)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出 JSON 格式日志
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// 主配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BisonConfig {
    /// 编解码配置
    #[serde(default)]
    pub codec: CodecConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

impl BisonConfig {
    /// # Brief
    /// 从 TOML 文件加载配置
    ///
    /// # Arguments
    /// * `path` - 配置文件路径
    ///
    /// # Returns
    /// 解析后的配置实例
    pub fn from_file(path: &Path) -> CommonResult<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        debug!(
            "Loaded config from {}: max_document_size={}, max_nesting_depth={}",
            path.display(),
            config.codec.max_document_size,
            config.codec.max_nesting_depth
        );
        Ok(config)
    }

    /// # Brief
    /// 从 TOML 字符串解析配置，缺省字段使用默认值
    pub fn from_toml(content: &str) -> CommonResult<Self> {
        toml::from_str(content)
            .map_err(|e| CommonError::Config(format!("Failed to parse config: {}", e)))
    }

    /// # Brief
    /// 将配置序列化为 TOML 字符串
    pub fn to_toml(&self) -> CommonResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CommonError::Config(format!("Failed to serialize config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BisonConfig::default();
        assert_eq!(config.codec.max_document_size, 16 * 1024 * 1024);
        assert_eq!(config.codec.max_nesting_depth, 100);
        assert!(config.codec.strict_array_keys);
        assert_eq!(config.log.level, "info");
        assert!(!config.log.json);
    }

    #[test]
    fn test_partial_toml() {
        let config = BisonConfig::from_toml(
            r#"
            [codec]
            max_nesting_depth = 8

            [log]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.codec.max_nesting_depth, 8);
        assert_eq!(config.codec.max_document_size, 16 * 1024 * 1024);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = BisonConfig::default();
        config.codec.strict_array_keys = false;
        let text = config.to_toml().unwrap();
        assert_eq!(BisonConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[codec]\nmax_document_size = 1024").unwrap();
        let config = BisonConfig::from_file(file.path()).unwrap();
        assert_eq!(config.codec.max_document_size, 1024);
    }

    #[test]
    fn test_invalid_toml() {
        let err = BisonConfig::from_toml("[codec\n").unwrap_err();
        assert!(matches!(err, CommonError::Config(_)));
    }
}
