//! 错误类型定义模块
//!
//! 定义 bison 公共层的错误类型 CommonError 和 Result 别名。

use thiserror::Error;

/// 公共层错误类型
///
/// 覆盖配置加载与日志初始化过程中的错误。
#[derive(Error, Debug)]
pub enum CommonError {
    /// I/O 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 配置文件解析失败
    #[error("Config error: {0}")]
    Config(String),

    /// 日志系统初始化失败
    #[error("Logging error: {0}")]
    Logging(String),
}

/// 公共层 Result 类型别名
pub type CommonResult<T> = Result<T, CommonError>;
