//! 日志初始化模块

use crate::{CommonError, CommonResult, LogConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 初始化全局 tracing 订阅者
///
/// 优先读取 `RUST_LOG` 环境变量，否则使用配置中的级别。
/// 重复初始化返回 `CommonError::Logging`。
pub fn init_logging(config: &LogConfig) -> CommonResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| CommonError::Logging(format!("Invalid log filter: {}", e)))?;

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| CommonError::Logging(e.to_string()))
}
