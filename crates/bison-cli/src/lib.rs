//! # bison-cli - 文档检查与编码工具
//!
//! - `inspect`：解析文档并逐元素打印，或输出扩展 JSON
//! - `encode`：把 JSON 对象编码为文档字节

pub mod commands;
pub mod formatter;

pub use commands::{encode_json, inspect, read_input, InspectOutput};
pub use formatter::Formatter;

use bison_common::CommonError;
use bison_wire::BisonError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] BisonError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Hex error: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Config error: {0}")]
    Config(#[from] CommonError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type CliResult<T> = Result<T, CliError>;
