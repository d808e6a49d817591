pub mod config;
pub mod error;
pub mod logging;

pub use config::{BisonConfig, CodecConfig, LogConfig};
pub use error::{CommonError, CommonResult};
pub use logging::init_logging;
