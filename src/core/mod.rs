//! 核心模块
//!
//! 错误类型、日志初始化与通用宏。

pub mod error;
pub mod logging;
pub mod macros;

pub use error::{BridgeError, BridgeResult, HostException, MarshalError, ScriptException};
pub use logging::init_logging;
