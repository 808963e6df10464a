//! 日志初始化
//!
//! 基于 `tracing_subscriber::fmt` 安装全局订阅者。`RUST_LOG` 优先于配置中的级别。

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::{ConfigResult, LoggingConfig};

/// 初始化日志系统
///
/// 重复调用是安全的：已有全局订阅者时只记录一条调试日志。
pub fn init_logging(config: &LoggingConfig) -> ConfigResult<()> {
    if !config.log_to_console && !config.log_to_file {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_filter()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.log_to_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file_path)?;
        builder
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init()
            .is_ok()
    } else {
        builder.with_writer(std::io::stderr).try_init().is_ok()
    };

    if installed {
        tracing::info!(target: "script_bridge::config", level = ?config.level, "Logging initialized");
    } else {
        tracing::debug!(target: "script_bridge::config", "Global subscriber already installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_init_logging_twice() {
        let config = LoggingConfig {
            level: LogLevel::Warn,
            ..Default::default()
        };
        assert!(init_logging(&config).is_ok());
        assert!(init_logging(&config).is_ok());
    }

    #[test]
    fn test_init_logging_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.log");
        let config = LoggingConfig {
            log_to_file: true,
            log_file_path: path.to_string_lossy().into_owned(),
            ..Default::default()
        };
        assert!(init_logging(&config).is_ok());
        assert!(path.exists());
    }

    #[test]
    fn test_disabled_logging_is_noop() {
        let config = LoggingConfig {
            log_to_console: false,
            log_to_file: false,
            ..Default::default()
        };
        assert!(init_logging(&config).is_ok());
    }
}
