//! 日志订阅者的一次性安装。
//!
//! # 教案式说明
//! - **意图（Why）**：驱动与存储核心只通过 `tracing` 宏发出事件，是否输出、输出到哪里由宿主决定；
//!   本模块提供默认的 `fmt` + `EnvFilter` 组合，供独立运行的宿主或调试会话直接使用；
//! - **逻辑（How）**：`OnceLock` 记录安装状态，重复调用返回 [`DriverError::LoggingAlreadyInstalled`]；
//!   若外部已设置全局订阅者，同样视为已安装；
//! - **契约（What）**：过滤指令语法与 `RUST_LOG` 相同，解析失败返回 [`DriverError::Config`]。

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

use crate::{config::DriverConfig, error::DriverError};

static INSTALLED: OnceLock<()> = OnceLock::new();

/// 以给定过滤指令安装全局订阅者。
pub fn install_logging(directives: &str) -> Result<(), DriverError> {
    if INSTALLED.get().is_some() {
        return Err(DriverError::LoggingAlreadyInstalled);
    }
    let filter = EnvFilter::try_new(directives)
        .map_err(|err| DriverError::config(format!("log filter `{directives}`: {err}")))?;
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true));
    // 全局默认订阅者只能设置一次，并发安装时由它裁决唯一胜者。
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|_| DriverError::LoggingAlreadyInstalled)?;
    INSTALLED.get_or_init(|| ());
    tracing::debug!(directives, "logging installed");
    Ok(())
}

/// 优先使用 `RUST_LOG`，缺省时回落到配置中的 `log_filter`。
pub fn install_logging_from_env(config: &DriverConfig) -> Result<(), DriverError> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => install_logging(&directives),
        _ => install_logging(&config.log_filter),
    }
}

/// 是否已经通过本模块安装过订阅者。
pub fn is_installed() -> bool {
    INSTALLED.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_filter_is_a_config_error() {
        let err = install_logging("qdev_driver=loud").expect_err("非法指令应失败");
        assert_eq!(err.code(), "qdev.config.invalid");
        assert!(!is_installed());
    }
}
