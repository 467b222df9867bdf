//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为驱动层对外暴露的错误语义提供集中定义，覆盖句柄解析、注册冲突、存储失败、配置与日志安装；
//! - 每个变体都给出稳定错误码与宿主返回值，方便真实内核胶水直接 `return err.errno()`。
//!
//! ## 设计要求（What）
//! - 分配失败经由 [`DriverError::Storage`] 上报，宿主视其为设备级 I/O 错误；
//! - 容量超限不是错误，不在此处出现；
//! - 所有错误都对触发它的请求是致命的，但不影响设备描述符继续存在。

use nix::errno::Errno;
use qdev_store::StoreError;
use thiserror::Error;

use crate::registry::DeviceId;

/// 驱动层错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：让 open/write/teardown 的每条失败路径都有可辨识的类型，而不是笼统的 `-1`；
/// - **契约 (What)**：
///   - `InvalidHandle`：无法从调用上下文解析出设备，链不会被修改；
///   - `Storage`：存储核心的分配失败，链已回滚到调用前形态；
///   - `Config`：配置文本无法解析或参数为 0；
/// - **设计权衡 (Trade-offs)**：`Config` 只保存字符串描述，放弃保留底层错误类型以换取 `Clone + Eq`。
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum DriverError {
    /// 设备号未注册，或设备已被拆除。
    #[error("device {id} cannot be resolved")]
    InvalidHandle { id: DeviceId },

    /// 同一设备号被重复注册。
    #[error("device {id} is already registered")]
    DeviceExists { id: DeviceId },

    /// 以只读方式打开的句柄上发起了写入。
    #[error("device {id} was not opened for writing")]
    NotWritable { id: DeviceId },

    /// 存储核心的分配失败。
    ///
    /// 几何参数错误只会在构造设备时出现，经由 [`DriverError::Config`] 上报，不会落到这里。
    #[error("storage failure on device {id}: {source}")]
    Storage {
        id: DeviceId,
        #[source]
        source: StoreError,
    },

    /// 配置无法加载或校验失败。
    #[error("invalid driver configuration: {detail}")]
    Config { detail: String },

    /// 全局日志订阅者已经安装。
    #[error("logging subscriber is already installed")]
    LoggingAlreadyInstalled,
}

impl DriverError {
    /// 稳定错误码，用于日志与告警聚合。
    pub fn code(&self) -> &'static str {
        match self {
            DriverError::InvalidHandle { .. } => "qdev.device.invalid_handle",
            DriverError::DeviceExists { .. } => "qdev.device.exists",
            DriverError::NotWritable { .. } => "qdev.device.not_writable",
            DriverError::Storage { .. } => "qdev.storage.alloc",
            DriverError::Config { .. } => "qdev.config.invalid",
            DriverError::LoggingAlreadyInstalled => "qdev.telemetry.installed",
        }
    }

    /// 宿主回调应返回的负错误号。分配失败按设备级 I/O 错误上报。
    pub fn errno(&self) -> i32 {
        -(self.errno_kind() as i32)
    }

    /// 与 [`errno`](Self::errno) 对应的 `Errno` 取值。
    pub fn errno_kind(&self) -> Errno {
        match self {
            DriverError::InvalidHandle { .. } => Errno::ENODEV,
            DriverError::DeviceExists { .. } => Errno::EEXIST,
            DriverError::NotWritable { .. } => Errno::EBADF,
            DriverError::Storage { .. } => Errno::EIO,
            DriverError::Config { .. } => Errno::EINVAL,
            DriverError::LoggingAlreadyInstalled => Errno::EBUSY,
        }
    }

    pub(crate) fn storage(id: DeviceId, source: StoreError) -> Self {
        debug_assert!(source.is_allocation_failure());
        DriverError::Storage { id, source }
    }

    pub(crate) fn config(detail: impl Into<String>) -> Self {
        DriverError::Config {
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdev_store::AllocationTarget;

    #[test]
    fn allocation_failure_surfaces_as_io_error() {
        let err = DriverError::storage(
            DeviceId(0),
            StoreError::AllocationFailure {
                target: AllocationTarget::Region,
                index: 3,
                bytes: 4,
            },
        );
        assert_eq!(err.code(), "qdev.storage.alloc");
        assert_eq!(err.errno(), -(Errno::EIO as i32));
        assert_eq!(err.errno_kind(), Errno::EIO);
        assert!(err.to_string().contains("region #3"));
    }

    #[test]
    fn invalid_handle_maps_to_no_device() {
        let err = DriverError::InvalidHandle { id: DeviceId(7) };
        assert_eq!(err.errno(), -(Errno::ENODEV as i32));
        assert_eq!(err.to_string(), "device qdev7 cannot be resolved");
    }

    #[test]
    fn config_and_duplicate_errors_map_to_posix_codes() {
        assert_eq!(
            DriverError::config("device_count must be positive").errno(),
            -(Errno::EINVAL as i32)
        );
        assert_eq!(
            DriverError::DeviceExists { id: DeviceId(1) }.errno_kind(),
            Errno::EEXIST
        );
        assert_eq!(
            DriverError::NotWritable { id: DeviceId(1) }.errno_kind(),
            Errno::EBADF
        );
        assert_eq!(
            DriverError::LoggingAlreadyInstalled.errno_kind(),
            Errno::EBUSY
        );
    }
}
