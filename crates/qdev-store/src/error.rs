//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为存储核心对外暴露的失败语义提供集中定义：要么是某次分配无法满足，要么是几何参数非法；
//! - 容量超限不属于错误，它在 [`Device::clamp_and_grow`](crate::Device::clamp_and_grow) 中被静默钳制，
//!   调用方通过返回的有效尺寸观察到钳制结果。
//!
//! ## 设计要求（What）
//! - 启用 `std` 时派生 `thiserror::Error`，否则手写 `Display`，保持 `no_std` 可用；
//! - 错误不在内部重试，由直接调用方决定如何上报。

#[cfg(not(feature = "std"))]
use core::fmt;

#[cfg(feature = "std")]
use thiserror::Error;

/// 分配失败发生在哪一类对象上。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AllocationTarget {
    /// 链本身的分组索引表扩容失败。
    Chain,
    /// 新分块组的区块地址表（`regions_per_group` 个槽位）分配失败。
    SlotTable,
    /// 单个区块的字节存储分配失败。
    Region,
}

impl AllocationTarget {
    /// 稳定的小写标签，用于日志字段与错误码拼接。
    pub fn as_str(self) -> &'static str {
        match self {
            AllocationTarget::Chain => "chain",
            AllocationTarget::SlotTable => "slot_table",
            AllocationTarget::Region => "region",
        }
    }
}

#[cfg(feature = "std")]
impl std::fmt::Display for AllocationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(not(feature = "std"))]
impl fmt::Display for AllocationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 存储核心错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：把 ensure-capacity 路径上所有可能的失败收敛为两个变体，
///   让驱动层可以稳定地映射为设备级 I/O 错误或参数错误；
/// - **契约 (What)**：
///   - `AllocationFailure` 发生后，链已回滚到调用前的形态（见 [`ChunkChain::ensure_capacity`](crate::ChunkChain::ensure_capacity)）；
///   - `InvalidGeometry` 只会在构造几何参数时出现，设备创建后不会再产生；
/// - **设计权衡 (Trade-offs)**：`reason` 使用 `&'static str`，避免在 `no_std` 下为错误消息分配堆内存。
#[cfg_attr(feature = "std", derive(Error))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StoreError {
    /// 某个分块组或区块的分配无法满足。
    ///
    /// - `target`：失败的对象类别；
    /// - `index`：失败对象在链中的序号（分组序号或全链区块序号）；
    /// - `bytes`：本次请求的字节数。
    #[cfg_attr(
        feature = "std",
        error("allocation of {target} #{index} ({bytes} bytes) could not be satisfied")
    )]
    AllocationFailure {
        target: AllocationTarget,
        index: usize,
        bytes: usize,
    },

    /// 几何参数不合法，例如区块大小为 0 或分组跨度溢出。
    #[cfg_attr(feature = "std", error("invalid device geometry: {reason}"))]
    InvalidGeometry { reason: &'static str },
}

impl StoreError {
    /// 构造分配失败错误的便捷入口。
    pub(crate) fn allocation(target: AllocationTarget, index: usize, bytes: usize) -> Self {
        StoreError::AllocationFailure {
            target,
            index,
            bytes,
        }
    }

    /// 是否为分配失败，驱动层据此决定上报为 I/O 错误。
    pub fn is_allocation_failure(&self) -> bool {
        matches!(self, StoreError::AllocationFailure { .. })
    }
}

#[cfg(not(feature = "std"))]
impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::AllocationFailure {
                target,
                index,
                bytes,
            } => write!(
                f,
                "allocation of {target} #{index} ({bytes} bytes) could not be satisfied"
            ),
            StoreError::InvalidGeometry { reason } => {
                write!(f, "invalid device geometry: {reason}")
            }
        }
    }
}
