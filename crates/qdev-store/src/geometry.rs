//! 分块链的几何参数与尺寸算术。
//!
//! # 教案式说明
//! - **意图（Why）**：区块大小、每组区块数、设备容量在设备创建时固定且此后不可变；
//!   把它们封装为只读值类型，可以在构造期一次性拒绝 0 值与溢出，后续算术无需再防御；
//! - **逻辑（How）**：`groups_needed = ceil(size / (region_size * regions_per_group))`，
//!   `regions_needed = ceil(size / region_size)`，均以 `usize::div_ceil` 计算；
//! - **契约（What）**：两个比例参数恒为正，分组跨度 `region_size * regions_per_group` 不溢出。

use core::num::NonZeroUsize;

use crate::error::StoreError;

/// 链的形状参数：区块大小与每组区块数。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ChainGeometry {
    region_size: NonZeroUsize,
    regions_per_group: NonZeroUsize,
    group_span: NonZeroUsize,
}

impl ChainGeometry {
    /// 校验并构造链几何参数。
    ///
    /// # 契约 (What)
    /// - `region_size`、`regions_per_group` 必须大于 0；
    /// - 两者乘积必须能以 `usize` 表示，否则返回 [`StoreError::InvalidGeometry`]。
    pub fn new(region_size: usize, regions_per_group: usize) -> Result<Self, StoreError> {
        let region_size = NonZeroUsize::new(region_size).ok_or(StoreError::InvalidGeometry {
            reason: "region size must be positive",
        })?;
        let regions_per_group =
            NonZeroUsize::new(regions_per_group).ok_or(StoreError::InvalidGeometry {
                reason: "regions per group must be positive",
            })?;
        let group_span =
            region_size
                .checked_mul(regions_per_group)
                .ok_or(StoreError::InvalidGeometry {
                    reason: "group span overflows usize",
                })?;
        Ok(Self {
            region_size,
            regions_per_group,
            group_span,
        })
    }

    /// 单个区块的字节数。
    pub fn region_size(&self) -> usize {
        self.region_size.get()
    }

    /// 每个分块组的槽位数。
    pub fn regions_per_group(&self) -> usize {
        self.regions_per_group.get()
    }

    /// 一个满载分块组可寻址的字节数。
    pub fn group_span(&self) -> usize {
        self.group_span.get()
    }

    /// 寻址 `logical_size` 字节所需的分块组数量。
    pub fn groups_needed(&self, logical_size: usize) -> usize {
        logical_size.div_ceil(self.group_span.get())
    }

    /// 寻址 `logical_size` 字节所需的区块总数。
    pub fn regions_needed(&self, logical_size: usize) -> usize {
        logical_size.div_ceil(self.region_size.get())
    }

    /// 将逻辑字节偏移映射为 `(分组序号, 槽位序号, 区块内偏移)`。
    pub fn locate(&self, offset: usize) -> (usize, usize, usize) {
        let region = offset / self.region_size.get();
        (
            region / self.regions_per_group.get(),
            region % self.regions_per_group.get(),
            offset % self.region_size.get(),
        )
    }
}

/// 设备描述符的全部不可变参数：链几何 + 容量上限。
///
/// # 教案式说明
/// - **意图 (Why)**：容量上限决定写入请求被钳制到多大，与链形状一起在创建时冻结；
/// - **契约 (What)**：`capacity > 0`；[`clamp`](Self::clamp) 的结果永不超过 `capacity`。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct DeviceGeometry {
    chain: ChainGeometry,
    capacity: NonZeroUsize,
}

impl DeviceGeometry {
    /// 以三个正整数构造设备几何参数。
    pub fn new(
        region_size: usize,
        regions_per_group: usize,
        capacity: usize,
    ) -> Result<Self, StoreError> {
        let chain = ChainGeometry::new(region_size, regions_per_group)?;
        let capacity = NonZeroUsize::new(capacity).ok_or(StoreError::InvalidGeometry {
            reason: "device capacity must be positive",
        })?;
        Ok(Self { chain, capacity })
    }

    pub fn chain(&self) -> &ChainGeometry {
        &self.chain
    }

    /// 设备可物化的最大逻辑字节数。
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// 将请求尺寸钳制到容量上限以内，得到有效尺寸。
    pub fn clamp(&self, requested: usize) -> usize {
        requested.min(self.capacity.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizing_rounds_up_to_whole_groups_and_regions() {
        let geometry = ChainGeometry::new(4, 8).expect("合法几何参数");
        assert_eq!(geometry.group_span(), 32);
        assert_eq!(geometry.groups_needed(40), 2);
        assert_eq!(geometry.regions_needed(40), 10);
        assert_eq!(geometry.groups_needed(32), 1);
        assert_eq!(geometry.regions_needed(33), 9);
        assert_eq!(geometry.groups_needed(0), 0);
        assert_eq!(geometry.regions_needed(0), 0);
    }

    #[test]
    fn zero_and_overflowing_parameters_are_rejected() {
        assert!(matches!(
            ChainGeometry::new(0, 8),
            Err(StoreError::InvalidGeometry { .. })
        ));
        assert!(matches!(
            ChainGeometry::new(4, 0),
            Err(StoreError::InvalidGeometry { .. })
        ));
        assert!(matches!(
            ChainGeometry::new(usize::MAX, 2),
            Err(StoreError::InvalidGeometry { .. })
        ));
        assert!(matches!(
            DeviceGeometry::new(4, 8, 0),
            Err(StoreError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn locate_splits_offset_across_groups() {
        let geometry = ChainGeometry::new(4, 8).expect("合法几何参数");
        assert_eq!(geometry.locate(0), (0, 0, 0));
        assert_eq!(geometry.locate(31), (0, 7, 3));
        assert_eq!(geometry.locate(33), (1, 0, 1));
    }

    #[test]
    fn clamp_never_exceeds_capacity() {
        let geometry = DeviceGeometry::new(4, 8, 128).expect("合法几何参数");
        assert_eq!(geometry.clamp(500), 128);
        assert_eq!(geometry.clamp(128), 128);
        assert_eq!(geometry.clamp(7), 7);
    }
}
