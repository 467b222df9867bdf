//! # 分块组链（ChunkChain）
//!
//! ## 核心意图（Why）
//! - 用一串固定容量的分块组表示可扩展的逻辑缓冲，避免为整段数据申请单块连续内存；
//! - 以 `Vec<ChunkGroup>` 的索引顺序表达“链”，分组与区块的所有权由类型系统保证独占，
//!   不存在被两个设备同时引用的分组。
//!
//! ## 结构不变式（What）
//! - 分组按创建顺序排列，每个分组的槽位表长度恒为 `regions_per_group`；
//! - 已物化的区块在全链上构成前缀：除最后一个分组外，所有分组都是满的，最后一个分组至少有一个区块；
//! - 新区块在被放入链之前已全部置零。
//!
//! ## 操作概览（How）
//! 1. [`ChunkChain::ensure_capacity`]：补齐缺失的分组，再按顺序补齐缺失的区块；失败时整体回滚；
//! 2. [`ChunkChain::release_all`]：按链顺序释放全部区块与分组，幂等；
//! 3. [`ChunkChain::copy_in`]：把字节拷入已物化的区块，跨越区块与分组边界。

use alloc::{boxed::Box, vec::Vec};
use core::mem;

use crate::{
    allocator::RegionAllocator,
    error::{AllocationTarget, StoreError},
    geometry::ChainGeometry,
};

/// 固定大小的字节块，链中最小的存储单位。
#[derive(Debug, PartialEq, Eq)]
pub struct Region {
    bytes: Box<[u8]>,
}

impl Region {
    fn from_zeroed(bytes: Box<[u8]>) -> Self {
        debug_assert!(bytes.iter().all(|byte| *byte == 0), "分配器必须返回零填充内存");
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

/// 分块组：一张整体分配的区块地址表。
///
/// # 教案式说明
/// - **意图 (Why)**：与传统驱动的 quantum set 对应，先整体分配 `regions_per_group` 个槽位，再逐个物化区块；
/// - **契约 (What)**：`populated` 个槽位为 `Some`，其余槽位为 `None`，表示尚未物化的存储；
/// - **风险 (Trade-offs)**：槽位表随分组一次性分配，稀疏写入时会为未使用槽位付出指针宽度的开销。
#[derive(Debug)]
pub struct ChunkGroup {
    slots: Vec<Option<Region>>,
    populated: usize,
}

impl ChunkGroup {
    fn from_slots(slots: Vec<Option<Region>>) -> Self {
        debug_assert!(slots.iter().all(Option::is_none));
        Self {
            slots,
            populated: 0,
        }
    }

    /// 槽位总数，即 `regions_per_group`。
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 已物化的区块数。
    pub fn populated(&self) -> usize {
        self.populated
    }

    pub fn is_full(&self) -> bool {
        self.populated == self.slots.len()
    }

    /// 读取第 `slot` 个区块；未物化或越界时为 `None`。
    pub fn region(&self, slot: usize) -> Option<&Region> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn region_mut(&mut self, slot: usize) -> Option<&mut Region> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    /// 按槽位顺序遍历已物化的区块。
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.slots[..self.populated].iter().flatten()
    }

    fn push_region(&mut self, region: Region) {
        self.slots[self.populated] = Some(region);
        self.populated += 1;
    }

    /// 释放 `keep` 之后的区块，用于失败回滚。
    fn truncate_regions(&mut self, keep: usize) {
        let keep = keep.min(self.populated);
        for slot in &mut self.slots[keep..self.populated] {
            *slot = None;
        }
        self.populated = keep;
    }
}

/// 一次 ensure-capacity 新增的对象数量。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GrowthReport {
    pub groups_added: usize,
    pub regions_added: usize,
}

impl GrowthReport {
    /// 本次调用是否没有触发任何分配。
    pub fn is_noop(&self) -> bool {
        self.groups_added == 0 && self.regions_added == 0
    }
}

/// 一次 release-all 释放的对象数量。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReleaseReport {
    pub groups_released: usize,
    pub regions_released: usize,
}

/// 增长前的形态快照，回滚时据此截断。
#[derive(Clone, Copy)]
struct Checkpoint {
    groups: usize,
    tail_populated: usize,
}

/// 设备的逻辑缓冲：按创建顺序排列的分块组序列。
#[derive(Debug, Default)]
pub struct ChunkChain {
    groups: Vec<ChunkGroup>,
}

impl ChunkChain {
    /// 创建空链，头部缺省。
    pub fn new() -> Self {
        Self::default()
    }

    /// 链是否为空（没有任何分组）。
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// 全链已物化的区块总数。
    pub fn region_count(&self) -> usize {
        self.groups.iter().map(ChunkGroup::populated).sum()
    }

    /// 已物化区块可寻址的字节数。
    pub fn addressable_bytes(&self, geometry: &ChainGeometry) -> usize {
        self.region_count() * geometry.region_size()
    }

    /// 链头分组。
    pub fn head(&self) -> Option<&ChunkGroup> {
        self.groups.first()
    }

    pub fn group(&self, index: usize) -> Option<&ChunkGroup> {
        self.groups.get(index)
    }

    /// 按链顺序遍历分组。
    pub fn groups(&self) -> impl Iterator<Item = &ChunkGroup> {
        self.groups.iter()
    }

    /// 确保链足以寻址 `logical_size` 字节。
    ///
    /// # 教案式注释
    /// - **意图 (Why)**：写入驱动只声明“需要多大”，由链决定补哪些分组、哪些区块；
    /// - **契约 (What)**：
    ///   - 成功后链至少包含 `groups_needed` 个分组、`regions_needed` 个区块，已有分组与区块原样保留；
    ///   - 新区块全部为 0；
    ///   - 任一分配失败时返回 [`StoreError::AllocationFailure`]，并把本次新增的分组与区块全部释放，
    ///     链恢复到调用前的形态；
    /// - **执行 (How)**：先记录快照，再依次补齐分组与区块；失败路径按快照截断。
    pub fn ensure_capacity(
        &mut self,
        logical_size: usize,
        geometry: &ChainGeometry,
        allocator: &dyn RegionAllocator,
    ) -> Result<GrowthReport, StoreError> {
        let checkpoint = self.checkpoint();
        match self.grow(logical_size, geometry, allocator) {
            Ok(report) => Ok(report),
            Err(err) => {
                self.rollback(checkpoint);
                tracing::warn!(
                    logical_size,
                    error = ?err,
                    groups = self.groups.len(),
                    "chain growth failed, newly added storage released"
                );
                Err(err)
            }
        }
    }

    fn grow(
        &mut self,
        logical_size: usize,
        geometry: &ChainGeometry,
        allocator: &dyn RegionAllocator,
    ) -> Result<GrowthReport, StoreError> {
        let groups_needed = geometry.groups_needed(logical_size);
        let regions_needed = geometry.regions_needed(logical_size);
        let per_group = geometry.regions_per_group();
        let mut report = GrowthReport::default();

        if groups_needed > self.groups.len() {
            let missing = groups_needed - self.groups.len();
            self.groups.try_reserve_exact(missing).map_err(|_| {
                StoreError::allocation(
                    AllocationTarget::Chain,
                    self.groups.len(),
                    missing.saturating_mul(mem::size_of::<ChunkGroup>()),
                )
            })?;
            while self.groups.len() < groups_needed {
                let index = self.groups.len();
                let slots = allocator.allocate_slots(per_group).map_err(|err| {
                    StoreError::allocation(AllocationTarget::SlotTable, index, err.requested)
                })?;
                self.groups.push(ChunkGroup::from_slots(slots));
                report.groups_added += 1;
            }
        }

        let mut remaining = regions_needed;
        for (group_index, group) in self.groups.iter_mut().enumerate() {
            if remaining == 0 {
                break;
            }
            let target = remaining.min(group.capacity());
            while group.populated() < target {
                let region_index = group_index * per_group + group.populated();
                let bytes = allocator
                    .allocate_zeroed(geometry.region_size())
                    .map_err(|err| {
                        StoreError::allocation(
                            AllocationTarget::Region,
                            region_index,
                            err.requested,
                        )
                    })?;
                debug_assert_eq!(bytes.len(), geometry.region_size());
                group.push_region(Region::from_zeroed(bytes));
                report.regions_added += 1;
            }
            remaining -= target;
        }

        Ok(report)
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            groups: self.groups.len(),
            tail_populated: self.groups.last().map_or(0, ChunkGroup::populated),
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        self.groups.truncate(checkpoint.groups);
        if let Some(tail) = self.groups.last_mut() {
            tail.truncate_regions(checkpoint.tail_populated);
        }
    }

    /// 释放全部区块与分组，头部回到缺省状态。
    ///
    /// - **契约 (What)**：对空链调用为无操作；释放不会失败；
    /// - **执行 (How)**：取出整个分组序列后按链顺序逐个析构，分组析构时先释放其区块。
    pub fn release_all(&mut self) -> ReleaseReport {
        let report = ReleaseReport {
            groups_released: self.groups.len(),
            regions_released: self.region_count(),
        };
        drop(mem::take(&mut self.groups));
        report
    }

    /// 把 `data` 拷入从 `offset` 开始的已物化区块，返回实际拷贝的字节数。
    ///
    /// 遇到尚未物化的区块即停止，调用方应先通过 [`ensure_capacity`](Self::ensure_capacity) 预留空间。
    pub fn copy_in(&mut self, offset: usize, data: &[u8], geometry: &ChainGeometry) -> usize {
        let mut copied = 0;
        while copied < data.len() {
            let (group_index, slot, within) = geometry.locate(offset + copied);
            let Some(region) = self
                .groups
                .get_mut(group_index)
                .and_then(|group| group.region_mut(slot))
            else {
                break;
            };
            let room = region.len() - within;
            let take = room.min(data.len() - copied);
            region.as_bytes_mut()[within..within + take]
                .copy_from_slice(&data[copied..copied + take]);
            copied += take;
        }
        copied
    }
}
