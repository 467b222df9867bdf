use alloc::sync::Arc;
use core::fmt;

use crate::{
    allocator::{HeapAllocator, RegionAllocator},
    chain::{ChunkChain, GrowthReport, ReleaseReport},
    error::StoreError,
    geometry::DeviceGeometry,
};

/// `Device` 是单个逻辑设备的描述符：冻结的几何参数加一条可增长的分块链。
///
/// # 模块角色（Why）
/// - 对应传统驱动中每个次设备号一份的 `Dev` 结构，但不再依赖进程级全局变量，
///   而是由注册表按设备独立持有；
/// - 写入路径只需调用 [`clamp_and_grow`](Self::clamp_and_grow)，截断路径调用 [`truncate`](Self::truncate)。
///
/// # 契约说明（What）
/// - `geometry` 创建后不可变，只有链会随写入与截断变化；
/// - 描述符本身不加锁，并发访问同一设备时由驱动层在整个调用期间持有互斥锁；
/// - 析构时链随之释放，等价于 teardown。
pub struct Device {
    geometry: DeviceGeometry,
    chain: ChunkChain,
    allocator: Arc<dyn RegionAllocator>,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("geometry", &self.geometry)
            .field("chain", &self.chain)
            .finish_non_exhaustive()
    }
}

impl Device {
    /// 以全局堆为后端创建空设备。
    pub fn new(geometry: DeviceGeometry) -> Self {
        Self::with_allocator(geometry, Arc::new(HeapAllocator))
    }

    /// 注入自定义分配器创建空设备，链初始为空。
    pub fn with_allocator(geometry: DeviceGeometry, allocator: Arc<dyn RegionAllocator>) -> Self {
        Self {
            geometry,
            chain: ChunkChain::new(),
            allocator,
        }
    }

    pub fn geometry(&self) -> &DeviceGeometry {
        &self.geometry
    }

    pub fn chain(&self) -> &ChunkChain {
        &self.chain
    }

    /// 设备容量上限。
    pub fn capacity(&self) -> usize {
        self.geometry.capacity()
    }

    /// 当前已物化存储可寻址的字节数。
    pub fn addressable_bytes(&self) -> usize {
        self.chain.addressable_bytes(self.geometry.chain())
    }

    /// 将写入请求钳制到容量上限后扩展链。
    ///
    /// # 教案式注释
    /// - **意图 (Why)**：设备采用“部分写入”策略，超出容量的请求只接受到容量为止，不视为错误；
    /// - **契约 (What)**：
    ///   - 返回有效尺寸 `min(requested, capacity)`，表示链已为该尺寸预留空间，而非实际拷贝的字节数；
    ///   - 分配失败时返回 [`StoreError::AllocationFailure`]，链保持调用前的形态；
    /// - **执行 (How)**：先按容量钳制，再调用 [`ChunkChain::ensure_capacity`]。
    pub fn clamp_and_grow(&mut self, requested: usize) -> Result<usize, StoreError> {
        let effective = self.geometry.clamp(requested);
        if effective < requested {
            tracing::debug!(
                requested,
                effective,
                capacity = self.geometry.capacity(),
                "partial write: request clamped to device capacity"
            );
        }
        let report = self.grow_to(effective)?;
        tracing::trace!(
            effective,
            groups_added = report.groups_added,
            regions_added = report.regions_added,
            "capacity reserved"
        );
        Ok(effective)
    }

    fn grow_to(&mut self, effective: usize) -> Result<GrowthReport, StoreError> {
        self.chain
            .ensure_capacity(effective, self.geometry.chain(), self.allocator.as_ref())
    }

    /// 从 `offset` 起写入 `data`，超出容量的字节被丢弃，返回实际拷贝的字节数。
    ///
    /// - 先为 `min(offset + data.len(), capacity)` 预留空间，再把落在容量以内的部分拷入区块；
    /// - `offset` 已达容量或 `data` 为空时不分配、不拷贝，返回 0。
    pub fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<usize, StoreError> {
        if offset >= self.capacity() || data.is_empty() {
            return Ok(0);
        }
        let end = offset.saturating_add(data.len());
        let writable = self.clamp_and_grow(end)? - offset;
        Ok(self
            .chain
            .copy_in(offset, &data[..writable], self.geometry.chain()))
    }

    /// 截断为空：释放整条链。对空设备为无操作。
    pub fn truncate(&mut self) -> ReleaseReport {
        self.chain.release_all()
    }

    /// 销毁描述符，先释放整条链。
    pub fn teardown(mut self) -> ReleaseReport {
        self.truncate()
    }
}
