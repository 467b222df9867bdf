//! # DeviceRegistry：设备仓储
//!
//! ## 核心意图（Why）
//! - 传统驱动以全局 `Dev *dev` 和全局计数器保存设备状态，隐含“只有一个实例”的假设；
//!   这里改为显式仓储，按设备号持有互相独立的描述符；
//! - 每个设备配一把互斥锁，open 截断、write 增长都在整段调用期间持锁，
//!   同一设备的并发请求被串行化，不同设备互不干扰。
//!
//! ## 行为契约（What）
//! - `create`：设备号已存在时返回 [`DriverError::DeviceExists`]；
//! - `open`：设备号未注册或已拆除时返回 [`DriverError::InvalidHandle`]，不修改任何链；
//!   只写打开会截断设备；
//! - `teardown`：先释放整条链，再从仓储移除；仍持有的句柄此后一律得到 `InvalidHandle`。
//!
//! ## 风险提示（Trade-offs）
//! - `DashMap` guard 只在解析设备时短暂持有，取到 `Arc` 后立即释放，再去获取设备锁，
//!   避免分片锁与设备锁嵌套。

use std::{fmt, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};
use parking_lot::Mutex;
use qdev_store::{Device, DeviceGeometry, RegionAllocator, ReleaseReport};

use crate::{
    config::DriverConfig,
    error::DriverError,
    handle::DeviceHandle,
    state::{AccessMode, ChainState},
};

/// 设备号，对应字符设备的次设备号。
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "qdev{}", self.0)
    }
}

/// 仓储中的一个设备槽位。`retired` 在拆除后置位，供仍持有句柄的调用方识别。
#[derive(Debug)]
pub(crate) struct DeviceSlot {
    pub(crate) device: Device,
    pub(crate) retired: bool,
}

pub(crate) type SharedSlot = Arc<Mutex<DeviceSlot>>;

/// `DeviceRegistry` 负责集中管理全部设备描述符。
///
/// # 教案式注释
/// - **意图 (Why)**：封装并发安全存储，调用方只通过设备号与句柄访问设备；
/// - **契约 (What)**：一个设备号至多对应一个描述符，描述符之间不共享分组或区块；
/// - **风险 (Trade-offs)**：仓储不限制设备数量，由配置的 `device_count` 约束创建规模。
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: DashMap<DeviceId, SharedSlot>,
}

impl DeviceRegistry {
    /// 创建空仓储。
    pub fn new() -> Self {
        Self::default()
    }

    /// 按配置创建 `device_count` 个设备，设备号为 `0..device_count`。
    pub fn from_config(config: &DriverConfig) -> Result<Self, DriverError> {
        config.validate()?;
        let geometry = config.geometry()?;
        let registry = Self::new();
        for minor in 0..config.device_count {
            registry.create(DeviceId(minor), geometry)?;
        }
        tracing::info!(
            name = %config.device_name,
            devices = config.device_count,
            region_size = config.region_size,
            regions_per_group = config.regions_per_group,
            capacity = config.device_capacity,
            "device registry initialised"
        );
        Ok(registry)
    }

    /// 以全局堆为后端注册一个空设备。
    pub fn create(&self, id: DeviceId, geometry: DeviceGeometry) -> Result<(), DriverError> {
        self.insert(id, Device::new(geometry))
    }

    /// 注入自定义分配器注册一个空设备。
    pub fn create_with_allocator(
        &self,
        id: DeviceId,
        geometry: DeviceGeometry,
        allocator: Arc<dyn RegionAllocator>,
    ) -> Result<(), DriverError> {
        self.insert(id, Device::with_allocator(geometry, allocator))
    }

    fn insert(&self, id: DeviceId, device: Device) -> Result<(), DriverError> {
        match self.devices.entry(id) {
            Entry::Occupied(_) => Err(DriverError::DeviceExists { id }),
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(Mutex::new(DeviceSlot {
                    device,
                    retired: false,
                })));
                tracing::debug!(device = %id, "device created");
                Ok(())
            }
        }
    }

    fn resolve(&self, id: DeviceId) -> Result<SharedSlot, DriverError> {
        self.devices
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(DriverError::InvalidHandle { id })
    }

    /// 打开设备，返回绑定该设备的句柄。
    ///
    /// # 教案式注释
    /// - **意图 (Why)**：对应宿主的 open 回调；只写打开意味着调用方要重写整个设备，因此先截断；
    /// - **契约 (What)**：
    ///   - 设备无法解析时返回 [`DriverError::InvalidHandle`]，链保持不变；
    ///   - `WriteOnly` 打开后链为空；`ReadOnly`/`ReadWrite` 打开不修改链；
    /// - **执行 (How)**：解析 `Arc` 后持设备锁完成截断，句柄持有同一 `Arc`。
    pub fn open(&self, id: DeviceId, mode: AccessMode) -> Result<DeviceHandle, DriverError> {
        tracing::debug!(device = %id, ?mode, "open begins");
        let slot = self.resolve(id).inspect_err(|_| {
            tracing::debug!(device = %id, "open failed: device cannot be resolved");
        })?;
        {
            let mut guard = slot.lock();
            if guard.retired {
                return Err(DriverError::InvalidHandle { id });
            }
            if mode.truncates() {
                let released = guard.device.truncate();
                tracing::debug!(
                    device = %id,
                    groups = released.groups_released,
                    regions = released.regions_released,
                    "device truncated on write-only open"
                );
            }
        }
        tracing::debug!(device = %id, "open ends");
        Ok(DeviceHandle::new(id, mode, slot))
    }

    /// 以只写方式打开设备，即“截断为空”。
    pub fn open_for_write(&self, id: DeviceId) -> Result<DeviceHandle, DriverError> {
        self.open(id, AccessMode::WriteOnly)
    }

    /// 拆除设备：释放整条链并从仓储移除。
    pub fn teardown(&self, id: DeviceId) -> Result<ReleaseReport, DriverError> {
        let (_, slot) = self
            .devices
            .remove(&id)
            .ok_or(DriverError::InvalidHandle { id })?;
        let mut guard = slot.lock();
        guard.retired = true;
        let report = guard.device.truncate();
        tracing::info!(
            device = %id,
            groups = report.groups_released,
            regions = report.regions_released,
            "device torn down"
        );
        Ok(report)
    }

    /// 拆除全部设备，对应模块卸载。
    pub fn teardown_all(&self) -> ReleaseReport {
        let mut total = ReleaseReport::default();
        for id in self.ids() {
            if let Ok(report) = self.teardown(id) {
                total.groups_released += report.groups_released;
                total.regions_released += report.regions_released;
            }
        }
        total
    }

    /// 查询设备链状态。
    pub fn state(&self, id: DeviceId) -> Result<ChainState, DriverError> {
        self.with_device(id, |device| ChainState::of(device.chain()))
    }

    /// 在设备锁内以只读方式访问描述符。
    pub fn with_device<R>(
        &self,
        id: DeviceId,
        inspect: impl FnOnce(&Device) -> R,
    ) -> Result<R, DriverError> {
        let slot = self.resolve(id)?;
        let guard = slot.lock();
        Ok(inspect(&guard.device))
    }

    /// 已注册的设备号，升序排列。
    pub fn ids(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self.devices.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn registry() -> DeviceRegistry {
        let registry = DeviceRegistry::new();
        registry
            .create(
                DeviceId(0),
                DeviceGeometry::new(4, 8, 128).expect("合法几何参数"),
            )
            .expect("注册应成功");
        registry
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let registry = registry();
        let err = registry
            .create(
                DeviceId(0),
                DeviceGeometry::new(4, 8, 128).expect("合法几何参数"),
            )
            .expect_err("重复注册应失败");
        assert_eq!(err, DriverError::DeviceExists { id: DeviceId(0) });
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn teardown_retires_outstanding_handles() {
        let registry = registry();
        let mut handle = registry
            .open(DeviceId(0), AccessMode::ReadWrite)
            .expect("打开应成功");
        handle.write(40).expect("写入应成功");
        let report = registry.teardown(DeviceId(0)).expect("拆除应成功");
        assert_eq!(report.regions_released, 10);
        assert!(registry.is_empty());
        assert_eq!(
            handle.write(4),
            Err(DriverError::InvalidHandle { id: DeviceId(0) })
        );
        assert!(registry.teardown(DeviceId(0)).is_err());
    }

    #[test]
    #[traced_test]
    fn write_only_open_logs_truncation() {
        let registry = registry();
        registry
            .open_for_write(DeviceId(0))
            .expect("打开应成功")
            .write(64)
            .expect("写入应成功");
        registry.open_for_write(DeviceId(0)).expect("再次打开应成功");
        assert!(logs_contain("device truncated on write-only open"));
        assert!(logs_contain("open ends"));
    }

    #[test]
    #[traced_test]
    fn oversized_write_logs_partial_write() {
        let registry = registry();
        let mut handle = registry.open_for_write(DeviceId(0)).expect("打开应成功");
        assert_eq!(handle.write(500), Ok(128));
        assert!(logs_contain("partial write"));
    }
}
