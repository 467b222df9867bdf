use std::fmt;

use parking_lot::MutexGuard;

use crate::{
    error::DriverError,
    registry::{DeviceId, DeviceSlot, SharedSlot},
    state::{AccessMode, ChainState},
};

/// 一次 open 得到的设备句柄，相当于宿主文件对象上的 `private_data`。
///
/// # 教案式说明
/// - **意图 (Why)**：write 回调不再从全局变量查找设备，而是直接使用 open 时解析好的句柄；
/// - **契约 (What)**：
///   - 句柄与仓储共享同一设备槽位，设备被拆除后所有操作返回 [`DriverError::InvalidHandle`]；
///   - 只读句柄上的写入返回 [`DriverError::NotWritable`]；
///   - `position` 只被 [`write_bytes`](Self::write_bytes) 推进，对应文件偏移；
/// - **执行 (How)**：每次操作在整段调用期间持有设备锁，保证同一设备上的增长与截断串行执行。
pub struct DeviceHandle {
    id: DeviceId,
    mode: AccessMode,
    slot: SharedSlot,
    position: usize,
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

impl DeviceHandle {
    pub(crate) fn new(id: DeviceId, mode: AccessMode, slot: SharedSlot) -> Self {
        Self {
            id,
            mode,
            slot,
            position: 0,
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// 当前文件偏移。
    pub fn position(&self) -> usize {
        self.position
    }

    fn live_slot(&self) -> Result<MutexGuard<'_, DeviceSlot>, DriverError> {
        let guard = self.slot.lock();
        if guard.retired {
            return Err(DriverError::InvalidHandle { id: self.id });
        }
        Ok(guard)
    }

    fn writable_slot(&self) -> Result<MutexGuard<'_, DeviceSlot>, DriverError> {
        if !self.mode.can_write() {
            return Err(DriverError::NotWritable { id: self.id });
        }
        self.live_slot()
    }

    /// 写入回调：把请求尺寸钳制到设备容量后扩展链，返回有效尺寸。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：
    ///   - 返回值是为本次请求预留的字节数，超出容量的部分被静默丢弃；
    ///   - 分配失败时返回 [`DriverError::Storage`]，链回到调用前形态，设备仍可继续使用；
    ///   - 写入只会让链增长，从不缩小。
    pub fn write(&mut self, requested: usize) -> Result<usize, DriverError> {
        tracing::debug!(device = %self.id, requested, "write begins");
        let mut guard = self.writable_slot()?;
        let effective = guard
            .device
            .clamp_and_grow(requested)
            .map_err(|source| DriverError::storage(self.id, source))
            .inspect_err(|err| {
                tracing::warn!(device = %self.id, code = err.code(), error = %err, "write failed");
            })?;
        tracing::debug!(device = %self.id, effective, "write ends");
        Ok(effective)
    }

    /// 在当前文件偏移处拷贝 `data`，返回实际写入的字节数并推进偏移。
    ///
    /// 超出设备容量的字节被丢弃；偏移已达容量时返回 0。
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<usize, DriverError> {
        tracing::debug!(
            device = %self.id,
            offset = self.position,
            len = data.len(),
            "byte write begins"
        );
        let copied = {
            let mut guard = self.writable_slot()?;
            guard
                .device
                .write_bytes(self.position, data)
                .map_err(|source| DriverError::storage(self.id, source))
                .inspect_err(|err| {
                    tracing::warn!(device = %self.id, code = err.code(), error = %err, "byte write failed");
                })?
        };
        self.position += copied;
        tracing::debug!(device = %self.id, copied, position = self.position, "byte write ends");
        Ok(copied)
    }

    /// 把文件偏移移到 `position`。
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    /// 设备链当前状态。
    pub fn state(&self) -> Result<ChainState, DriverError> {
        let guard = self.live_slot()?;
        Ok(ChainState::of(guard.device.chain()))
    }

    /// 当前已物化存储可寻址的字节数。
    pub fn addressable_bytes(&self) -> Result<usize, DriverError> {
        let guard = self.live_slot()?;
        Ok(guard.device.addressable_bytes())
    }

    /// release 回调：丢弃句柄，不修改链。
    pub fn release(self) {
        tracing::debug!(device = %self.id, mode = ?self.mode, "handle released");
    }
}
