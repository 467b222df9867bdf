use alloc::{boxed::Box, vec::Vec};
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::chain::Region;

/// 一次内存请求无法满足时返回的最小上下文。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AllocError {
    /// 请求的字节数。
    pub requested: usize,
}

/// `RegionAllocator` 描述存储核心向宿主索取内存的能力。
///
/// # 设计初衷（Why）
/// - 内核驱动中分配可能失败（`kmalloc` 返回空指针），用户态的 `Vec::with_capacity` 却会直接终止进程；
///   把分配显式建模为可失败的能力，ensure-capacity 才能如实上报 `AllocationFailure`；
/// - 测试与受限宿主可以注入配额型实现（见 [`QuotaAllocator`]），在不耗尽真实内存的前提下覆盖失败路径。
///
/// # 契约定义（What）
/// - `allocate_zeroed(len)`：成功时返回**恰好** `len` 字节且全部为 0 的块；
/// - `allocate_slots(slots)`：成功时返回长度恰为 `slots`、全部为 `None` 的区块地址表；
/// - 两个方法都提供基于 `try_reserve_exact` 的默认实现，实现者通常只需覆写其中的准入判断。
pub trait RegionAllocator: Send + Sync {
    /// 分配一块零填充的区块存储。
    fn allocate_zeroed(&self, len: usize) -> Result<Box<[u8]>, AllocError> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|_| AllocError { requested: len })?;
        bytes.resize(len, 0);
        Ok(bytes.into_boxed_slice())
    }

    /// 为新分块组分配整张区块地址表。
    fn allocate_slots(&self, slots: usize) -> Result<Vec<Option<Region>>, AllocError> {
        let mut table = Vec::new();
        table
            .try_reserve_exact(slots)
            .map_err(|_| AllocError {
                requested: slots.saturating_mul(core::mem::size_of::<Option<Region>>()),
            })?;
        table.resize_with(slots, || None);
        Ok(table)
    }
}

/// 直接使用全局堆的默认分配器。
#[derive(Clone, Copy, Debug, Default)]
pub struct HeapAllocator;

impl RegionAllocator for HeapAllocator {}

/// `QuotaAllocator` 在全局堆之上叠加“最多放行 N 次分配”的配额。
///
/// # 使用方式（How）
/// - 受限宿主可以用它为单个设备设置分配次数上限；
/// - 测试用它精确地让第 N+1 次分配失败，以验证回滚语义；
/// - 配额只减不增，被回滚释放的内存不会归还配额。
#[derive(Debug)]
pub struct QuotaAllocator {
    remaining: AtomicUsize,
    granted: AtomicUsize,
}

impl QuotaAllocator {
    pub fn new(quota: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(quota),
            granted: AtomicUsize::new(0),
        }
    }

    /// 剩余可放行的分配次数。
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Relaxed)
    }

    /// 已放行的分配次数。
    pub fn granted(&self) -> usize {
        self.granted.load(Ordering::Relaxed)
    }

    fn admit(&self, requested: usize) -> Result<(), AllocError> {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| {
                left.checked_sub(1)
            })
            .map_err(|_| AllocError { requested })?;
        self.granted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl RegionAllocator for QuotaAllocator {
    fn allocate_zeroed(&self, len: usize) -> Result<Box<[u8]>, AllocError> {
        self.admit(len)?;
        HeapAllocator.allocate_zeroed(len)
    }

    fn allocate_slots(&self, slots: usize) -> Result<Vec<Option<Region>>, AllocError> {
        self.admit(slots)?;
        HeapAllocator.allocate_slots(slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_allocator_returns_zeroed_exact_blocks() {
        let block = HeapAllocator.allocate_zeroed(16).expect("堆分配应成功");
        assert_eq!(block.len(), 16);
        assert!(block.iter().all(|byte| *byte == 0));

        let table = HeapAllocator.allocate_slots(5).expect("地址表分配应成功");
        assert_eq!(table.len(), 5);
        assert!(table.iter().all(Option::is_none));
    }

    #[test]
    fn quota_allocator_refuses_after_quota() {
        let quota = QuotaAllocator::new(2);
        assert!(quota.allocate_zeroed(4).is_ok());
        assert!(quota.allocate_slots(8).is_ok());
        assert_eq!(
            quota.allocate_zeroed(4),
            Err(AllocError { requested: 4 })
        );
        assert_eq!(quota.granted(), 2);
        assert_eq!(quota.remaining(), 0);
    }
}
