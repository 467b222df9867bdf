#![cfg_attr(not(feature = "std"), no_std)]

//! `qdev-store` 提供伪设备驱动的存储核心：由分块组（chunk group）串成的惰性缓冲链。
//!
//! # 模块定位（Why）
//! - 伪设备的逻辑缓冲不要求一次性连续分配，而是按写入规模逐步物化固定大小的区块（region），
//!   并在设备以只写方式重新打开时整体释放；
//! - 该 crate 只关心“容量规划、链增长、零填充、截断”四件事，设备号分配与文件操作表等宿主胶水
//!   由上层的 `qdev-driver` 或真实内核承担。
//!
//! # 设计概要（How）
//! - [`geometry`]：`ChainGeometry`/`DeviceGeometry` 在构造期校验尺寸参数，并给出分组、区块的向上取整算术；
//! - [`allocator`]：`RegionAllocator` 将“产出零填充内存块或报告 OOM”的能力显式化，默认实现走可失败的堆分配；
//! - [`chain`]：`ChunkChain` 以索引寻址的 `Vec<ChunkGroup>` 代替裸 next 指针，负责 ensure-capacity 与 release-all；
//! - [`device`]：`Device` 描述符聚合几何参数与链，落地“按容量钳制后增长”的写入策略；
//! - [`error`]：`StoreError` 统一描述分配失败与非法几何参数。
//!
//! # 命名约定（Consistency）
//! - 文档中的 region 即传统驱动中的 quantum，chunk group 即 quantum set。

extern crate alloc;

pub mod allocator;
pub mod chain;
pub mod device;
pub mod error;
pub mod geometry;

pub use allocator::{AllocError, HeapAllocator, QuotaAllocator, RegionAllocator};
pub use chain::{ChunkChain, ChunkGroup, GrowthReport, Region, ReleaseReport};
pub use device::Device;
pub use error::{AllocationTarget, StoreError};
pub use geometry::{ChainGeometry, DeviceGeometry};
