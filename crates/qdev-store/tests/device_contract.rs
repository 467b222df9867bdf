//! `device_contract` 集成测试：聚焦设备描述符的容量钳制与截断语义。
//!
//! - 钳制：请求超过容量时返回值恰为容量，链寻址的字节数也恰为容量向上取整到区块；
//! - 截断：截断后链为空，再次截断依旧为空，与新建设备等价；
//! - 字节拷贝：跨分组写入后内容可从区块中读回，超出容量的部分被丢弃。

use std::sync::Arc;

use proptest::prelude::*;
use qdev_store::{Device, DeviceGeometry, QuotaAllocator};

fn device(region_size: usize, per_group: usize, capacity: usize) -> Device {
    Device::new(DeviceGeometry::new(region_size, per_group, capacity).expect("合法几何参数"))
}

/// 容量 128 的设备收到 500 字节请求时，只为 128 字节预留空间。
#[test]
fn capacity_ceiling_example() {
    let mut dev = device(4, 8, 128);
    assert_eq!(dev.clamp_and_grow(500), Ok(128));
    assert_eq!(dev.addressable_bytes(), 128);
    assert_eq!(dev.chain().group_count(), 4);
    assert_eq!(dev.chain().region_count(), 32);
}

/// 连续两次截断后，设备与新建设备在链形状上无差别。
#[test]
fn truncate_twice_matches_fresh_device() {
    let mut dev = device(4, 8, 128);
    dev.clamp_and_grow(77).expect("增长应成功");
    dev.truncate();
    let second = dev.truncate();
    assert_eq!(second.groups_released, 0);
    assert!(dev.chain().is_empty());
    assert!(dev.chain().head().is_none());

    let fresh = device(4, 8, 128);
    assert_eq!(dev.chain().group_count(), fresh.chain().group_count());
    assert_eq!(dev.addressable_bytes(), fresh.addressable_bytes());
}

/// 截断后再次写入会重新从零填充的存储开始。
#[test]
fn regrowth_after_truncate_starts_from_zeroes() {
    let mut dev = device(4, 2, 64);
    dev.write_bytes(0, &[0xFF; 16]).expect("写入应成功");
    dev.truncate();
    dev.clamp_and_grow(16).expect("增长应成功");
    let all_zero = dev
        .chain()
        .groups()
        .flat_map(|group| group.regions())
        .all(|region| region.as_bytes().iter().all(|byte| *byte == 0));
    assert!(all_zero);
}

/// 跨分组边界写入的内容逐字节落在对应区块中。
#[test]
fn write_bytes_spans_groups() {
    let mut dev = device(3, 2, 64);
    let payload: Vec<u8> = (1..=14).collect();
    assert_eq!(dev.write_bytes(2, &payload), Ok(14));

    let stored: Vec<u8> = dev
        .chain()
        .groups()
        .flat_map(|group| group.regions())
        .flat_map(|region| region.as_bytes().iter().copied())
        .collect();
    assert_eq!(&stored[..2], &[0, 0]);
    assert_eq!(&stored[2..16], &payload[..]);
    assert_eq!(dev.chain().group_count(), 3);
}

/// 分配失败保持链原样，设备仍可继续使用。
#[test]
fn allocation_failure_keeps_device_usable() {
    let geometry = DeviceGeometry::new(4, 8, 128).expect("合法几何参数");
    let mut dev = Device::with_allocator(geometry, Arc::new(QuotaAllocator::new(3)));
    assert_eq!(dev.clamp_and_grow(8), Ok(8));
    assert!(dev.clamp_and_grow(64).is_err());
    assert_eq!(dev.addressable_bytes(), 8);
    assert_eq!(dev.clamp_and_grow(4), Ok(4));
}

proptest! {
    /// 对任意超出容量的请求，有效尺寸恰为容量，链只寻址容量对应的区块。
    #[test]
    fn clamp_returns_exact_capacity(
        region_size in 1usize..16,
        per_group in 1usize..8,
        capacity in 1usize..512,
        excess in 1usize..4096,
    ) {
        let mut dev = device(region_size, per_group, capacity);
        let effective = dev.clamp_and_grow(capacity + excess).expect("堆分配应成功");
        prop_assert_eq!(effective, capacity);
        let geometry = dev.geometry().chain();
        prop_assert_eq!(dev.chain().region_count(), geometry.regions_needed(capacity));
        prop_assert_eq!(dev.chain().group_count(), geometry.groups_needed(capacity));
    }
}
