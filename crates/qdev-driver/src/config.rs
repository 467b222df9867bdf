//! 驱动配置：由 TOML 描述的模块参数。
//!
//! # 教案式说明
//! - **意图（Why）**：传统驱动把区块大小、每组区块数、设备容量与设备数量写成编译期宏或模块参数；
//!   这里把它们收敛为一份可反序列化的结构，便于测试与宿主按需覆盖；
//! - **逻辑（How）**：`serde` 反序列化，缺省字段回落到 [`DriverConfig::default`]，未知字段直接拒绝；
//!   [`DriverConfig::geometry`] 负责把数值校验为 [`DeviceGeometry`]；
//! - **契约（What）**：`device_count` 与三个尺寸参数必须为正，否则返回 [`DriverError::Config`]。
//!
//! ```toml
//! device_name = "qdev"
//! device_count = 4
//! region_size = 4000
//! regions_per_group = 1000
//! device_capacity = 1048576
//! log_filter = "qdev_driver=debug"
//! ```

use std::{fs, path::Path};

use qdev_store::DeviceGeometry;
use serde::Deserialize;

use crate::error::DriverError;

pub const DEFAULT_REGION_SIZE: usize = 4000;
pub const DEFAULT_REGIONS_PER_GROUP: usize = 1000;
pub const DEFAULT_DEVICE_CAPACITY: usize = 1 << 20;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    /// 注册到宿主时使用的设备名。
    pub device_name: String,
    /// 需要创建的设备数量，设备号依次为 `0..device_count`。
    pub device_count: u32,
    pub region_size: usize,
    pub regions_per_group: usize,
    /// 每个设备可物化的最大字节数，超出的写入被钳制。
    pub device_capacity: usize,
    /// `tracing_subscriber::EnvFilter` 指令。
    pub log_filter: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            device_name: "qdev".to_owned(),
            device_count: 1,
            region_size: DEFAULT_REGION_SIZE,
            regions_per_group: DEFAULT_REGIONS_PER_GROUP,
            device_capacity: DEFAULT_DEVICE_CAPACITY,
            log_filter: "info".to_owned(),
        }
    }
}

impl DriverConfig {
    /// 从 TOML 文本解析配置，并立即校验几何参数。
    pub fn from_toml_str(text: &str) -> Result<Self, DriverError> {
        let config: DriverConfig =
            toml::from_str(text).map_err(|err| DriverError::config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 读取并解析配置文件。
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|err| DriverError::config(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// 校验设备数量与几何参数。
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.device_count == 0 {
            return Err(DriverError::config("device_count must be positive"));
        }
        self.geometry().map(|_| ())
    }

    /// 每个设备共享的几何参数。
    pub fn geometry(&self) -> Result<DeviceGeometry, DriverError> {
        DeviceGeometry::new(
            self.region_size,
            self.regions_per_group,
            self.device_capacity,
        )
        .map_err(|err| DriverError::config(err.to_string()))
    }
}
