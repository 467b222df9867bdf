//! # qdev-driver
//!
//! ## 定位与职责（Why）
//! - 以显式的 [`DeviceRegistry`] 取代传统字符设备驱动中的进程级全局变量，
//!   每个设备独立持有自己的分块链与互斥锁；
//! - 把宿主的 open/write/release 回调翻译为存储核心的截断与钳制增长操作，
//!   并把存储错误映射为宿主可理解的错误码。
//!
//! ## 架构嵌入（Where）
//! - `registry`：设备仓储与 open/teardown 入口；
//! - `handle`：一次 open 得到的句柄，承载 write 与文件位置；
//! - `state`：访问模式与链状态两枚举；
//! - `config`：由 TOML 加载的模块参数；
//! - `telemetry`：`tracing` 订阅者的一次性安装；
//! - `error`：驱动层错误域。

pub mod config;
pub mod error;
pub mod handle;
pub mod registry;
pub mod state;
pub mod telemetry;

pub use config::DriverConfig;
pub use error::DriverError;
pub use handle::DeviceHandle;
pub use registry::{DeviceId, DeviceRegistry};
pub use state::{AccessMode, ChainState};
