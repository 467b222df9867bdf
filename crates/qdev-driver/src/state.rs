//! 访问模式与链状态。
//!
//! 设备链只有两个状态：`Empty`（头部缺省）与 `Populated`（至少一个区块）。
//! 只写打开把任何状态带回 `Empty`；写入只会让链增长，不会回到 `Empty`。

use qdev_store::ChunkChain;

/// 打开设备时声明的访问模式，对应 `O_ACCMODE` 的三种取值。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    /// 该模式下打开是否截断设备。只有只写打开会截断，读写打开保留已有内容。
    pub fn truncates(self) -> bool {
        matches!(self, AccessMode::WriteOnly)
    }

    /// 该模式下得到的句柄是否允许写入。
    pub fn can_write(self) -> bool {
        matches!(self, AccessMode::WriteOnly | AccessMode::ReadWrite)
    }
}

/// 链状态标签。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ChainState {
    /// 头部缺省，没有任何分组。
    Empty,
    /// 至少物化了一个区块。
    Populated,
}

impl ChainState {
    /// 从链的当前形态推导状态。
    pub fn of(chain: &ChunkChain) -> Self {
        if chain.region_count() == 0 {
            ChainState::Empty
        } else {
            ChainState::Populated
        }
    }
}
