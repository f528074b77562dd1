//! 虚拟连接
//!
//! 由外部连接子系统创建和销毁；协议处理器只观察并更新 `state`/`timeout`。

use std::net::SocketAddrV4;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 共享的连接句柄。调用 `state_transition` 之前必须持有该锁，
/// 保证同一连接同一时刻只有一个修改者。
pub type ConnRef = Arc<Mutex<VirtualConnection>>;

/// 数据包相对于连接的方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// 客户端 -> 虚拟服务
    Input,
    /// real server -> 客户端
    Output,
    /// 仅入向可见（回包不经过本机）
    InputOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualConnection {
    pub protocol: u8,
    pub source: SocketAddrV4,
    pub destination: SocketAddrV4,
    /// 协议相关的状态下标，0 为初始状态
    pub state: usize,
    /// 当前过期策略，由 `state_transition` 在每个匹配的包上写入
    pub timeout: Duration,
}

impl VirtualConnection {
    pub fn new(protocol: u8, source: SocketAddrV4, destination: SocketAddrV4) -> Self {
        Self {
            protocol,
            source,
            destination,
            state: 0,
            timeout: Duration::ZERO,
        }
    }

    pub fn into_ref(self) -> ConnRef {
        Arc::new(Mutex::new(self))
    }
}
