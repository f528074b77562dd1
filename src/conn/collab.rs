//! 协议处理器依赖的外部协作者

use tracing::trace;

use super::connection::ConnRef;
use super::key::LookupKey;
use crate::error::SchedulingError;
use crate::net::{ConnectionTuple, Packet};

/// 连接查找，由外部连接子系统实现
pub trait ConnectionTable: Send + Sync {
    /// 客户端 -> 虚拟服务方向的包所属连接
    fn in_get(&self, key: &LookupKey) -> Option<ConnRef>;
    /// 真实服务器 -> 客户端方向的包所属连接
    fn out_get(&self, key: &LookupKey) -> Option<ConnRef>;
}

/// 为需要开始跟踪的流选择真实服务器
pub trait Scheduler: Send + Sync {
    fn schedule(&self, pkt: &Packet, tuple: &ConnectionTuple) -> Result<ConnRef, SchedulingError>;
}

/// 空连接表，未接入连接子系统时使用
#[derive(Debug, Default, Clone, Copy)]
pub struct NullConnectionTable;

impl ConnectionTable for NullConnectionTable {
    fn in_get(&self, key: &LookupKey) -> Option<ConnRef> {
        trace!(?key, "未接入连接表");
        None
    }

    fn out_get(&self, key: &LookupKey) -> Option<ConnRef> {
        trace!(?key, "未接入连接表");
        None
    }
}

/// 没有任何真实服务器的调度器
#[derive(Debug, Default, Clone, Copy)]
pub struct NoScheduler;

impl Scheduler for NoScheduler {
    fn schedule(&self, _pkt: &Packet, _tuple: &ConnectionTuple) -> Result<ConnRef, SchedulingError> {
        Err(SchedulingError::NoRealServer)
    }
}
