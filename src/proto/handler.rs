//! 协议处理器接口

use std::fmt;
use std::time::Duration;

use tracing::debug;

use super::timeout::{StateTimeout, TimeoutSlot, TimeoutTable};
use crate::conn::{ConnRef, ConnectionTable, Direction, Scheduler, VirtualConnection};
use crate::error::{AdminError, PacketError, SchedulingError};
use crate::net::{ConnectionTuple, Packet, Verdict};

/// 协议未定义的状态下标由 `state_name` 返回此名字
pub const UNKNOWN_STATE_NAME: &str = "ERR!";

/// 协议处理器的静态描述
#[derive(Debug, Clone, Copy)]
pub struct ProtocolDescriptor {
    pub name: &'static str,
    /// IP 协议号，在注册表内唯一
    pub protocol: u8,
    /// 分类一个包前至少需要的传输层头部字节数
    pub min_header_len: usize,
    /// 同上，针对携带控制（ICMP 差错）负载的包
    pub min_control_header_len: usize,
    pub dont_defrag: bool,
    pub skip_nonexistent: bool,
    pub slave: bool,
    /// 状态名与默认超时；下标 0 为初始状态
    pub states: &'static [(&'static str, Duration)],
}

impl ProtocolDescriptor {
    pub fn timeout_table(&self) -> TimeoutTable {
        TimeoutTable::from_states(self.states)
    }
}

/// `conn_schedule` 的结果
#[derive(Debug, Clone)]
pub struct Scheduled {
    pub verdict: Verdict,
    /// 处理器决定跟踪时，该包新建的连接
    pub conn: Option<ConnRef>,
}

impl Scheduled {
    pub fn accept() -> Self {
        Self {
            verdict: Verdict::Accept,
            conn: None,
        }
    }
}

/// 分发循环对某个传输层协议所需的全部操作。
///
/// 方法都取 `&self`：处理器被所有处理包的核心共享，唯一可变的状态是超时表。
pub trait ProtocolHandler: Send + Sync + fmt::Debug {
    fn descriptor(&self) -> &ProtocolDescriptor;

    /// 持有超时表的生命周期槽位
    fn timeouts(&self) -> &TimeoutSlot;

    fn name(&self) -> &'static str {
        self.descriptor().name
    }

    /// 按描述中的默认值安装一张新的超时表
    fn init(&self) {
        self.timeouts().install(self.descriptor().timeout_table());
        debug!(protocol = self.name(), "超时表已安装");
    }

    /// 释放超时表。未安装时为空操作。
    fn exit(&self) {
        if self.timeouts().release() {
            debug!(protocol = self.name(), "超时表已释放");
        }
    }

    /// 从 `offset` 处的头部提取标识元组
    fn pkt_to_tuple(&self, pkt: &Packet, offset: usize) -> Result<ConnectionTuple, PacketError>;

    /// 回复方向应出现的元组；消息不能建立或匹配双向流时返回 `None`
    fn invert_tuple(&self, tuple: &ConnectionTuple) -> Option<ConnectionTuple>;

    fn conn_in_get(
        &self,
        pkt: &Packet,
        offset: usize,
        inverse: bool,
        table: &dyn ConnectionTable,
    ) -> Option<ConnRef>;

    fn conn_out_get(
        &self,
        pkt: &Packet,
        offset: usize,
        inverse: bool,
        table: &dyn ConnectionTable,
    ) -> Option<ConnRef>;

    /// 决定如何处理未匹配任何连接的包
    fn conn_schedule(
        &self,
        pkt: &Packet,
        offset: usize,
        scheduler: &dyn Scheduler,
    ) -> Result<Scheduled, SchedulingError>;

    /// 校验从 `offset` 起 `len` 字节的校验和。
    /// 非首分片总是通过。
    fn csum_check(&self, pkt: &Packet, offset: usize, len: usize) -> bool;

    /// 按匹配到的包更新 `conn`，返回 `false` 表示丢弃。
    ///
    /// 调用方持有连接锁。
    fn state_transition(
        &self,
        conn: &mut VirtualConnection,
        dir: Direction,
        pkt: &Packet,
        offset: usize,
    ) -> bool;

    fn state_name(&self, state: usize) -> &str {
        self.descriptor()
            .states
            .get(state)
            .map(|(name, _)| *name)
            .unwrap_or(UNKNOWN_STATE_NAME)
    }

    fn set_state_timeout(&self, state: &str, value: Duration) -> Result<(), AdminError> {
        let table = self
            .timeouts()
            .current()
            .ok_or_else(|| AdminError::NotInitialised(self.name().to_string()))?;
        table.set_by_name(state, value)?;
        debug!(protocol = self.name(), state, ?value, "状态超时已修改");
        Ok(())
    }

    fn timeout_snapshot(&self) -> Option<Vec<StateTimeout>> {
        self.timeouts().current().map(|t| t.snapshot())
    }

    /// 生成包的单行描述并以 debug 级别输出。无论包内容如何都不会失败。
    fn debug_packet(&self, pkt: &Packet, offset: usize, msg: &str) -> String;
}
