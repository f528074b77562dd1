//! ICMP 协议处理器
//!
//! ICMP 没有端口，用 type/code 加标识符代替。ICMP 报文会被放行，但不会
//! 建立负载均衡会话；连接查找目前总是返回 `None`。

use std::time::Duration;

use tracing::{debug, trace};

use super::handler::{ProtocolDescriptor, ProtocolHandler, Scheduled};
use super::timeout::TimeoutSlot;
use crate::conn::{ConnRef, ConnectionTable, Direction, Scheduler, VirtualConnection};
use crate::error::{PacketError, SchedulingError};
use crate::net::{ConnectionTuple, IPPROTO_ICMP, Packet, RateDecision, RateLimit, verify_checksum};

/// ICMP 报文类型
pub mod icmp_types {
    pub const ECHO_REPLY: u8 = 0;
    pub const DEST_UNREACH: u8 = 3;
    pub const SOURCE_QUENCH: u8 = 4;
    pub const REDIRECT: u8 = 5;
    pub const ECHO: u8 = 8;
    pub const TIME_EXCEEDED: u8 = 11;
    pub const PARAMETER_PROB: u8 = 12;
    pub const TIMESTAMP: u8 = 13;
    pub const TIMESTAMP_REPLY: u8 = 14;
    pub const INFO_REQUEST: u8 = 15;
    pub const INFO_REPLY: u8 = 16;
    pub const ADDRESS: u8 = 17;
    pub const ADDRESS_REPLY: u8 = 18;
}

const ICMP_HEADER_LEN: usize = 8;
// ICMP 头 + 内嵌 IP 头 + 内嵌传输层头的前 8 字节
const ICMP_CONTROL_HEADER_LEN: usize = ICMP_HEADER_LEN + 20 + 8;

const ICMP_S_NORMAL: usize = 0;

pub const ICMP_DESCRIPTOR: ProtocolDescriptor = ProtocolDescriptor {
    name: "ICMP",
    protocol: IPPROTO_ICMP,
    min_header_len: ICMP_HEADER_LEN,
    min_control_header_len: ICMP_CONTROL_HEADER_LEN,
    dont_defrag: false,
    skip_nonexistent: false,
    slave: false,
    states: &[("ICMP", Duration::from_secs(60))],
};

/// 请求/应答类型映射；没有对应应答的类型返回 `None`
fn reply_type(icmp_type: u8) -> Option<u8> {
    use self::icmp_types::*;
    match icmp_type {
        ECHO => Some(ECHO_REPLY),
        ECHO_REPLY => Some(ECHO),
        TIMESTAMP => Some(TIMESTAMP_REPLY),
        TIMESTAMP_REPLY => Some(TIMESTAMP),
        INFO_REQUEST => Some(INFO_REPLY),
        INFO_REPLY => Some(INFO_REQUEST),
        ADDRESS => Some(ADDRESS_REPLY),
        ADDRESS_REPLY => Some(ADDRESS),
        _ => None,
    }
}

#[derive(Debug)]
pub struct IcmpHandler {
    timeouts: TimeoutSlot,
    csum_log: RateLimit,
}

impl Default for IcmpHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl IcmpHandler {
    pub fn new() -> Self {
        Self::with_rate_limit(RateLimit::default())
    }

    /// 使用指定的校验和失败日志限速
    pub fn with_rate_limit(csum_log: RateLimit) -> Self {
        Self {
            timeouts: TimeoutSlot::default(),
            csum_log,
        }
    }

    fn describe(&self, pkt: &Packet, offset: usize) -> String {
        let name = ICMP_DESCRIPTOR.name;
        let ip = pkt.ip();
        if pkt.is_fragment() {
            return format!("{name} {}->{} frag", ip.src, ip.dst);
        }
        match pkt.header_bytes(offset, ICMP_HEADER_LEN) {
            Ok(h) => format!("{name} {}->{} T:{} C:{}", ip.src, ip.dst, h[0], h[1]),
            Err(_) => format!("{name} TRUNCATED"),
        }
    }
}

impl ProtocolHandler for IcmpHandler {
    fn descriptor(&self) -> &ProtocolDescriptor {
        &ICMP_DESCRIPTOR
    }

    fn timeouts(&self) -> &TimeoutSlot {
        &self.timeouts
    }

    fn pkt_to_tuple(&self, pkt: &Packet, offset: usize) -> Result<ConnectionTuple, PacketError> {
        let h = pkt.header_bytes(offset, ICMP_HEADER_LEN)?;
        Ok(ConnectionTuple::Icmp {
            icmp_type: h[0],
            code: h[1],
            id: u16::from_be_bytes([h[4], h[5]]),
        })
    }

    fn invert_tuple(&self, tuple: &ConnectionTuple) -> Option<ConnectionTuple> {
        match *tuple {
            ConnectionTuple::Icmp {
                icmp_type,
                code,
                id,
            } => reply_type(icmp_type).map(|t| ConnectionTuple::Icmp {
                icmp_type: t,
                code,
                id,
            }),
            _ => None,
        }
    }

    fn conn_in_get(
        &self,
        _pkt: &Packet,
        _offset: usize,
        inverse: bool,
        _table: &dyn ConnectionTable,
    ) -> Option<ConnRef> {
        // ICMP 不参与连接跟踪
        trace!(inverse, "ICMP conn_in_get: not tracked");
        None
    }

    fn conn_out_get(
        &self,
        _pkt: &Packet,
        _offset: usize,
        inverse: bool,
        _table: &dyn ConnectionTable,
    ) -> Option<ConnRef> {
        trace!(inverse, "ICMP conn_out_get: not tracked");
        None
    }

    fn conn_schedule(
        &self,
        _pkt: &Packet,
        _offset: usize,
        _scheduler: &dyn Scheduler,
    ) -> Result<Scheduled, SchedulingError> {
        Ok(Scheduled::accept())
    }

    fn csum_check(&self, pkt: &Packet, offset: usize, len: usize) -> bool {
        if pkt.is_fragment() {
            return true;
        }
        let ok = match pkt.header_bytes(offset, len) {
            Ok(bytes) => verify_checksum(bytes),
            Err(_) => false,
        };
        if !ok {
            match self.csum_log.check() {
                RateDecision::Allow { suppressed } => {
                    if suppressed > 0 {
                        debug!(suppressed, "ICMP 校验和失败日志被限速");
                    }
                    self.debug_packet(pkt, offset, "Failed checksum for");
                }
                RateDecision::Suppress => {}
            }
        }
        ok
    }

    fn state_transition(
        &self,
        conn: &mut VirtualConnection,
        _dir: Direction,
        _pkt: &Packet,
        _offset: usize,
    ) -> bool {
        let Some(table) = self.timeouts.current() else {
            debug!("ICMP 超时表未初始化，拒绝状态迁移");
            return false;
        };
        conn.state = ICMP_S_NORMAL;
        conn.timeout = table.get(ICMP_S_NORMAL);
        true
    }

    fn debug_packet(&self, pkt: &Packet, offset: usize, msg: &str) -> String {
        let line = format!("{msg}: {}", self.describe(pkt, offset));
        debug!("{line}");
        line
    }
}
