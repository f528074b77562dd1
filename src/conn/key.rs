//! 连接查找键

use std::net::Ipv4Addr;

use crate::net::{ConnectionTuple, Packet};

/// 传给外部连接表的查找键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LookupKey {
    pub protocol: u8,
    pub src: Ipv4Addr,
    pub src_port: u16,
    pub dst: Ipv4Addr,
    pub dst_port: u16,
}

impl LookupKey {
    /// 按包的方向构造查找键；`inverse` 为真时交换源和目的。
    ///
    /// 元组不含端口语义（`Raw`）时返回 `None`。
    pub fn from_packet(pkt: &Packet, tuple: &ConnectionTuple, inverse: bool) -> Option<Self> {
        let (sport, dport) = tuple.ports()?;
        let ip = pkt.ip();
        let key = LookupKey {
            protocol: ip.protocol,
            src: ip.src,
            src_port: sport,
            dst: ip.dst,
            dst_port: dport,
        };
        Some(if inverse { key.reversed() } else { key })
    }

    /// 应答方向的键
    pub fn reversed(&self) -> Self {
        LookupKey {
            protocol: self.protocol,
            src: self.dst,
            src_port: self.dst_port,
            dst: self.src,
            dst_port: self.src_port,
        }
    }
}
