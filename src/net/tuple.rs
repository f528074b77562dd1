//! 连接元组
//!
//! 从传输层头部提取的、协议相关的标识字段。地址部分由 IP 头提供，
//! 见 `conn::LookupKey`。

use std::fmt;

/// 传输层头部的一种解释。活动的解释由变体显式给出。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConnectionTuple {
    /// 基于端口的传输协议（TCP/UDP 一类）
    Ports { src: u16, dst: u16 },
    /// ICMP：type/code，标识符充当“端口”
    Icmp { icmp_type: u8, code: u8, id: u16 },
    /// 未解释的原始头部字节
    Raw(Vec<u8>),
}

impl ConnectionTuple {
    /// 源/目的“端口”。ICMP 使用标识符作为两端的端口。
    pub fn ports(&self) -> Option<(u16, u16)> {
        match self {
            ConnectionTuple::Ports { src, dst } => Some((*src, *dst)),
            ConnectionTuple::Icmp { id, .. } => Some((*id, *id)),
            ConnectionTuple::Raw(_) => None,
        }
    }
}

impl fmt::Display for ConnectionTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionTuple::Ports { src, dst } => write!(f, "{src}->{dst}"),
            ConnectionTuple::Icmp {
                icmp_type,
                code,
                id,
            } => write!(f, "T:{icmp_type} C:{code} ID:{id:#06x}"),
            ConnectionTuple::Raw(bytes) => write!(f, "raw[{}]", bytes.len()),
        }
    }
}
