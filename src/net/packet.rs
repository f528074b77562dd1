//! 数据包类型
//!
//! 一个可按字节寻址的缓冲区加上已解析的 IPv4 头部视图。所有传输层头部
//! 访问都经过 `Packet::header_bytes` 做边界检查。

use std::net::Ipv4Addr;

use crate::error::PacketError;

/// https://en.wikipedia.org/wiki/List_of_IP_protocol_numbers
pub const IPPROTO_ICMP: u8 = 1;
pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;

const IP_DF: u16 = 0x4000;
const IP_MF: u16 = 0x2000;
const IP_OFFSET: u16 = 0x1fff;

/// IPv4 头部
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Header {
    pub ihl: u8, // 以 32 位字为单位
    pub tos: u8,
    pub total_length: u16,
    pub identification: u16,
    pub frag_off: u16, // 标志位 + 13 位分片偏移，主机字节序
    pub ttl: u8,
    pub protocol: u8,
    pub header_checksum: u16,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
}

impl Ipv4Header {
    pub const MIN_LEN: usize = 20;

    /// 解析 `buf` 开头的 IPv4 头部
    pub fn parse(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < Self::MIN_LEN {
            return Err(PacketError::Truncated {
                need: Self::MIN_LEN,
                have: buf.len(),
            });
        }

        let version = buf[0] >> 4;
        if version != 4 {
            return Err(PacketError::Malformed(format!(
                "unsupported IP version {version}"
            )));
        }
        let ihl = buf[0] & 0x0f;
        if ihl < 5 {
            return Err(PacketError::Malformed(format!("IHL {ihl} below minimum")));
        }

        Ok(Ipv4Header {
            ihl,
            tos: buf[1],
            total_length: u16::from_be_bytes([buf[2], buf[3]]),
            identification: u16::from_be_bytes([buf[4], buf[5]]),
            frag_off: u16::from_be_bytes([buf[6], buf[7]]),
            ttl: buf[8],
            protocol: buf[9],
            header_checksum: u16::from_be_bytes([buf[10], buf[11]]),
            src: Ipv4Addr::new(buf[12], buf[13], buf[14], buf[15]),
            dst: Ipv4Addr::new(buf[16], buf[17], buf[18], buf[19]),
        })
    }

    /// 头部长度（字节），即传输层头部的起始偏移
    pub fn header_len(&self) -> usize {
        self.ihl as usize * 4
    }

    /// 13 位分片偏移（8 字节为单位）
    pub fn fragment_offset(&self) -> u16 {
        self.frag_off & IP_OFFSET
    }

    /// 是否为非首片。首片（offset 为 0，仅置 MF）仍带有完整的传输层头部。
    pub fn is_fragment(&self) -> bool {
        self.fragment_offset() != 0
    }

    pub fn more_fragments(&self) -> bool {
        self.frag_off & IP_MF != 0
    }

    pub fn dont_fragment(&self) -> bool {
        self.frag_off & IP_DF != 0
    }
}

/// 入站数据包
#[derive(Debug, Clone)]
pub struct Packet {
    data: Vec<u8>,
    ip: Ipv4Header,
}

impl Packet {
    /// 从原始字节构造数据包并校验 IPv4 头部的一致性。
    ///
    /// 缓冲区尾部超出 `total_length` 的字节（链路层填充）被忽略。
    pub fn parse(data: impl Into<Vec<u8>>) -> Result<Self, PacketError> {
        let mut data = data.into();
        let ip = Ipv4Header::parse(&data)?;

        let hlen = ip.header_len();
        let total = ip.total_length as usize;
        if total < hlen {
            return Err(PacketError::Malformed(format!(
                "total length {total} shorter than header length {hlen}"
            )));
        }
        if total > data.len() {
            return Err(PacketError::Truncated {
                need: total,
                have: data.len(),
            });
        }
        data.truncate(total);

        Ok(Packet { data, ip })
    }

    pub fn ip(&self) -> &Ipv4Header {
        &self.ip
    }

    pub fn protocol(&self) -> u8 {
        self.ip.protocol
    }

    pub fn is_fragment(&self) -> bool {
        self.ip.is_fragment()
    }

    /// 整个 IP 数据报
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 传输层头部的起始偏移
    pub fn transport_offset(&self) -> usize {
        self.ip.header_len()
    }

    /// 从 `offset` 起到数据报末尾的字节数
    pub fn bytes_from(&self, offset: usize) -> usize {
        self.data.len().saturating_sub(offset)
    }

    /// 边界检查的头部访问：返回 `[offset, offset + len)`，越界时失败而不是越界读取。
    pub fn header_bytes(&self, offset: usize, len: usize) -> Result<&[u8], PacketError> {
        let end = offset.checked_add(len).ok_or_else(|| {
            PacketError::Malformed(format!("header range {offset}+{len} overflows"))
        })?;
        self.data
            .get(offset..end)
            .ok_or(PacketError::Truncated {
                need: end,
                have: self.data.len(),
            })
    }
}
