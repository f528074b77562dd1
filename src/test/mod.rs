mod dispatch;
mod timeout;

use crate::net::{IPPROTO_ICMP, Packet, internet_checksum};

pub(crate) const SRC: [u8; 4] = [10, 0, 0, 1];
pub(crate) const DST: [u8; 4] = [10, 0, 0, 2];

/// IPv4 头（无选项）+ `payload`，头部校验和已填好
pub(crate) fn ipv4(proto: u8, frag_off: u16, payload: &[u8]) -> Vec<u8> {
    ipv4_between(SRC, DST, proto, frag_off, payload)
}

pub(crate) fn ipv4_between(
    src: [u8; 4],
    dst: [u8; 4],
    proto: u8,
    frag_off: u16,
    payload: &[u8],
) -> Vec<u8> {
    let total = (20 + payload.len()) as u16;
    let mut b = vec![0x45, 0];
    b.extend_from_slice(&total.to_be_bytes());
    b.extend_from_slice(&[0x12, 0x34]);
    b.extend_from_slice(&frag_off.to_be_bytes());
    b.extend_from_slice(&[64, proto, 0, 0]);
    b.extend_from_slice(&src);
    b.extend_from_slice(&dst);
    let c = internet_checksum(&b);
    b[10..12].copy_from_slice(&c.to_be_bytes());
    b.extend_from_slice(payload);
    b
}

/// ICMP 报文（头部 + 数据），校验和已填好
pub(crate) fn icmp_message(icmp_type: u8, code: u8, id: u16, seq: u16, data: &[u8]) -> Vec<u8> {
    let mut m = vec![icmp_type, code, 0, 0];
    m.extend_from_slice(&id.to_be_bytes());
    m.extend_from_slice(&seq.to_be_bytes());
    m.extend_from_slice(data);
    let c = internet_checksum(&m);
    m[2..4].copy_from_slice(&c.to_be_bytes());
    m
}

pub(crate) fn icmp_packet(icmp_type: u8, code: u8, id: u16) -> Packet {
    Packet::parse(ipv4(
        IPPROTO_ICMP,
        0,
        &icmp_message(icmp_type, code, id, 1, b"ping"),
    ))
    .expect("valid packet")
}
