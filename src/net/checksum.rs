//! 互联网校验和（RFC 1071）

/// 按大端 16 位字对 `data` 求反码和。
///
/// 末尾多出的奇数字节在低位补零。
pub fn ones_complement_sum(data: &[u8]) -> u32 {
    let mut chunks = data.chunks_exact(2);
    let mut sum = chunks
        .by_ref()
        .fold(0u32, |acc, w| acc.wrapping_add(u16::from_be_bytes([w[0], w[1]]) as u32));
    if let [last] = chunks.remainder() {
        sum = sum.wrapping_add((*last as u32) << 8);
    }
    sum
}

/// 把 32 位累加值折叠成最终的 16 位校验和
pub fn fold_checksum(mut sum: u32) -> u16 {
    while (sum >> 16) != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// 校验和字段置零后计算出的、应写入头部的值
pub fn internet_checksum(data: &[u8]) -> u16 {
    fold_checksum(ones_complement_sum(data))
}

/// `data`（含校验和字段）的反码和为全 1 时返回 `true`
pub fn verify_checksum(data: &[u8]) -> bool {
    internet_checksum(data) == 0
}
