//! 网络层数据结构
//!
//! 此模块包含协议处理器在转发快路径上使用的基础类型：IPv4 数据包视图、
//! 校验和、连接元组、转发裁决以及日志限速。

// 子模块声明
mod checksum;
mod packet;
mod ratelimit;
mod tuple;
mod verdict;

// 重新导出公共接口
pub use checksum::{fold_checksum, internet_checksum, ones_complement_sum, verify_checksum};
pub use packet::{IPPROTO_ICMP, IPPROTO_TCP, IPPROTO_UDP, Ipv4Header, Packet};
pub use ratelimit::{RateDecision, RateLimit};
pub use tuple::ConnectionTuple;
pub use verdict::Verdict;
