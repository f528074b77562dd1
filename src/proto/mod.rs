//! 协议处理器插件
//!
//! 每个传输协议一个 `ProtocolHandler` 实现，由 `ProtocolRegistry` 按 IP 协议号
//! 管理，使转发/分发循环本身与具体协议无关。
//!
//! 目前内置 ICMP；基于端口的协议通过同一 trait 接入。

mod handler;
mod icmp;
mod registry;
mod timeout;

pub use handler::{ProtocolDescriptor, ProtocolHandler, Scheduled, UNKNOWN_STATE_NAME};
pub use icmp::{ICMP_DESCRIPTOR, IcmpHandler, icmp_types};
pub use registry::ProtocolRegistry;
pub use timeout::{StateTimeout, TimeoutSlot, TimeoutTable};
