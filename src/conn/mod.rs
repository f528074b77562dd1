//! 虚拟连接与外部协作者接口
//!
//! 连接哈希表和 real server 调度都由外部子系统实现；这里只定义协议处理器
//! 需要用到的字段和接口。

// 子模块声明
mod collab;
mod connection;
mod key;

// 重新导出公共接口
pub use collab::{ConnectionTable, NoScheduler, NullConnectionTable, Scheduler};
pub use connection::{ConnRef, Direction, VirtualConnection};
pub use key::LookupKey;
