//! 分发循环
//!
//! 与协议无关的逐包控制流：按协议号找到处理器，做长度和校验和检查，
//! 查找已有连接并做状态迁移，或交给 `conn_schedule` 决定。

mod dispatcher;
mod stats;

pub use dispatcher::Dispatcher;
pub use stats::{DispatchStats, StatsSnapshot};
