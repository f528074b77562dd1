//! IPVS 协议处理器插件系统
//!
//! 负载均衡转发快路径上的协议分发层：按 IP 协议号选择协议处理器，
//! 完成包分类、校验和检查、连接查找适配、状态迁移与调度钩子。

pub mod config;
pub mod conn;
pub mod dispatch;
pub mod error;
pub mod net;
pub mod proto;

#[cfg(test)]
mod test;
