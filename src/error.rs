//! 错误类型
//!
//! 数据包路径上的错误只会导致单个包被丢弃；管理面错误同步返回给调用方。

use thiserror::Error;

/// 单个数据包处理失败（调用方据此丢弃该包）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("malformed packet: {0}")]
    Malformed(String),

    #[error("truncated header: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("checksum mismatch")]
    ChecksumMismatch,
}

/// 管理/配置操作失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdminError {
    #[error("unknown state {0:?}")]
    UnknownState(String),

    #[error("protocol {0} is already registered")]
    DuplicateProtocol(u8),

    #[error("protocol {0} is not registered")]
    NotRegistered(u8),

    #[error("state table length mismatch: {names} names, {timeouts} timeouts")]
    LengthMismatch { names: usize, timeouts: usize },

    #[error("protocol {0} has no timeout table (not initialised)")]
    NotInitialised(String),
}

/// 外部调度（选择 real server）失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    #[error("no real server available")]
    NoRealServer,

    #[error("scheduling rejected: {0}")]
    Rejected(String),
}

/// 配置加载/应用失败
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Admin(#[from] AdminError),
}
