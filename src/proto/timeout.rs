//! 状态超时表
//!
//! 每个协议一张、按状态下标索引的超时时长数组。包处理路径只读；
//! 只能通过 `set_by_name` 修改。每个表项是一个独立的原子量，读者无需加锁，
//! 也不会读到写了一半的值。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AdminError;

/// 超时表中的一项（用于内省/序列化）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTimeout {
    pub state: String,
    pub timeout_ms: u64,
    /// 完整精度，亚毫秒部分不丢失
    pub timeout_ns: u64,
}

#[derive(Debug)]
pub struct TimeoutTable {
    names: Vec<String>,
    timeouts_ns: Box<[AtomicU64]>,
}

// u64 纳秒约可表示 584 年，超出部分饱和
fn to_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

impl TimeoutTable {
    /// 由等长的状态名列表和默认超时构造；下标 0 为初始状态。
    pub fn new<S: AsRef<str>>(state_names: &[S], defaults: &[Duration]) -> Result<Self, AdminError> {
        if state_names.len() != defaults.len() {
            return Err(AdminError::LengthMismatch {
                names: state_names.len(),
                timeouts: defaults.len(),
            });
        }
        Ok(Self {
            names: state_names.iter().map(|n| n.as_ref().to_string()).collect(),
            timeouts_ns: defaults.iter().map(|d| AtomicU64::new(to_nanos(*d))).collect(),
        })
    }

    /// 由 (状态名, 默认超时) 对构造，长度天然一致
    pub fn from_states(states: &[(&str, Duration)]) -> Self {
        Self {
            names: states.iter().map(|(n, _)| n.to_string()).collect(),
            timeouts_ns: states.iter().map(|(_, d)| AtomicU64::new(to_nanos(*d))).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// 读取状态 `index` 的超时。下标由 `state_transition` 内部产生，总是有效。
    pub fn get(&self, index: usize) -> Duration {
        Duration::from_nanos(self.timeouts_ns[index].load(Ordering::Relaxed))
    }

    pub fn state_name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// 按状态名覆盖超时（大小写敏感）。名字未知时表保持不变。
    pub fn set_by_name(&self, name: &str, value: Duration) -> Result<(), AdminError> {
        let idx = self
            .index_of(name)
            .ok_or_else(|| AdminError::UnknownState(name.to_string()))?;
        self.timeouts_ns[idx].store(to_nanos(value), Ordering::Relaxed);
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<StateTimeout> {
        self.names
            .iter()
            .zip(self.timeouts_ns.iter())
            .map(|(state, t)| {
                let ns = t.load(Ordering::Relaxed);
                StateTimeout {
                    state: state.clone(),
                    timeout_ms: ns / 1_000_000,
                    timeout_ns: ns,
                }
            })
            .collect()
    }
}

/// 处理器持有的超时表槽位：`init` 时安装，`exit` 时释放。
///
/// 锁只在安装/释放和取出 `Arc` 时短暂持有。
#[derive(Debug, Default)]
pub struct TimeoutSlot {
    table: RwLock<Option<Arc<TimeoutTable>>>,
}

impl TimeoutSlot {
    pub fn install(&self, table: TimeoutTable) {
        *self.table.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(table));
    }

    /// 释放表。之前没有安装时返回 `false`（空操作）。
    pub fn release(&self) -> bool {
        self.table
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some()
    }

    pub fn current(&self) -> Option<Arc<TimeoutTable>> {
        self.table.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_installed(&self) -> bool {
        self.table.read().unwrap_or_else(|e| e.into_inner()).is_some()
    }
}
