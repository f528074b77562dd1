//! 统计信息
//!
//! 多核并发更新，全部使用原子计数。

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::net::Verdict;

/// 分发统计
#[derive(Debug, Default)]
pub struct DispatchStats {
    pub packets: AtomicU64,
    pub accepted: AtomicU64,
    pub dropped: AtomicU64,
    pub stolen: AtomicU64,
    /// 没有注册处理器的协议
    pub not_ours: AtomicU64,
    /// 非首片，无法分类
    pub fragments: AtomicU64,
    pub malformed: AtomicU64,
    pub checksum_errors: AtomicU64,
    /// 命中已有连接
    pub tracked: AtomicU64,
    pub invalid_transitions: AtomicU64,
    /// `conn_schedule` 新建了连接
    pub scheduled: AtomicU64,
    pub schedule_errors: AtomicU64,
}

/// 某一时刻的统计快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub packets: u64,
    pub accepted: u64,
    pub dropped: u64,
    pub stolen: u64,
    pub not_ours: u64,
    pub fragments: u64,
    pub malformed: u64,
    pub checksum_errors: u64,
    pub tracked: u64,
    pub invalid_transitions: u64,
    pub scheduled: u64,
    pub schedule_errors: u64,
}

pub(crate) fn bump(c: &AtomicU64) {
    c.fetch_add(1, Ordering::Relaxed);
}

impl DispatchStats {
    pub(crate) fn record_verdict(&self, v: Verdict) {
        bump(&self.packets);
        match v {
            Verdict::Accept => bump(&self.accepted),
            Verdict::Drop => bump(&self.dropped),
            Verdict::Stolen => bump(&self.stolen),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            packets: get(&self.packets),
            accepted: get(&self.accepted),
            dropped: get(&self.dropped),
            stolen: get(&self.stolen),
            not_ours: get(&self.not_ours),
            fragments: get(&self.fragments),
            malformed: get(&self.malformed),
            checksum_errors: get(&self.checksum_errors),
            tracked: get(&self.tracked),
            invalid_transitions: get(&self.invalid_transitions),
            scheduled: get(&self.scheduled),
            schedule_errors: get(&self.schedule_errors),
        }
    }
}
