//! 分发器

use std::sync::Arc;

use tracing::{debug, trace};

use super::stats::{DispatchStats, bump};
use crate::conn::{
    ConnRef, ConnectionTable, Direction, NoScheduler, NullConnectionTable, Scheduler,
};
use crate::net::{Packet, Verdict};
use crate::proto::{ProtocolHandler, ProtocolRegistry, Scheduled};

/// 协议无关的逐包分发器。可在多个线程间共享（`&self`）。
pub struct Dispatcher {
    registry: Arc<ProtocolRegistry>,
    conns: Arc<dyn ConnectionTable>,
    scheduler: Arc<dyn Scheduler>,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ProtocolRegistry>,
        conns: Arc<dyn ConnectionTable>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            registry,
            conns,
            scheduler,
            stats: DispatchStats::default(),
        }
    }

    /// 不接外部连接表和调度器
    pub fn standalone(registry: Arc<ProtocolRegistry>) -> Self {
        Self::new(
            registry,
            Arc::new(NullConnectionTable),
            Arc::new(NoScheduler),
        )
    }

    pub fn registry(&self) -> &ProtocolRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// 处理一个数据包并给出裁决
    #[tracing::instrument(skip(self, pkt), fields(proto = pkt.protocol(), len = pkt.len()))]
    pub fn process(&self, pkt: &Packet, dir: Direction) -> Verdict {
        let v = self.classify(pkt, dir);
        self.stats.record_verdict(v);
        trace!(verdict = %v, "裁决");
        v
    }

    fn classify(&self, pkt: &Packet, dir: Direction) -> Verdict {
        let Some(handler) = self.registry.lookup(pkt.protocol()) else {
            bump(&self.stats.not_ours);
            return Verdict::Accept;
        };
        let handler: &dyn ProtocolHandler = &**handler;
        let desc = handler.descriptor();

        // 非首片没有传输层头部，交给外部路径（重组后再进入）
        if pkt.is_fragment() {
            bump(&self.stats.fragments);
            return Verdict::Accept;
        }

        let offset = pkt.transport_offset();
        let avail = pkt.bytes_from(offset);
        if avail < desc.min_header_len {
            bump(&self.stats.malformed);
            debug!(need = desc.min_header_len, have = avail, "传输层头部过短");
            handler.debug_packet(pkt, offset, "Short header for");
            return Verdict::Drop;
        }

        if !handler.csum_check(pkt, offset, avail) {
            bump(&self.stats.checksum_errors);
            return Verdict::Drop;
        }

        let tuple = match handler.pkt_to_tuple(pkt, offset) {
            Ok(t) => t,
            Err(e) => {
                bump(&self.stats.malformed);
                debug!(error = %e, "无法提取连接元组");
                return Verdict::Drop;
            }
        };
        trace!(%tuple, "连接元组");

        let existing = match dir {
            Direction::Output => handler.conn_out_get(pkt, offset, false, self.conns.as_ref()),
            Direction::Input | Direction::InputOnly => {
                handler.conn_in_get(pkt, offset, false, self.conns.as_ref())
            }
        };
        if let Some(conn) = existing {
            bump(&self.stats.tracked);
            return self.transition(handler, &conn, dir, pkt, offset);
        }

        // 只有客户端方向的包可以建立新连接
        if dir == Direction::Output || desc.skip_nonexistent {
            return Verdict::Accept;
        }

        match handler.conn_schedule(pkt, offset, self.scheduler.as_ref()) {
            Ok(Scheduled {
                verdict,
                conn: Some(conn),
            }) => {
                bump(&self.stats.scheduled);
                match self.transition(handler, &conn, dir, pkt, offset) {
                    Verdict::Drop => Verdict::Drop,
                    _ => verdict,
                }
            }
            Ok(Scheduled { verdict, conn: None }) => verdict,
            Err(e) => {
                bump(&self.stats.schedule_errors);
                debug!(error = %e, "调度失败");
                handler.debug_packet(pkt, offset, "Scheduling failed for");
                Verdict::Drop
            }
        }
    }

    fn transition(
        &self,
        handler: &dyn ProtocolHandler,
        conn: &ConnRef,
        dir: Direction,
        pkt: &Packet,
        offset: usize,
    ) -> Verdict {
        let mut guard = conn.lock().unwrap_or_else(|e| e.into_inner());
        if handler.state_transition(&mut guard, dir, pkt, offset) {
            trace!(state = handler.state_name(guard.state), timeout = ?guard.timeout, "状态迁移");
            Verdict::Accept
        } else {
            bump(&self.stats.invalid_transitions);
            debug!(state = handler.state_name(guard.state), "非法状态迁移，丢弃");
            Verdict::Drop
        }
    }
}
