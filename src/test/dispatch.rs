use std::collections::HashMap;
use std::net::SocketAddrV4;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::conn::{
    ConnRef, ConnectionTable, Direction, LookupKey, Scheduler, VirtualConnection,
};
use crate::dispatch::{Dispatcher, StatsSnapshot};
use crate::error::{PacketError, SchedulingError};
use crate::net::{ConnectionTuple, IPPROTO_ICMP, IPPROTO_UDP, Packet, Verdict};
use crate::proto::{
    ProtocolDescriptor, ProtocolHandler, ProtocolRegistry, Scheduled, TimeoutSlot,
};
use crate::test::{DST, SRC, icmp_message, icmp_packet, ipv4, ipv4_between};

const PORTS_DESCRIPTOR: ProtocolDescriptor = ProtocolDescriptor {
    name: "PORTS",
    protocol: IPPROTO_UDP,
    min_header_len: 8,
    min_control_header_len: 8,
    dont_defrag: false,
    skip_nonexistent: false,
    slave: false,
    states: &[("NORMAL", Duration::from_secs(300))],
};

/// 基于端口的最小处理器，用来走通连接跟踪路径
#[derive(Debug)]
struct PortsHandler {
    timeouts: TimeoutSlot,
    allow_transition: bool,
}

impl PortsHandler {
    fn new(allow_transition: bool) -> Self {
        Self {
            timeouts: TimeoutSlot::default(),
            allow_transition,
        }
    }
}

impl ProtocolHandler for PortsHandler {
    fn descriptor(&self) -> &ProtocolDescriptor {
        &PORTS_DESCRIPTOR
    }

    fn timeouts(&self) -> &TimeoutSlot {
        &self.timeouts
    }

    fn pkt_to_tuple(&self, pkt: &Packet, offset: usize) -> Result<ConnectionTuple, PacketError> {
        let h = pkt.header_bytes(offset, 4)?;
        Ok(ConnectionTuple::Ports {
            src: u16::from_be_bytes([h[0], h[1]]),
            dst: u16::from_be_bytes([h[2], h[3]]),
        })
    }

    fn invert_tuple(&self, tuple: &ConnectionTuple) -> Option<ConnectionTuple> {
        match *tuple {
            ConnectionTuple::Ports { src, dst } => Some(ConnectionTuple::Ports { src: dst, dst: src }),
            _ => None,
        }
    }

    fn conn_in_get(
        &self,
        pkt: &Packet,
        offset: usize,
        inverse: bool,
        table: &dyn ConnectionTable,
    ) -> Option<ConnRef> {
        let tuple = self.pkt_to_tuple(pkt, offset).ok()?;
        table.in_get(&LookupKey::from_packet(pkt, &tuple, inverse)?)
    }

    fn conn_out_get(
        &self,
        pkt: &Packet,
        offset: usize,
        inverse: bool,
        table: &dyn ConnectionTable,
    ) -> Option<ConnRef> {
        let tuple = self.pkt_to_tuple(pkt, offset).ok()?;
        table.out_get(&LookupKey::from_packet(pkt, &tuple, inverse)?)
    }

    fn conn_schedule(
        &self,
        pkt: &Packet,
        offset: usize,
        scheduler: &dyn Scheduler,
    ) -> Result<Scheduled, SchedulingError> {
        let tuple = self
            .pkt_to_tuple(pkt, offset)
            .map_err(|e| SchedulingError::Rejected(e.to_string()))?;
        let conn = scheduler.schedule(pkt, &tuple)?;
        Ok(Scheduled {
            verdict: Verdict::Accept,
            conn: Some(conn),
        })
    }

    fn csum_check(&self, _pkt: &Packet, _offset: usize, _len: usize) -> bool {
        true
    }

    fn state_transition(
        &self,
        conn: &mut VirtualConnection,
        _dir: Direction,
        _pkt: &Packet,
        _offset: usize,
    ) -> bool {
        if let Some(t) = self.timeouts.current() {
            conn.timeout = t.get(0);
        }
        self.allow_transition
    }

    fn debug_packet(&self, _pkt: &Packet, _offset: usize, msg: &str) -> String {
        format!("{msg}: PORTS")
    }
}

#[derive(Default)]
struct MapTable {
    conns: Mutex<HashMap<LookupKey, ConnRef>>,
}

impl MapTable {
    fn insert(&self, key: LookupKey, conn: ConnRef) {
        self.conns.lock().expect("table lock").insert(key, conn);
    }
}

impl ConnectionTable for MapTable {
    fn in_get(&self, key: &LookupKey) -> Option<ConnRef> {
        self.conns.lock().expect("table lock").get(key).cloned()
    }

    fn out_get(&self, key: &LookupKey) -> Option<ConnRef> {
        self.in_get(&key.reversed())
    }
}

/// 把新连接记进表里的调度器
struct TableScheduler {
    table: Arc<MapTable>,
    fail: bool,
}

impl Scheduler for TableScheduler {
    fn schedule(&self, pkt: &Packet, tuple: &ConnectionTuple) -> Result<ConnRef, SchedulingError> {
        if self.fail {
            return Err(SchedulingError::NoRealServer);
        }
        let key = LookupKey::from_packet(pkt, tuple, false)
            .ok_or_else(|| SchedulingError::Rejected("no ports".to_string()))?;
        let conn = VirtualConnection::new(
            key.protocol,
            SocketAddrV4::new(key.src, key.src_port),
            SocketAddrV4::new(key.dst, key.dst_port),
        )
        .into_ref();
        self.table.insert(key, Arc::clone(&conn));
        Ok(conn)
    }
}

fn udp_between(src: [u8; 4], dst: [u8; 4], sport: u16, dport: u16) -> Packet {
    let mut udp = Vec::new();
    udp.extend_from_slice(&sport.to_be_bytes());
    udp.extend_from_slice(&dport.to_be_bytes());
    udp.extend_from_slice(&[0, 8, 0, 0]);
    Packet::parse(ipv4_between(src, dst, IPPROTO_UDP, 0, &udp)).expect("pkt")
}

fn udp_packet(sport: u16, dport: u16) -> Packet {
    udp_between(SRC, DST, sport, dport)
}

/// 从 DST 回到 SRC 的应答
fn udp_reply(sport: u16, dport: u16) -> Packet {
    udp_between(DST, SRC, sport, dport)
}

fn ports_dispatcher(allow: bool, fail: bool) -> (Dispatcher, Arc<MapTable>) {
    let mut reg = ProtocolRegistry::with_builtin();
    reg.register(Arc::new(PortsHandler::new(allow))).expect("register");
    let table = Arc::new(MapTable::default());
    let sched = TableScheduler {
        table: Arc::clone(&table),
        fail,
    };
    let d = Dispatcher::new(Arc::new(reg), table.clone(), Arc::new(sched));
    (d, table)
}

#[test]
fn icmp_echo_is_accepted_without_tracking() {
    let d = Dispatcher::standalone(Arc::new(ProtocolRegistry::with_builtin()));
    assert_eq!(d.process(&icmp_packet(8, 0, 0x1234), Direction::Input), Verdict::Accept);
    assert_eq!(d.process(&icmp_packet(0, 0, 0x1234), Direction::Output), Verdict::Accept);

    let s = d.stats().snapshot();
    assert_eq!(
        s,
        StatsSnapshot {
            packets: 2,
            accepted: 2,
            ..StatsSnapshot::default()
        }
    );
}

#[test]
fn unknown_protocol_is_not_ours() {
    let d = Dispatcher::standalone(Arc::new(ProtocolRegistry::with_builtin()));
    let gre = Packet::parse(ipv4(47, 0, &[0; 4])).expect("pkt");
    assert_eq!(d.process(&gre, Direction::Input), Verdict::Accept);
    assert_eq!(d.stats().snapshot().not_ours, 1);
}

#[test]
fn bad_icmp_checksum_is_dropped() {
    let d = Dispatcher::standalone(Arc::new(ProtocolRegistry::with_builtin()));
    let mut msg = icmp_message(8, 0, 1, 1, b"ping");
    msg[9] ^= 0x10;
    let pkt = Packet::parse(ipv4(IPPROTO_ICMP, 0, &msg)).expect("pkt");
    assert_eq!(d.process(&pkt, Direction::Input), Verdict::Drop);

    let s = d.stats().snapshot();
    assert_eq!(s.checksum_errors, 1);
    assert_eq!(s.dropped, 1);
}

#[test]
fn short_icmp_header_is_dropped() {
    let d = Dispatcher::standalone(Arc::new(ProtocolRegistry::with_builtin()));
    let pkt = Packet::parse(ipv4(IPPROTO_ICMP, 0, &[8, 0, 0, 0])).expect("pkt");
    assert_eq!(d.process(&pkt, Direction::Input), Verdict::Drop);
    assert_eq!(d.stats().snapshot().malformed, 1);
}

#[test]
fn non_first_fragment_is_passed_through() {
    let d = Dispatcher::standalone(Arc::new(ProtocolRegistry::with_builtin()));
    let pkt = Packet::parse(ipv4(IPPROTO_ICMP, 0x0002, &[0xff; 3])).expect("pkt");
    assert_eq!(d.process(&pkt, Direction::Input), Verdict::Accept);
    assert_eq!(d.stats().snapshot().fragments, 1);
}

#[test]
fn first_packet_schedules_and_later_packets_are_tracked() {
    let (d, table) = ports_dispatcher(true, false);
    let pkt = udp_packet(40000, 53);

    assert_eq!(d.process(&pkt, Direction::Input), Verdict::Accept);
    let s = d.stats().snapshot();
    assert_eq!((s.scheduled, s.tracked), (1, 0));

    let key = LookupKey::from_packet(&pkt, &ConnectionTuple::Ports { src: 40000, dst: 53 }, false)
        .expect("key");
    let conn = table.in_get(&key).expect("scheduled connection");
    assert_eq!(conn.lock().expect("conn").timeout, Duration::from_secs(300));

    assert_eq!(d.process(&pkt, Direction::Input), Verdict::Accept);
    // 回包方向用反向键命中同一连接
    assert_eq!(d.process(&udp_reply(53, 40000), Direction::Output), Verdict::Accept);
    let s = d.stats().snapshot();
    assert_eq!((s.scheduled, s.tracked), (1, 2));
}

#[test]
fn admin_timeout_change_reaches_next_transition() {
    let (d, table) = ports_dispatcher(true, false);
    let pkt = udp_packet(1000, 80);
    d.process(&pkt, Direction::Input);

    d.registry()
        .set_state_timeout(IPPROTO_UDP, "NORMAL", Duration::from_secs(7))
        .expect("known state");
    d.process(&pkt, Direction::Input);

    let key = LookupKey::from_packet(&pkt, &ConnectionTuple::Ports { src: 1000, dst: 80 }, false)
        .expect("key");
    let conn = table.in_get(&key).expect("conn");
    assert_eq!(conn.lock().expect("conn").timeout, Duration::from_secs(7));
}

#[test]
fn scheduling_error_drops_only_that_packet() {
    let (d, _table) = ports_dispatcher(true, true);
    assert_eq!(d.process(&udp_packet(1, 2), Direction::Input), Verdict::Drop);
    assert_eq!(d.process(&icmp_packet(8, 0, 1), Direction::Input), Verdict::Accept);

    let s = d.stats().snapshot();
    assert_eq!(s.schedule_errors, 1);
    assert_eq!((s.accepted, s.dropped), (1, 1));
}

#[test]
fn invalid_transition_drops_packet() {
    let (d, _table) = ports_dispatcher(false, false);
    let pkt = udp_packet(5, 6);
    assert_eq!(d.process(&pkt, Direction::Input), Verdict::Drop);
    assert_eq!(d.process(&pkt, Direction::Input), Verdict::Drop);

    let s = d.stats().snapshot();
    assert_eq!(s.invalid_transitions, 2);
    assert_eq!(s.tracked, 1);
}

#[test]
fn outbound_without_connection_is_not_scheduled() {
    let (d, table) = ports_dispatcher(true, false);
    assert_eq!(d.process(&udp_reply(53, 40000), Direction::Output), Verdict::Accept);
    assert_eq!(d.stats().snapshot().scheduled, 0);
    assert!(table.conns.lock().expect("table").is_empty());
}

#[test]
fn dispatcher_is_shared_across_threads() {
    let d = Dispatcher::standalone(Arc::new(ProtocolRegistry::with_builtin()));
    std::thread::scope(|s| {
        for id in 0..4u16 {
            let d = &d;
            s.spawn(move || {
                for _ in 0..250 {
                    assert_eq!(d.process(&icmp_packet(8, 0, id), Direction::Input), Verdict::Accept);
                }
            });
        }
    });
    assert_eq!(d.stats().snapshot().accepted, 1_000);
}
