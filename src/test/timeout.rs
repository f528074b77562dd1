use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::AdminError;
use crate::proto::{IcmpHandler, ProtocolHandler, StateTimeout, TimeoutSlot, TimeoutTable};

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

#[test]
fn new_requires_matching_lengths() {
    let err = TimeoutTable::new(&["A", "B"], &[secs(1)]).unwrap_err();
    assert_eq!(err, AdminError::LengthMismatch { names: 2, timeouts: 1 });

    let t = TimeoutTable::new(&["A", "B"], &[secs(1), secs(2)]).expect("table");
    assert_eq!(t.len(), 2);
    assert_eq!(t.get(0), secs(1));
    assert_eq!(t.get(1), secs(2));
    assert_eq!(t.state_name(1), Some("B"));
    assert_eq!(t.state_name(2), None);
}

#[test]
fn set_by_name_updates_only_the_named_state() {
    let t = TimeoutTable::new(&["SYN", "EST", "FIN"], &[secs(10), secs(900), secs(120)])
        .expect("table");
    t.set_by_name("EST", secs(60)).expect("known");
    assert_eq!(t.get(0), secs(10));
    assert_eq!(t.get(1), secs(60));
    assert_eq!(t.get(2), secs(120));
}

#[test]
fn set_by_name_unknown_state_leaves_table_unchanged() {
    let t = TimeoutTable::new(&["ICMP"], &[secs(60)]).expect("table");
    assert_eq!(
        t.set_by_name("NoSuchState", secs(1)),
        Err(AdminError::UnknownState("NoSuchState".to_string()))
    );
    // 大小写敏感
    assert!(t.set_by_name("icmp", secs(1)).is_err());
    assert_eq!(t.get(0), secs(60));
}

#[test]
fn handler_set_state_timeout_round_trips_through_get() {
    let h = IcmpHandler::new();
    h.init();
    h.set_state_timeout("ICMP", secs(42)).expect("known state");
    let table = h.timeouts().current().expect("installed");
    assert_eq!(table.get(0), secs(42));

    assert_eq!(
        h.set_state_timeout("NoSuchState", secs(7)),
        Err(AdminError::UnknownState("NoSuchState".to_string()))
    );
    assert_eq!(table.get(0), secs(42));
}

#[test]
fn handler_set_state_timeout_before_init_fails() {
    let h = IcmpHandler::new();
    assert_eq!(
        h.set_state_timeout("ICMP", secs(1)),
        Err(AdminError::NotInitialised("ICMP".to_string()))
    );
}

#[test]
fn init_reinstalls_defaults() {
    let h = IcmpHandler::new();
    h.init();
    h.set_state_timeout("ICMP", secs(1)).expect("known");
    h.exit();
    h.init();
    assert_eq!(
        h.timeout_snapshot(),
        Some(vec![StateTimeout {
            state: "ICMP".to_string(),
            timeout_ms: 60_000,
            timeout_ns: 60_000_000_000,
        }])
    );
}

#[test]
fn sub_millisecond_timeouts_round_trip_exactly() {
    let t = TimeoutTable::new(&["S"], &[Duration::from_micros(1_500)]).expect("table");
    assert_eq!(t.get(0), Duration::from_micros(1_500));

    let h = IcmpHandler::new();
    h.init();
    h.set_state_timeout("ICMP", Duration::from_micros(1_500))
        .expect("known state");
    let table = h.timeouts().current().expect("installed");
    assert_eq!(table.get(0), Duration::from_micros(1_500));

    let snap = h.timeout_snapshot().expect("installed");
    assert_eq!(snap[0].timeout_ms, 1);
    assert_eq!(snap[0].timeout_ns, 1_500_000);
}

#[test]
fn oversized_timeout_saturates() {
    let t = TimeoutTable::new(&["S"], &[Duration::MAX]).expect("table");
    assert_eq!(t.get(0), Duration::from_nanos(u64::MAX));
}

#[test]
fn slot_release_is_noop_when_empty() {
    let slot = TimeoutSlot::default();
    assert!(!slot.release());
    slot.install(TimeoutTable::from_states(&[("S", secs(3))]));
    assert!(slot.is_installed());
    assert!(slot.release());
    assert!(!slot.release());
    assert!(slot.current().is_none());
}

#[test]
fn concurrent_readers_never_observe_torn_values() {
    let a = Duration::from_nanos(0x0000_0001_0000_0001);
    let b = Duration::from_nanos(0xffff_fffe_ffff_fffe);
    let table = Arc::new(TimeoutTable::new(&["S"], &[a]).expect("table"));
    let stop = Arc::new(AtomicBool::new(false));

    std::thread::scope(|s| {
        for _ in 0..4 {
            let table = Arc::clone(&table);
            let stop = Arc::clone(&stop);
            s.spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let v = table.get(0);
                    assert!(v == a || v == b, "torn read: {v:?}");
                }
            });
        }

        for i in 0..10_000 {
            let v = if i % 2 == 0 { b } else { a };
            table.set_by_name("S", v).expect("known");
        }
        stop.store(true, Ordering::Relaxed);
    });
}
