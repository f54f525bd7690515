mod common;

use bytes::Bytes;
use common::{init_tracing, test_sensor};
use fg_driver_lpmp::protocol::{
    frame::{FragmentFlag, FragmentRecord, SensorId},
    reassembly::Reassembler,
};
use std::time::Duration;

const WINDOW: Duration = Duration::from_secs(20);

fn record(
    sensor: SensorId,
    business_seq: u8,
    fragment_seq: u8,
    flag: FragmentFlag,
    payload: &[u8],
) -> FragmentRecord {
    FragmentRecord {
        sensor,
        business_seq,
        fragment_seq,
        flag,
        payload: Bytes::copy_from_slice(payload),
    }
}

/// Let tasks woken by a virtual-time advance actually run.
async fn settle() {
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn single_fragment_unit_finalizes_immediately() {
    init_tracing();
    let reassembler = Reassembler::new(WINDOW);
    let sensor = test_sensor();

    let sdu = reassembler
        .ingest(record(sensor, 1, 0, FragmentFlag::ONLY, b"solo"))
        .expect("first+last fragment completes its unit");
    assert_eq!(&sdu.payload[..], b"solo");
    assert_eq!(sdu.sensor, sensor);
    assert_eq!(reassembler.pending_units(), 0);
}

#[tokio::test]
async fn out_of_order_fragments_assemble_in_sequence_order() {
    init_tracing();
    let reassembler = Reassembler::new(WINDOW);
    let sensor = test_sensor();

    assert!(reassembler
        .ingest(record(sensor, 7, 0, FragmentFlag::FIRST, b"AA"))
        .is_none());
    assert!(reassembler
        .ingest(record(sensor, 7, 3, FragmentFlag::LAST, b"DD"))
        .is_none());
    assert!(reassembler
        .ingest(record(sensor, 7, 2, FragmentFlag::MIDDLE, b"CC"))
        .is_none());

    let sdu = reassembler
        .ingest(record(sensor, 7, 1, FragmentFlag::MIDDLE, b"BB"))
        .expect("last gap filled, unit completes");
    assert_eq!(&sdu.payload[..], b"AABBCCDD");
    assert_eq!(reassembler.pending_units(), 0);
}

#[tokio::test]
async fn retransmitted_first_fragment_restarts_assembly() {
    init_tracing();
    let reassembler = Reassembler::new(WINDOW);
    let sensor = test_sensor();

    assert!(reassembler
        .ingest(record(sensor, 3, 0, FragmentFlag::FIRST, b"OLD0"))
        .is_none());
    assert!(reassembler
        .ingest(record(sensor, 3, 1, FragmentFlag::MIDDLE, b"OLD1"))
        .is_none());

    // Same business unit starts over: previously buffered data is gone.
    assert!(reassembler
        .ingest(record(sensor, 3, 0, FragmentFlag::FIRST, b"NEW0"))
        .is_none());
    let sdu = reassembler
        .ingest(record(sensor, 3, 1, FragmentFlag::LAST, b"NEW1"))
        .expect("restarted unit completes");
    assert_eq!(&sdu.payload[..], b"NEW0NEW1");
}

#[tokio::test]
async fn new_business_unit_supersedes_in_flight_unit() {
    init_tracing();
    let reassembler = Reassembler::new(WINDOW);
    let sensor = test_sensor();

    assert!(reassembler
        .ingest(record(sensor, 1, 0, FragmentFlag::FIRST, b"A"))
        .is_none());
    assert!(reassembler
        .ingest(record(sensor, 2, 0, FragmentFlag::FIRST, b"B"))
        .is_none());
    assert_eq!(reassembler.pending_units(), 1);

    let sdu = reassembler
        .ingest(record(sensor, 2, 1, FragmentFlag::LAST, b"C"))
        .expect("new unit completes");
    assert_eq!(&sdu.payload[..], b"BC");
}

#[tokio::test]
async fn orphans_stale_duplicates_and_foreign_fragments_drop() {
    init_tracing();
    let reassembler = Reassembler::new(WINDOW);
    let sensor = test_sensor();

    // No baseline: middle/last fragments have nothing to attach to.
    assert!(reassembler
        .ingest(record(sensor, 1, 1, FragmentFlag::MIDDLE, b"X"))
        .is_none());
    assert_eq!(reassembler.pending_units(), 0);

    assert!(reassembler
        .ingest(record(sensor, 1, 0, FragmentFlag::FIRST, b"A"))
        .is_none());

    // Stale duplicate of the already-appended fragment.
    assert!(reassembler
        .ingest(record(sensor, 1, 0, FragmentFlag::MIDDLE, b"A"))
        .is_none());
    // Fragment of a different business unit that is not a first.
    assert!(reassembler
        .ingest(record(sensor, 9, 1, FragmentFlag::MIDDLE, b"Z"))
        .is_none());

    // The in-flight unit is unaffected by either drop.
    let sdu = reassembler
        .ingest(record(sensor, 1, 1, FragmentFlag::LAST, b"B"))
        .expect("unit completes");
    assert_eq!(&sdu.payload[..], b"AB");
}

#[tokio::test]
async fn sensors_assemble_independently() {
    init_tracing();
    let reassembler = Reassembler::new(WINDOW);
    let one = test_sensor();
    let two = SensorId::from_hex("0102030405FF").unwrap();

    assert!(reassembler
        .ingest(record(one, 1, 0, FragmentFlag::FIRST, b"1a"))
        .is_none());
    assert!(reassembler
        .ingest(record(two, 1, 0, FragmentFlag::FIRST, b"2a"))
        .is_none());
    assert_eq!(reassembler.pending_units(), 2);

    let sdu = reassembler
        .ingest(record(two, 1, 1, FragmentFlag::LAST, b"2b"))
        .unwrap();
    assert_eq!(&sdu.payload[..], b"2a2b");

    let sdu = reassembler
        .ingest(record(one, 1, 1, FragmentFlag::LAST, b"1b"))
        .unwrap();
    assert_eq!(&sdu.payload[..], b"1a1b");
}

#[tokio::test(start_paused = true)]
async fn incomplete_unit_times_out_silently() {
    init_tracing();
    let reassembler = Reassembler::new(WINDOW);
    let sensor = test_sensor();

    assert!(reassembler
        .ingest(record(sensor, 5, 0, FragmentFlag::FIRST, b"A"))
        .is_none());
    assert_eq!(reassembler.pending_units(), 1);

    settle().await;
    tokio::time::advance(WINDOW + Duration::from_millis(500)).await;
    settle().await;
    assert_eq!(reassembler.pending_units(), 0);

    // A late fragment of the evicted unit is now an orphan.
    assert!(reassembler
        .ingest(record(sensor, 5, 1, FragmentFlag::LAST, b"B"))
        .is_none());

    // A fresh unit for the same sensor is accepted normally afterward.
    let sdu = reassembler
        .ingest(record(sensor, 6, 0, FragmentFlag::ONLY, b"fresh"))
        .expect("fresh unit accepted after timeout");
    assert_eq!(&sdu.payload[..], b"fresh");
}

#[tokio::test(start_paused = true)]
async fn superseded_timer_cannot_evict_the_successor_unit() {
    init_tracing();
    let reassembler = Reassembler::new(WINDOW);
    let sensor = test_sensor();

    assert!(reassembler
        .ingest(record(sensor, 1, 0, FragmentFlag::FIRST, b"old"))
        .is_none());

    tokio::time::advance(Duration::from_secs(10)).await;
    settle().await;

    // Supersede at t=10s; the successor's own window runs until t=30s.
    assert!(reassembler
        .ingest(record(sensor, 2, 0, FragmentFlag::FIRST, b"new"))
        .is_none());

    // Cross t=20s, where the superseded unit's timer would have fired.
    tokio::time::advance(Duration::from_secs(11)).await;
    settle().await;
    assert_eq!(
        reassembler.pending_units(),
        1,
        "successor unit must survive the stale timer deadline"
    );

    // The successor still completes normally.
    let sdu = reassembler
        .ingest(record(sensor, 2, 1, FragmentFlag::LAST, b"!"))
        .unwrap();
    assert_eq!(&sdu.payload[..], b"new!");
}

#[tokio::test(start_paused = true)]
async fn finalized_unit_arms_no_lingering_timer() {
    init_tracing();
    let reassembler = Reassembler::new(WINDOW);
    let sensor = test_sensor();

    assert!(reassembler
        .ingest(record(sensor, 1, 0, FragmentFlag::FIRST, b"A"))
        .is_none());
    assert!(reassembler
        .ingest(record(sensor, 1, 1, FragmentFlag::LAST, b"B"))
        .is_some());

    // Start a second unit right away; the first unit's (cancelled) timer
    // deadline passes while this one is mid-assembly.
    assert!(reassembler
        .ingest(record(sensor, 2, 0, FragmentFlag::FIRST, b"C"))
        .is_none());
    tokio::time::advance(WINDOW - Duration::from_secs(1)).await;
    settle().await;
    assert_eq!(reassembler.pending_units(), 1);
}
