use rand::{rngs::StdRng, SeedableRng};
use std::time::Duration;
use sweepbench_client::recorder::LatencyRecorder;

#[test]
fn test_unbounded_keeps_everything_in_order() {
    let mut r = LatencyRecorder::with_rng(None, StdRng::seed_from_u64(1));
    for v in [5, 3, 9] {
        r.record_ns(v);
    }
    r.record(Duration::from_micros(2));
    assert_eq!(r.seen(), 4);
    assert_eq!(r.into_samples(), vec![5, 3, 9, 2_000]);
}

#[test]
fn test_reservoir_never_exceeds_capacity() {
    let mut r = LatencyRecorder::with_rng(Some(16), StdRng::seed_from_u64(42));
    for v in 0..10_000 {
        r.record_ns(v);
    }
    assert_eq!(r.seen(), 10_000);
    assert_eq!(r.len(), 16);
    assert!(r.into_samples().iter().all(|&v| v < 10_000));
}

#[test]
fn test_reservoir_below_capacity_keeps_all() {
    let mut r = LatencyRecorder::with_rng(Some(100), StdRng::seed_from_u64(7));
    for v in 0..10 {
        r.record_ns(v);
    }
    assert_eq!(r.into_samples(), (0..10).collect::<Vec<u64>>());
}

#[test]
fn test_reservoir_replaces_early_samples() {
    // With 10_000 offers and room for 10, keeping exactly the first ten is
    // astronomically unlikely for a uniform sample.
    let mut r = LatencyRecorder::with_rng(Some(10), StdRng::seed_from_u64(3));
    for v in 0..10_000 {
        r.record_ns(v);
    }
    let kept = r.into_samples();
    assert!(kept.iter().any(|&v| v >= 10), "reservoir kept only the first samples: {kept:?}");
}

#[test]
fn test_zero_capacity_keeps_nothing() {
    let mut r = LatencyRecorder::with_rng(Some(0), StdRng::seed_from_u64(0));
    r.record_ns(1);
    r.record_ns(2);
    assert_eq!(r.seen(), 2);
    assert!(r.is_empty());
}
