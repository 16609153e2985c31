use sweepbench_common::{BenchError, ExperimentKey, SampleSet};

#[test]
fn test_append_preserves_order() {
    let mut set = SampleSet::new(ExperimentKey::new("v", 1));
    assert!(set.is_empty());
    set.push(3.0);
    set.extend([1.0, 2.0]);
    assert_eq!(set.samples(), &[3.0, 1.0, 2.0]);
    assert_eq!(set.len(), 3);
}

#[test]
fn test_merge_same_key() {
    let key = ExperimentKey::new("v", 2);
    let mut set = SampleSet::with_samples(key.clone(), vec![1.0]);
    set.merge(SampleSet::with_samples(key, vec![2.0, 3.0])).unwrap();
    assert_eq!(set.samples(), &[1.0, 2.0, 3.0]);
}

#[test]
fn test_merge_rejects_foreign_key() {
    let mut set = SampleSet::with_samples(ExperimentKey::new("v", 2), vec![1.0]);
    let err = set.merge(SampleSet::with_samples(ExperimentKey::new("v", 3), vec![9.0])).unwrap_err();
    assert!(matches!(err, BenchError::KeyMismatch { .. }));
    assert_eq!(set.samples(), &[1.0]);
}

#[test]
fn test_summarize_twice_without_appends_is_identical() {
    let set = SampleSet::with_samples(ExperimentKey::new("v", 1), vec![10.0, 12.0, 11.5, 9.8]);
    assert_eq!(set.summarize(0.95).unwrap(), set.summarize(0.95).unwrap());
}

#[test]
fn test_summary_reflects_new_appends() {
    let mut set = SampleSet::with_samples(ExperimentKey::new("v", 1), vec![10.0]);
    let before = set.summarize(0.95).unwrap();
    set.push(20.0);
    let after = set.summarize(0.95).unwrap();
    assert_eq!(before.count, 1);
    assert_eq!(after.count, 2);
    assert_eq!(after.mean, 15.0);
}

#[test]
fn test_summarize_empty_set_fails() {
    let set = SampleSet::new(ExperimentKey::new("v", 1));
    assert!(matches!(set.summarize(0.95), Err(BenchError::Stats(_))));
}
