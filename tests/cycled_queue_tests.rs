use chart_stock::ChartError;
use chart_stock::core::CycledQueue;
use proptest::prelude::*;

#[test]
fn enqueue_reports_eviction_only_when_full() {
    let mut queue = CycledQueue::new(2);
    assert_eq!(queue.enqueue(0.0), None);
    assert_eq!(queue.enqueue(f64::NAN), None);
    let evicted = queue.enqueue(3.0).expect("full queue evicts");
    assert_eq!(evicted, 0.0);
    assert!(queue.enqueue(4.0).expect("full queue evicts").is_nan());
    assert_eq!(queue.len(), 2);
}

#[test]
fn negative_indices_count_from_newest() {
    let mut queue = CycledQueue::new(3);
    for value in [1, 2, 3, 4] {
        queue.enqueue(value);
    }
    assert_eq!(queue.value(-1), Some(4));
    assert_eq!(queue.value(-3), Some(2));
    assert_eq!(queue.value(0), Some(2));
    assert_eq!(queue.value(2), Some(4));
    assert_eq!(queue.value(3), None);
    assert_eq!(queue.value(-4), None);
}

#[test]
fn try_get_reports_out_of_range() {
    let mut queue = CycledQueue::new(2);
    queue.enqueue(1);
    queue.enqueue(2);
    let err = queue.try_get(-5).expect_err("out of range");
    assert!(matches!(err, ChartError::IndexOutOfRange { index: -5, len: 2 }));
}

#[test]
fn clear_keeps_capacity() {
    let mut queue = CycledQueue::new(2);
    queue.enqueue('a');
    queue.enqueue('b');
    queue.enqueue('c');
    queue.clear();
    assert!(queue.is_empty());
    assert_eq!(queue.capacity(), 2);
    assert_eq!(queue.enqueue('d'), None);
    assert_eq!(queue.value(-1), Some('d'));
}

#[test]
fn dequeue_returns_oldest_first() {
    let mut queue = CycledQueue::new(3);
    for value in 1..=4 {
        queue.enqueue(value);
    }
    assert_eq!(queue.dequeue(), Some(2));
    queue.enqueue(5);
    assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
}

#[test]
fn zero_capacity_evicts_every_value() {
    let mut queue = CycledQueue::new(0);
    assert_eq!(queue.enqueue(7), Some(7));
    assert!(queue.is_empty());
}

proptest! {
    #[test]
    fn length_never_exceeds_capacity(
        capacity in 1usize..8,
        values in prop::collection::vec(-1_000i64..1_000, 0..64)
    ) {
        let mut queue = CycledQueue::new(capacity);
        for (count, value) in values.iter().enumerate() {
            queue.enqueue(*value);
            prop_assert!(queue.len() <= capacity);
            prop_assert_eq!(queue.len(), (count + 1).min(capacity));
            prop_assert_eq!(queue.value(-1), Some(*value));
            let oldest = values[(count + 1).saturating_sub(capacity)];
            prop_assert_eq!(queue.value(0), Some(oldest));
        }
    }
}
