use chart_stock::data::{
    CoIterator, KeyRegistry, Table, TableIterator, TableMapping, TableSelectable,
};
use serde_json::json;

fn table_and_mapping(keys: &[i64]) -> (Table, TableMapping) {
    let mut table = Table::new();
    for key in keys {
        table
            .add_row(*key as f64, vec![*key as f64 * 100.0])
            .expect("valid key");
    }
    let mut mapping = TableMapping::new(&table);
    mapping
        .add_field(&mut table, "value", 0, None)
        .expect("same table");
    (table, mapping)
}

#[test]
fn simple_iteration_walks_the_selection() {
    let (mut table, mapping) = table_and_mapping(&[1, 2, 3, 4]);
    let selection = table.select(2, 3, None);
    let storage = table.storage(None);
    let mut iterator = TableIterator::new(storage, &selection, &mapping);

    assert_eq!(iterator.rows_count(), 2);
    assert_eq!(iterator.get("value"), None);
    assert_eq!(iterator.index(), None);

    assert!(iterator.advance());
    assert_eq!(iterator.index(), Some(1));
    assert_eq!(iterator.key(), Some(2));
    assert_eq!(iterator.get("value"), Some(200.0));
    assert_eq!(iterator.get("missing"), None);

    assert!(iterator.advance());
    assert_eq!(iterator.key(), Some(3));
    assert!(!iterator.advance());
    assert!(iterator.is_exhausted());
    assert_eq!(iterator.get("value"), None);
    assert_eq!(iterator.key(), None);
    assert!(!iterator.advance());

    iterator.reset();
    assert!(iterator.advance());
    assert_eq!(iterator.key(), Some(2));
}

#[test]
fn empty_selection_exhausts_immediately() {
    let (mut table, mapping) = table_and_mapping(&[1, 5]);
    let selection = table.select(2, 4, None);
    let storage = table.storage(None);
    let mut iterator = TableIterator::new(storage, &selection, &mapping);
    assert!(!iterator.advance());
    assert!(iterator.is_exhausted());
    assert!(iterator.current().is_none());
}

#[test]
fn co_iterator_reports_missing_rows() {
    let (mut table, mapping) = table_and_mapping(&[1, 3, 5]);
    let registry = KeyRegistry::from_keys(vec![1, 2, 3, 4, 5]);
    let selection = table.select(1, 5, None);
    let storage = table.storage(None);
    let mut iterator = TableIterator::new(storage, &selection, &mapping)
        .with_co_iterator(Box::new(registry.iter_all()));

    let mut positions = Vec::new();
    while iterator.advance() {
        positions.push((
            iterator.index().expect("positioned"),
            iterator.key().expect("positioned"),
            iterator.get("value"),
            iterator.exists(),
        ));
    }
    assert_eq!(
        positions,
        vec![
            (0, 1, Some(100.0), true),
            (1, 2, None, false),
            (2, 3, Some(300.0), true),
            (3, 4, None, false),
            (4, 5, Some(500.0), true),
        ]
    );
}

#[test]
fn co_iterator_skips_rows_it_does_not_name() {
    let (mut table, mapping) = table_and_mapping(&[1, 2, 3, 4]);
    let registry = KeyRegistry::from_keys(vec![2, 4, 6]);
    let selection = table.select(1, 4, None);
    let storage = table.storage(None);
    let mut iterator = TableIterator::new(storage, &selection, &mapping)
        .with_co_iterator(Box::new(registry.iter_all()));

    let snapshots = iterator.to_vec();
    let keys: Vec<i64> = snapshots.iter().map(|snapshot| snapshot.key).collect();
    assert_eq!(keys, vec![2, 4, 6]);
    assert!(snapshots[2].fields.is_none());
    let fields = snapshots[1].fields.as_ref().expect("row exists");
    assert_eq!(fields.get("value"), Some(&400.0));
}

#[test]
fn to_vec_leaves_iterator_reset() {
    let (mut table, mapping) = table_and_mapping(&[1, 2, 3]);
    let selection = table.select(1, 3, None);
    let storage = table.storage(None);
    let mut iterator = TableIterator::new(storage, &selection, &mapping);
    assert!(iterator.advance());
    assert!(iterator.advance());

    let snapshots = iterator.to_vec();
    assert_eq!(snapshots.len(), 3);
    assert_eq!(iterator.index(), None);
    assert!(iterator.advance());
    assert_eq!(iterator.key(), Some(1));
}

#[test]
fn meta_follows_the_get_discipline() {
    let (mut table, mapping) = table_and_mapping(&[1, 2]);
    let mut selectable = TableSelectable::new(mapping);
    selectable.select_all(&mut table, None);
    let mut iterator = selectable.iterator(&mut table);

    assert!(!iterator.set_meta("missing", json!(true)));
    assert_eq!(iterator.meta("missing"), None);
    assert!(iterator.advance());
    assert!(iterator.set_meta("label", json!("first")));
    assert_eq!(iterator.meta("label"), Some(&json!("first")));
    assert!(iterator.advance());
    assert_eq!(iterator.meta("label"), None);

    iterator.reset();
    iterator.advance();
    assert_eq!(iterator.meta("label"), Some(&json!("first")));
}

#[test]
fn registry_iterator_is_a_co_iterator() {
    let registry = KeyRegistry::from_keys(vec![5, 1, 3, 3]);
    let mut co = registry.iter(1, 10);
    assert_eq!(co.current_key(), None);
    assert!(co.advance());
    assert_eq!((co.current_index(), co.current_key()), (Some(1), Some(3)));
    assert!(co.advance());
    assert_eq!(co.current_key(), Some(5));
    assert!(!co.advance());
    assert_eq!(co.current_key(), None);
    co.reset();
    assert!(co.advance());
    assert_eq!(co.current_index(), Some(1));
}
