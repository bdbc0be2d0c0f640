use chart_stock::data::{CoIterator, KeyRegistry, SearchMode, Table};

fn table(keys: &[i64]) -> Table {
    let mut table = Table::new();
    for key in keys {
        table.add_row(*key as f64, vec![1.0]).expect("valid key");
    }
    table
}

#[test]
fn merges_keys_of_several_storages() {
    let mut daily = table(&[1, 3, 5]);
    let mut hourly = table(&[2, 3, 4, 6]);
    let registry = KeyRegistry::from_storages(&[
        daily.storage_ref(None).expect("main storage"),
        hourly.storage_ref(None).expect("main storage"),
    ]);
    assert_eq!(registry.keys(), &[1, 2, 3, 4, 5, 6]);
    assert!(!registry.is_in_sync_mode());

    let same = KeyRegistry::from_storages(&[daily.storage(None)]);
    assert!(same.is_in_sync_mode());
    assert_eq!(hourly.storage(None).len(), 4);
}

#[test]
fn identical_sources_are_in_sync_mode() {
    let first = table(&[1, 2, 3]);
    let second = table(&[1, 2, 3]);
    let registry = KeyRegistry::from_storages(&[
        first.storage_ref(None).expect("main storage"),
        second.storage_ref(None).expect("main storage"),
    ]);
    assert!(registry.is_in_sync_mode());
    assert_eq!(registry.len(), 3);
}

#[test]
fn index_lookup_follows_search_mode() {
    let registry = KeyRegistry::from_keys(vec![10, 20, 40]);
    assert_eq!(registry.index_of_key(20, SearchMode::Exact), Some(1));
    assert_eq!(registry.index_of_key(30, SearchMode::Exact), None);
    assert_eq!(registry.index_of_key(30, SearchMode::ExactOrPrev), Some(1));
    assert_eq!(registry.index_of_key(30, SearchMode::ExactOrNext), Some(2));
    assert_eq!(registry.index_of_key(30, SearchMode::Nearest), Some(2));
    assert_eq!(registry.index_of_key(24, SearchMode::Nearest), Some(1));
    assert_eq!(registry.key_at(2), Some(40));
    assert_eq!(registry.key_at(3), None);
}

#[test]
fn iterator_range_is_clamped() {
    let registry = KeyRegistry::from_keys(vec![1, 2, 3]);
    let mut co = registry.iter(1, 1);
    assert_eq!(co.rows_count(), 1);
    assert!(co.advance());
    assert_eq!(co.current_key(), Some(2));
    assert!(!co.advance());

    let mut empty = registry.iter(2, 0);
    assert_eq!(empty.rows_count(), 0);
    assert!(!empty.advance());

    let default_registry = KeyRegistry::default();
    let mut none = default_registry.iter_all();
    assert!(!none.advance());
    assert_eq!(none.current_index(), None);
}
