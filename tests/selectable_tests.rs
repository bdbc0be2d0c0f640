use chart_stock::data::{
    AggregationType, Column, Interval, IntervalUnit, SearchMode, Table, TableMapping,
    TableSelectable,
};
use chart_stock::ChartError;

const ROWS: [(f64, f64); 5] = [
    (10.0, 0.5),
    (20.0, 4.0),
    (30.0, 6.0),
    (40.0, 5.0),
    (50.0, 20.0),
];

fn close_table() -> (Table, TableMapping) {
    let mut table = Table::new();
    for (key, close) in ROWS {
        table.add_row(key, vec![close]).expect("valid key");
    }
    let mut mapping = TableMapping::new(&table);
    mapping
        .add_field(&mut table, "close", 0, None)
        .expect("same table");
    (table, mapping)
}

#[test]
fn visible_rows_and_neighbours_follow_the_selection() {
    let (mut table, mapping) = close_table();
    let mut selectable = TableSelectable::new(mapping);
    assert!(selectable.first_visible_row(&mut table).is_none());

    let selection = selectable.select(&mut table, 20, 40, None);
    assert_eq!(selection.rows_count(), 3);

    let first = selectable.first_visible_row(&mut table).expect("selected");
    assert_eq!((first.key(), first.index()), (20, 1));
    let last = selectable.last_visible_row(&mut table).expect("selected");
    assert_eq!(last.key(), 40);
    let pre = selectable.pre_first_row(&mut table).expect("row before 20");
    assert_eq!(pre.key(), 10);
    let post = selectable.post_last_row(&mut table).expect("row after 40");
    assert_eq!(post.get("close"), Some(20.0));
}

#[test]
fn min_max_include_the_neighbouring_rows() {
    let (mut table, mapping) = close_table();
    let mut selectable = TableSelectable::new(mapping);
    assert_eq!(selectable.min("close"), None);

    selectable.select(&mut table, 20, 40, None);
    assert_eq!(selectable.min("close"), Some(0.5));
    assert_eq!(selectable.max("close"), Some(20.0));
    assert_eq!(selectable.min("volume"), None);

    selectable.select(&mut table, 10, 50, None);
    assert!(selectable.pre_first_row(&mut table).is_none());
    assert!(selectable.post_last_row(&mut table).is_none());
}

#[test]
fn empty_and_reversed_ranges() {
    let (mut table, mapping) = close_table();
    let mut selectable = TableSelectable::new(mapping);

    let gap = selectable.select(&mut table, 21, 29, None);
    assert!(gap.is_empty());
    assert_eq!((gap.pre_first(), gap.post_last()), (Some(1), Some(2)));
    assert!(selectable.first_visible_row(&mut table).is_none());

    let reversed = selectable.select(&mut table, 40, 20, None);
    assert!(reversed.is_empty());
}

#[test]
fn search_modes_resolve_rows() {
    let (mut table, mapping) = close_table();
    let selectable = TableSelectable::new(mapping);

    let exact = selectable.search(&mut table, 30, SearchMode::Exact);
    assert_eq!(exact.map(|row| row.key()), Some(30));
    assert!(selectable.search(&mut table, 25, SearchMode::Exact).is_none());

    let prev = selectable.search(&mut table, 25, SearchMode::ExactOrPrev);
    assert_eq!(prev.map(|row| row.key()), Some(20));
    let next = selectable.search(&mut table, 25, SearchMode::ExactOrNext);
    assert_eq!(next.map(|row| row.key()), Some(30));
    let tie = selectable.search(&mut table, 25, SearchMode::Nearest);
    assert_eq!(tie.map(|row| row.key()), Some(30));

    assert!(selectable.search(&mut table, 5, SearchMode::ExactOrPrev).is_none());
    assert!(selectable.search(&mut table, 55, SearchMode::ExactOrNext).is_none());
    let clamped = selectable.search(&mut table, 55, SearchMode::Nearest);
    assert_eq!(clamped.map(|row| row.key()), Some(50));
}

#[test]
fn grouped_selection_reads_aggregate_columns() {
    let (mut table, mapping) = close_table();
    let mut selectable = TableSelectable::new(mapping);
    let interval = Interval::new(IntervalUnit::Millisecond, 20).expect("interval");

    let selection = selectable.select_all(&mut table, Some(interval));
    assert_eq!(selection.rows_count(), 3);
    assert_eq!(selectable.interval(), Some(interval));

    let keys: Vec<(i64, Option<f64>)> = [0, 20, 40]
        .iter()
        .map(|key| {
            let row = selectable
                .search(&mut table, *key, SearchMode::Exact)
                .expect("bucket row");
            (row.key(), row.get("close"))
        })
        .collect();
    assert_eq!(keys, vec![(0, Some(0.5)), (20, Some(6.0)), (40, Some(20.0))]);
    assert_eq!(selectable.max("close"), Some(20.0));
}

#[test]
fn unbound_fields_report_mapping_errors() {
    let (mut table, mapping) = close_table();
    assert!(matches!(
        mapping.column("open", false),
        Err(ChartError::MappingBinding { ref field }) if field == "open"
    ));
    assert_eq!(mapping.column("close", true).expect("bound"), Column::Value(0));

    let selectable = TableSelectable::new(mapping);
    let row = selectable
        .search(&mut table, 10, SearchMode::Exact)
        .expect("row");
    assert_eq!(row.get("open"), None);
    assert!((row.column(Column::Value(0)) - 0.5).abs() <= 1e-9);
}

#[test]
fn allocated_fields_own_fresh_columns() {
    let (mut table, mut mapping) = close_table();
    let column = mapping
        .allocate_field(&mut table, "signal", Some(AggregationType::Max))
        .expect("same table");
    assert_eq!(column, 1);
    assert_eq!(table.column_count(), 2);
    assert_eq!(table.column_owner(1), Some(mapping.id()));
    assert_eq!(table.column_owner(0), None);
    assert!(table.storage(None).rows().iter().all(|row| row.value(1).is_nan()));

    let binding = mapping.binding("signal").expect("bound");
    assert_eq!(binding.aggregation, Some(AggregationType::Max));
    assert_eq!(
        mapping.field_names().collect::<Vec<_>>(),
        vec!["close", "signal"]
    );

    let other = Table::new();
    let mut foreign = TableMapping::new(&other);
    assert!(matches!(
        foreign.allocate_field(&mut table, "x", None),
        Err(ChartError::MappingTableMismatch)
    ));
    assert!(mapping
        .remove_field(&mut table, "signal")
        .expect("same table")
        .is_some());
    assert!(!mapping.contains("signal"));
}
