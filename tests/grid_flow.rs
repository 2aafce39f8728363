use std::fs;
use std::sync::Arc;

use parking_lot::Mutex;
use snappy_grid_lib::export::{self, Column, ColumnFormat, CsvOptions};
use snappy_grid_lib::file::{load_records, write_export};
use snappy_grid_lib::search::{self, fuzzy_scores};
use snappy_grid_lib::types::PageMeta;
use snappy_grid_lib::{ClientPager, PaginationOptions, SearchOptions, Strategy, Value};

const PEOPLE: &str = r#"[
  {"name": "Jonathan", "city": {"name": "Hanoi"}, "salary": 1200.5, "active": true},
  {"name": "Jon", "city": {"name": "Paris"}, "salary": 900, "active": false},
  {"name": "Maria", "city": {"name": "Hanoi"}, "salary": 1500, "active": true},
  {"name": "Joy", "city": {"name": "Lyon"}, "salary": 800, "active": true},
  {"name": "Mark", "city": {"name": "Paris"}, "salary": 1000, "active": false}
]"#;

fn people() -> Vec<Value> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.json");
    fs::write(&path, PEOPLE).unwrap();
    load_records(&path).unwrap()
}

fn names(records: &[Value]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.resolve_path("name").and_then(|v| v.text()))
        .collect()
}

#[test]
fn field_scoped_search_feeds_the_pager() {
    let records = people();
    let options = SearchOptions {
        fields: Some(vec!["city.name".into()]),
        ..SearchOptions::default()
    };
    let hits = search::filter(&records, "paris", &options);
    assert_eq!(names(&hits), vec!["Jon", "Mark"]);

    let rendered: Arc<Mutex<Vec<PageMeta>>> = Arc::default();
    let sink = Arc::clone(&rendered);
    let mut pager = ClientPager::new(
        records.clone(),
        PaginationOptions {
            items_per_page: 2,
            ..PaginationOptions::default()
        },
    )
    .with_render(move |_, meta| {
        sink.lock().push(*meta);
        Ok(())
    });

    assert!(pager.go_to_page(3));
    assert_eq!(names(pager.current_page_data()), vec!["Mark"]);

    pager.search(|r| search::matches(r, "hanoi", &SearchOptions::default()));
    assert_eq!(pager.len(), 2);
    assert_eq!(pager.page_meta().current_page, 1);

    pager.reset_search(records);
    assert_eq!(pager.len(), 5);

    let metas = rendered.lock();
    assert_eq!(metas.len(), 4);
    assert_eq!(metas[1].current_page, 3);
    assert_eq!(metas[2].total_items, 2);
}

#[test]
fn fuzzy_ranks_closest_names_first() {
    let records = people();
    let options = SearchOptions {
        strategy: Strategy::Fuzzy,
        fields: Some(vec!["name".into()]),
        threshold: 0.6,
        ..SearchOptions::default()
    };
    let hits = search::filter(&records, "jon", &options);
    assert_eq!(names(&hits), vec!["Jonathan", "Jon", "Joy"]);

    let scored = fuzzy_scores(&records, "jon", Some(&["name".to_string()][..]), 0.6);
    let scores: Vec<f64> = scored.iter().map(|(_, s)| *s).collect();
    assert_eq!(scores[0], 1.0);
    assert_eq!(scores[1], 1.0);
    assert!((scores[2] - 2.0 / 3.0).abs() < 1e-9);
}

#[test]
fn search_hits_export_to_csv_file() {
    let records = people();
    let active = search::filter(
        &records,
        "true",
        &SearchOptions {
            fields: Some(vec!["active".into()]),
            exact_match: true,
            ..SearchOptions::default()
        },
    );
    assert_eq!(active.len(), 3);

    let csv = export::to_csv(
        &active,
        &CsvOptions {
            columns: Some(vec![
                Column::new("name").with_header("Name"),
                Column::new("city.name").with_header("City"),
                Column::new("salary").with_format(ColumnFormat::Currency),
                Column::new("active").with_format(ColumnFormat::Boolean),
            ]),
            ..CsvOptions::default()
        },
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("active.csv");
    write_export(&out, &csv, true).unwrap();

    let written = fs::read_to_string(&out).unwrap();
    let body = written.strip_prefix('\u{feff}').unwrap();
    assert_eq!(
        body,
        "Name,City,salary,active\n\
         Jonathan,Hanoi,\"$1,200.50\",Yes\n\
         Maria,Hanoi,\"$1,500.00\",Yes\n\
         Joy,Lyon,$800.00,Yes\n"
    );
}
