// End-to-end runs of the snappy-grid binary.
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::{json, Value};

const PEOPLE: &str = r#"[
  {"name": "Jonathan", "city": {"name": "Hanoi"}, "salary": 1200.5},
  {"name": "Jon", "city": {"name": "Paris"}, "salary": 900},
  {"name": "Maria", "city": {"name": "Hanoi"}, "salary": 1500},
  {"name": "Mark", "city": {"name": "Paris"}, "salary": 1000}
]"#;

// Settings are read from the user's config dir; point it at an empty one.
fn cmd(config_home: &Path) -> Command {
    let exe = env!("CARGO_BIN_EXE_snappy-grid");
    let mut command = Command::new(exe);
    command
        .env("XDG_CONFIG_HOME", config_home)
        .env_remove("RUST_LOG");
    command
}

fn parse_stdout(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

fn people_file(dir: &Path) -> String {
    let path = dir.join("people.json");
    fs::write(&path, PEOPLE).expect("write records");
    path.to_str().expect("utf8 path").to_string()
}

#[test]
fn window_prints_page_items() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = cmd(temp.path())
        .args(["window", "100", "--page", "5"])
        .output()
        .expect("window");
    assert_eq!(
        parse_stdout(&output),
        json!([1, "...", 3, 4, 5, 6, 7, "...", 10])
    );
}

#[test]
fn search_filters_by_field_and_pages() {
    let temp = tempfile::tempdir().expect("tempdir");
    let file = people_file(temp.path());
    let output = cmd(temp.path())
        .args(["search", &file, "paris", "-f", "city.name"])
        .output()
        .expect("search");
    let body = parse_stdout(&output);

    assert_eq!(body["totalCount"], 2);
    assert_eq!(body["hasMore"], false);
    assert_eq!(body["results"][0]["name"], "Jon");
    assert_eq!(body["results"][1]["name"], "Mark");
    assert_eq!(body["pages"], json!([1]));
    assert_eq!(body["info"], "Showing 1 - 2 of 2");
}

#[test]
fn export_writes_excel_workbook() {
    let temp = tempfile::tempdir().expect("tempdir");
    let file = people_file(temp.path());
    let out = temp.path().join("people.xml");
    let output = cmd(temp.path())
        .args([
            "export",
            &file,
            "--output",
            out.to_str().unwrap(),
            "--format",
            "excel",
            "--title",
            "People",
        ])
        .output()
        .expect("export");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let written = fs::read_to_string(&out).expect("read export");
    let xml = written.strip_prefix('\u{feff}').expect("bom");
    assert!(xml.starts_with("<?xml"));
    assert!(xml.contains("<Worksheet ss:Name=\"Sheet1\">"));
    assert!(xml.contains("<Data ss:Type=\"String\">People</Data>"));
    assert!(xml.contains("<Data ss:Type=\"String\">Jonathan</Data>"));
    assert!(xml.contains("<Data ss:Type=\"Number\">1200.5</Data>"));
}

#[test]
fn export_rejects_empty_delimiter() {
    let temp = tempfile::tempdir().expect("tempdir");
    let file = people_file(temp.path());
    let out = temp.path().join("people.csv");
    let output = cmd(temp.path())
        .args(["export", &file, "-o", out.to_str().unwrap(), "--delimiter", ""])
        .output()
        .expect("export");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("delimiter"));
    assert!(!out.exists());
}

#[test]
fn dates_formats_range_for_api() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = cmd(temp.path())
        .args(["dates", "01/12/2024 - 31/12/2024"])
        .output()
        .expect("dates");
    assert_eq!(
        parse_stdout(&output),
        json!({"startDate": "2024-12-01", "endDate": "2024-12-31"})
    );
}

#[test]
fn dates_rejects_unparseable_range() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = cmd(temp.path())
        .args(["dates", "yesterday - today"])
        .output()
        .expect("dates");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid date"));
}
