//! Tests for the sink module

use super::*;
use crate::types::{Record, UnitOfWork};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::tempdir;

fn schema(placeholders: bool) -> TableSchema {
    TableSchema::new(
        vec![
            Column::new("id", ColumnSource::Field("id".to_string())),
            Column::new("species", ColumnSource::Term),
            Column::new("country", ColumnSource::Region),
            Column::new("taxon_key", ColumnSource::Param("taxon_key".to_string())),
            Column::field("observed_on", "observed_on"),
            Column::field("user", "user.login"),
        ],
        "id",
        placeholders,
    )
    .unwrap()
}

fn unit() -> UnitOfWork {
    UnitOfWork::with_region("Vespa velutina", "FR").with_param("taxon_key", "1311477")
}

fn record(id: &str, observed_on: &str) -> Record {
    let fields = json!({
        "id": id,
        "observed_on": observed_on,
        "user": {"login": "naturalist"}
    });
    Record::new(id, fields.as_object().unwrap().clone())
}

fn ids_in(path: &std::path::Path) -> Vec<String> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader
        .records()
        .map(|r| r.unwrap().get(0).unwrap().to_string())
        .collect()
}

// ============================================================================
// Schema Tests
// ============================================================================

#[test]
fn test_schema_requires_identity_column() {
    let result = TableSchema::new(vec![Column::field("name", "name")], "id", false);
    assert!(result.is_err());
}

#[test]
fn test_schema_rejects_duplicate_columns() {
    let result = TableSchema::new(
        vec![Column::field("id", "id"), Column::field("id", "other")],
        "id",
        false,
    );
    assert!(result.is_err());
}

#[test]
fn test_row_rendering() {
    let schema = schema(false);
    let mut rec = record("42", "2023-05-01");
    rec.fields.insert("tags".to_string(), json!(["a", "b"]));

    assert_eq!(schema.headers(), vec!["id", "species", "country", "taxon_key", "observed_on", "user"]);
    assert_eq!(
        schema.row(&unit(), &rec),
        vec!["42", "Vespa velutina", "FR", "1311477", "2023-05-01", "naturalist"]
    );
}

#[test]
fn test_identity_column_always_uses_record_id() {
    let schema = TableSchema::new(
        vec![Column::field("key", "does.not.exist")],
        "key",
        false,
    )
    .unwrap();
    assert_eq!(schema.row(&unit(), &Record::bare("abc")), vec!["abc"]);
}

#[test]
fn test_placeholder_row() {
    let schema = schema(true);
    assert_eq!(
        schema.placeholder_row(&unit()),
        vec![
            "placeholder:Vespa velutina|FR",
            "Vespa velutina",
            "FR",
            "1311477",
            "",
            ""
        ]
    );
}

// ============================================================================
// CsvSink Tests
// ============================================================================

#[test]
fn test_merge_creates_file_with_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out").join("observations.csv");
    let mut sink = CsvSink::new(&path, schema(false));

    let stats = sink
        .merge(&unit(), &[record("1", "2023-01-02"), record("2", "2023-01-03")])
        .unwrap();

    assert_eq!(stats.written, 2);
    assert_eq!(stats.duplicates, 0);
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.starts_with("id,species,country,taxon_key,observed_on,user\n"));
    assert_eq!(ids_in(&path), vec!["1", "2"]);
}

#[test]
fn test_merge_drops_existing_and_batch_duplicates() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("observations.csv");
    let mut sink = CsvSink::new(&path, schema(false));

    sink.merge(&unit(), &[record("1", "a"), record("2", "b")]).unwrap();
    let stats = sink
        .merge(
            &unit(),
            &[record("2", "b"), record("3", "c"), record("3", "c")],
        )
        .unwrap();

    assert_eq!(stats.written, 1);
    assert_eq!(stats.duplicates, 2);
    assert_eq!(ids_in(&path), vec!["1", "2", "3"]);
}

#[test]
fn test_merge_reads_existing_keys_from_previous_run() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("observations.csv");

    CsvSink::new(&path, schema(false))
        .merge(&unit(), &[record("1", "a")])
        .unwrap();

    // A new process with a cold cache
    let mut sink = CsvSink::new(&path, schema(false));
    let stats = sink.merge(&unit(), &[record("1", "a"), record("9", "z")]).unwrap();

    assert_eq!(stats.written, 1);
    assert_eq!(ids_in(&path), vec!["1", "9"]);
}

#[test]
fn test_nothing_new_leaves_file_untouched() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("observations.csv");
    let mut sink = CsvSink::new(&path, schema(false));

    sink.merge(&unit(), &[record("1", "a")]).unwrap();
    let before = std::fs::read(&path).unwrap();

    let stats = sink.merge(&unit(), &[record("1", "a")]).unwrap();
    assert_eq!(stats.written, 0);
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn test_empty_batch_writes_one_placeholder() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("observations.csv");
    let mut sink = CsvSink::new(&path, schema(true));

    let stats = sink.merge(&unit(), &[]).unwrap();
    assert!(stats.placeholder);
    assert_eq!(stats.written, 1);

    let stats = sink.merge(&unit(), &[]).unwrap();
    assert!(!stats.placeholder);
    assert_eq!(ids_in(&path), vec!["placeholder:Vespa velutina|FR"]);
}

#[test]
fn test_empty_batch_without_placeholders_creates_header_only() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("observations.csv");
    let mut sink = CsvSink::new(&path, schema(false));

    let stats = sink.merge(&unit(), &[]).unwrap();
    assert_eq!(stats, MergeStats::default());
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "id,species,country,taxon_key,observed_on,user\n"
    );
}

fn set_aside_files(dir: &std::path::Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("observations.csv.corrupt-"))
        .collect()
}

#[test]
fn test_mismatched_header_starts_a_new_table() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("observations.csv");
    std::fs::write(&path, "something,else\nx,y\n").unwrap();

    let mut sink = CsvSink::new(&path, schema(false));
    let stats = sink.merge(&unit(), &[record("x", "a")]).unwrap();

    assert_eq!(stats.written, 1);
    assert_eq!(stats.duplicates, 0);

    let mut reader = csv::Reader::from_path(&path).unwrap();
    assert_eq!(
        reader.headers().unwrap().iter().collect::<Vec<_>>(),
        schema(false).headers()
    );
    assert_eq!(ids_in(&path), vec!["x"]);

    let moved = set_aside_files(dir.path());
    assert_eq!(moved.len(), 1);
    assert_eq!(
        std::fs::read_to_string(dir.path().join(&moved[0])).unwrap(),
        "something,else\nx,y\n"
    );
}

#[test]
fn test_table_without_identity_column_is_keyed_on_later_runs() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("observations.csv");
    std::fs::write(&path, "species,observed_on\nVespa velutina,2023-01-01\n").unwrap();

    // First run replaces the table, a redone unit on the next run dedups
    let mut sink = CsvSink::new(&path, schema(false));
    sink.merge(&unit(), &[record("1", "a"), record("2", "b")]).unwrap();

    let mut sink = CsvSink::new(&path, schema(false));
    let stats = sink
        .merge(&unit(), &[record("1", "a"), record("2", "b"), record("3", "c")])
        .unwrap();

    assert_eq!(stats.written, 1);
    assert_eq!(stats.duplicates, 2);
    assert_eq!(ids_in(&path), vec!["1", "2", "3"]);
    assert_eq!(set_aside_files(dir.path()).len(), 1);
}

#[test]
fn test_torn_header_is_replaced() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("observations.csv");
    std::fs::write(&path, "id,spec").unwrap();

    let mut sink = CsvSink::new(&path, schema(false));
    sink.merge(&unit(), &[record("1", "a")]).unwrap();

    let mut sink = CsvSink::new(&path, schema(false));
    let stats = sink.merge(&unit(), &[record("1", "a")]).unwrap();

    assert_eq!(stats.duplicates, 1);
    assert_eq!(ids_in(&path), vec!["1"]);
}

#[test]
fn test_values_with_commas_are_quoted() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("observations.csv");
    let mut sink = CsvSink::new(&path, schema(false));

    sink.merge(&unit(), &[record("1", "near Lyon, France")]).unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let row = reader.records().next().unwrap().unwrap();
    assert_eq!(row.get(4), Some("near Lyon, France"));
}
