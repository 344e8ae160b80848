//! Import from CSV fixtures into a scratch store

use super::*;
use std::fs;
use tempfile::tempdir;
use uidmatrix_store::{Column, Predicate, RecordStore};

const CONTAINERS: &str = "\
Unique ID, Container Name ,XPath,Reference ID,Version 3.4,Version 3.6
MC000001.00001,MESSAGE,//MESSAGE/,MC000001,X,X
MC000002.00001,ABOUT_VERSIONS,MESSAGE/ABOUT_VERSIONS,MC000002,,X
,ORPHAN,MESSAGE/ORPHAN,,X,X
MC000003.00001,ABOUT_VERSION,/MESSAGE/ABOUT_VERSIONS/ABOUT_VERSION,WRONG01,nan,X
";

const DATA_POINTS: &str = "\
Unique ID,Data Point Name,DatapointUsageXPath,Version 3.6
MD000001.00001,AboutVersionIdentifier,MESSAGE/ABOUT_VERSIONS/ABOUT_VERSION/,X
MD000001.00002,AboutVersionIdentifier,DEAL/ABOUT_VERSIONS/ABOUT_VERSION,X
";

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn container_sheet_rules() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "Container XPaths.csv", CONTAINERS);
    let sheet = read_sheet(&SheetSource::from_path(&path)).unwrap();

    assert_eq!(sheet.source.sheet, "Container XPaths");
    assert_eq!(sheet.records.len(), 3);
    assert_eq!(sheet.skipped, 1);
    assert_eq!(sheet.corrected_references, 1);
    assert_eq!(sheet.sha256.len(), 64);

    let first = &sheet.records[0];
    assert_eq!(first.xpath, "MESSAGE");
    assert_eq!(first.name, "MESSAGE");
    assert_eq!(first.reference_id, "MC000001");

    let third = &sheet.records[2];
    assert_eq!(third.xpath, "MESSAGE/ABOUT_VERSIONS/ABOUT_VERSION");
    assert_eq!(third.reference_id, "MC000003");
    assert_eq!(
        third.version_availability,
        r#"{"Version 3.4":"nan","Version 3.6":"X"}"#
    );
    let versions = third.versions().unwrap();
    assert_eq!(versions[0].marker, None);
    assert_eq!(versions[1].marker.as_deref(), Some("X"));
}

#[test]
fn data_point_sheet_appends_name_and_derives_reference() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "points.csv", DATA_POINTS);
    let sheet =
        read_sheet(&SheetSource::from_path(&path).with_sheet("Data Point XPaths (1-1m)")).unwrap();

    assert_eq!(sheet.records[0].sheet_source, "Data Point XPaths (1-1m)");
    assert_eq!(
        sheet.records[0].xpath,
        "MESSAGE/ABOUT_VERSIONS/ABOUT_VERSION/AboutVersionIdentifier"
    );
    assert_eq!(sheet.records[1].reference_id, "MD000001");
    assert_eq!(sheet.corrected_references, 0);
}

#[test]
fn missing_columns_are_reported() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "bad.csv", "Unique ID,Container Name\nMC1.1,X\n");
    match read_sheet(&SheetSource::from_path(&path)) {
        Err(ImportError::MissingColumn { column, .. }) => {
            assert_eq!(column, "XPath or DatapointUsageXPath")
        }
        other => panic!("unexpected: {other:?}"),
    }

    let path = write(dir.path(), "bad2.csv", "Unique ID,XPath\nMC1.1,X\n");
    assert!(matches!(
        read_sheet(&SheetSource::from_path(&path)),
        Err(ImportError::MissingColumn { .. })
    ));
}

#[test]
fn import_builds_queryable_store_with_metadata() {
    let dir = tempdir().unwrap();
    let containers = write(dir.path(), "Container XPaths.csv", CONTAINERS);
    let points = write(dir.path(), "Data Point XPaths.csv", DATA_POINTS);
    let db = dir.path().join("xpath_data.db");

    let summary = import(
        &[SheetSource::from_path(&containers), SheetSource::from_path(&points)],
        &db,
    )
    .unwrap();
    assert_eq!(summary.total_records(), 5);
    assert_eq!(summary.total_skipped(), 1);

    let store = RecordStore::open(&db).unwrap();
    assert_eq!(store.record_count().unwrap(), 5);

    let hits = store
        .execute(&Predicate::exact(Column::ReferenceId, "md000001"))
        .unwrap();
    assert_eq!(hits.len(), 2);

    let sources = store.sources().unwrap();
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0].sheet_source, "Container XPaths");
    assert_eq!(sources[0].skipped, 1);
    assert_eq!(sources[1].rows, 2);
}

#[test]
fn failed_import_keeps_previous_store() {
    let dir = tempdir().unwrap();
    let good = write(dir.path(), "Container XPaths.csv", CONTAINERS);
    let bad = write(dir.path(), "bad.csv", "Nothing,Useful\n1,2\n");
    let db = dir.path().join("xpath_data.db");

    import(&[SheetSource::from_path(&good)], &db).unwrap();
    let err = import(
        &[SheetSource::from_path(&good), SheetSource::from_path(&bad)],
        &db,
    )
    .unwrap_err();
    assert!(matches!(err, ImportError::MissingColumn { .. }));

    let store = RecordStore::open(&db).unwrap();
    assert_eq!(store.record_count().unwrap(), 3);
}

#[test]
fn import_without_sources_or_with_missing_file() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("xpath_data.db");
    assert!(matches!(import(&[], &db), Err(ImportError::NoSources)));
    assert!(matches!(
        import(&[SheetSource::from_path(dir.path().join("absent.csv"))], &db),
        Err(ImportError::Io { .. })
    ));
    assert!(!db.exists());
}

// ============================================================================
// Workbook input
// ============================================================================

fn workbook_fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/matrix_sample.xlsx")
}

#[test]
fn sheet_selection_keeps_listed_order_and_reports_missing() {
    let available = vec![
        "Notes".to_string(),
        "Data Point XPaths (1-1m) ".to_string(),
        "Container XPaths".to_string(),
    ];
    let (found, missing) = select_sheets(&available, &WORKBOOK_SHEETS);
    assert_eq!(found, vec!["Container XPaths", "Data Point XPaths (1-1m) "]);
    assert_eq!(missing, vec!["Data Point XPaths (1m+)"]);

    let (found, missing) = select_sheets(&["Sheet1".to_string()], &WORKBOOK_SHEETS);
    assert!(found.is_empty());
    assert_eq!(missing.len(), 3);
}

#[test]
fn workbook_extensions_are_recognised() {
    assert!(is_workbook(Path::new("UniqueID_Matrix_v3.6.2_B373.xlsx")));
    assert!(is_workbook(Path::new("matrix.XLSX")));
    assert!(!is_workbook(Path::new("Container XPaths.csv")));
    assert!(!is_workbook(Path::new("matrix")));
}

#[test]
fn workbook_sources_skip_absent_and_unlisted_sheets() {
    let sources = workbook_sources(workbook_fixture()).unwrap();
    let sheets: Vec<&str> = sources.iter().map(|s| s.sheet.as_str()).collect();
    assert_eq!(sheets, vec!["Container XPaths", "Data Point XPaths (1-1m)"]);
    assert!(sources.iter().all(|s| s.format == SheetFormat::Workbook));
}

#[test]
fn worksheet_rows_follow_the_same_rules_as_csv() {
    let containers =
        read_sheet(&SheetSource::worksheet(workbook_fixture(), "Container XPaths")).unwrap();
    // The blank spacer row is dropped, not counted.
    assert_eq!(containers.records.len(), 3);
    assert_eq!(containers.skipped, 0);
    assert_eq!(containers.records[0].xpath, "MESSAGE");
    assert_eq!(containers.records[0].sheet_source, "Container XPaths");
    assert_eq!(
        containers.records[1].version_availability,
        r#"{"Version 3.4":null,"Version 3.6":"X"}"#
    );

    let points = read_sheet(&SheetSource::worksheet(
        workbook_fixture(),
        "Data Point XPaths (1-1m)",
    ))
    .unwrap();
    assert_eq!(
        points.records[0].xpath,
        "MESSAGE/ABOUT_VERSIONS/ABOUT_VERSION/AboutVersionIdentifier"
    );
    assert_eq!(points.records[1].reference_id, "MD000001");
    assert_eq!(points.sha256, containers.sha256);
}

#[test]
fn workbook_import_builds_the_store() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("xpath_data.db");

    let sources = workbook_sources(workbook_fixture()).unwrap();
    let summary = import(&sources, &db).unwrap();
    assert_eq!(summary.total_records(), 5);

    let store = RecordStore::open(&db).unwrap();
    let hits = store
        .execute(&Predicate::exact(Column::Xpath, "message/about_versions/about_version"))
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].unique_id, "MC000003.00001");
}

#[test]
fn missing_worksheet_is_a_workbook_error() {
    let err = read_sheet(&SheetSource::worksheet(workbook_fixture(), "Nope")).unwrap_err();
    assert!(matches!(err, ImportError::Workbook { .. }), "{err:?}");
}
