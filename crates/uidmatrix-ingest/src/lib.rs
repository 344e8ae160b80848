//! uidmatrix importer: UniqueID Matrix sheets → record store.
//!
//! Input is either the matrix workbook itself (`.xlsx` and friends, read with
//! `calamine`) or one CSV export per sheet. From a workbook the sheets in
//! [`WORKBOOK_SHEETS`] are imported; any that are absent are skipped with a
//! warning. Two layouts are recognised:
//!
//! | sheet kind  | xpath column          | name column       | stored xpath      |
//! |-------------|-----------------------|-------------------|-------------------|
//! | containers  | `XPath`               | `Container Name`  | xpath             |
//! | data points | `DatapointUsageXPath` | `Data Point Name` | xpath + `/` name  |
//!
//! Every import rebuilds the store from scratch; see
//! [`uidmatrix_store::StoreBuilder`].

use calamine::{open_workbook_auto, Data, Reader};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use uidmatrix_store::{
    derive_reference_id, normalize_xpath, Record, SourceImport, StoreBuilder, StoreError,
};

#[cfg(test)]
mod tests;

/// Sheets imported from a workbook, in import order.
pub const WORKBOOK_SHEETS: [&str; 3] = [
    "Container XPaths",
    "Data Point XPaths (1-1m)",
    "Data Point XPaths (1m+)",
];

const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Trimmed header row and raw body rows.
type SheetRows = (Vec<String>, Vec<Vec<String>>);

const UNIQUE_ID_COLUMN: &str = "Unique ID";
const REFERENCE_ID_COLUMN: &str = "Reference ID";
const CONTAINER_NAME_COLUMN: &str = "Container Name";
const DATA_POINT_NAME_COLUMN: &str = "Data Point Name";
const XPATH_COLUMNS: [&str; 2] = ["XPath", "DatapointUsageXPath"];
const VERSION_COLUMN_PREFIX: &str = "Version";

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("no input sheets given")]
    NoSources,
    #[error("{}: none of the sheets {expected} found", .path.display())]
    NoSheets { path: PathBuf, expected: String },
    #[error("{}: missing required column {column}", .path.display())]
    MissingColumn { path: PathBuf, column: String },
    #[error("{}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{}: {source}", .path.display())]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    /// One sheet per file.
    Csv,
    /// `sheet` names a worksheet inside the file.
    Workbook,
}

/// One sheet to import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSource {
    pub path: PathBuf,
    /// Provenance tag stored on every record (`sheet_source`).
    pub sheet: String,
    pub format: SheetFormat,
}

impl SheetSource {
    /// CSV export named after the file stem (`Container XPaths.csv` → `Container XPaths`).
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let sheet = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path,
            sheet,
            format: SheetFormat::Csv,
        }
    }

    /// Worksheet `sheet` of the workbook at `path`.
    pub fn worksheet(path: impl Into<PathBuf>, sheet: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sheet: sheet.into(),
            format: SheetFormat::Workbook,
        }
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = sheet.into();
        self
    }
}

/// Result of reading one sheet, before it is written anywhere.
#[derive(Debug, Clone)]
pub struct SheetImport {
    pub source: SheetSource,
    pub records: Vec<Record>,
    /// Rows dropped for having no unique id.
    pub skipped: usize,
    /// Rows whose `Reference ID` disagreed with the unique id and was replaced.
    pub corrected_references: usize,
    /// Digest of the file the sheet came from.
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub db_path: PathBuf,
    pub sources: Vec<SourceImport>,
}

impl ImportSummary {
    pub fn total_records(&self) -> usize {
        self.sources.iter().map(|s| s.rows).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.sources.iter().map(|s| s.skipped).sum()
    }
}

// ============================================================================
// Workbooks
// ============================================================================

/// Whether `path` looks like a spreadsheet workbook rather than a CSV export.
pub fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| WORKBOOK_EXTENSIONS.iter().any(|w| e.eq_ignore_ascii_case(w)))
}

/// Split `wanted` into the sheets present in `available` and the missing ones.
///
/// Names compare after trimming; the workbook's own spelling is kept.
pub fn select_sheets<'a>(
    available: &[String],
    wanted: &[&'a str],
) -> (Vec<String>, Vec<&'a str>) {
    let mut found = Vec::new();
    let mut missing = Vec::new();
    for &name in wanted {
        match available.iter().find(|a| a.trim() == name) {
            Some(actual) => found.push(actual.clone()),
            None => missing.push(name),
        }
    }
    (found, missing)
}

/// The importable sheets of the workbook at `path`.
pub fn workbook_sources(path: impl AsRef<Path>) -> Result<Vec<SheetSource>, ImportError> {
    let path = path.as_ref();
    let workbook = open_workbook_auto(path).map_err(|e| workbook_error(path, e))?;
    let (found, missing) = select_sheets(&workbook.sheet_names(), &WORKBOOK_SHEETS);

    for &sheet in &missing {
        tracing::warn!(path = %path.display(), sheet, "sheet not found in workbook, skipping");
    }
    if found.is_empty() {
        return Err(ImportError::NoSheets {
            path: path.to_path_buf(),
            expected: WORKBOOK_SHEETS.join(", "),
        });
    }

    Ok(found
        .into_iter()
        .map(|sheet| SheetSource::worksheet(path, sheet))
        .collect())
}

fn workbook_error(path: &Path, source: calamine::Error) -> ImportError {
    ImportError::Workbook {
        path: path.to_path_buf(),
        source,
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Header and body rows of one worksheet; fully blank rows are dropped.
fn worksheet_rows(path: &Path, sheet: &str) -> Result<SheetRows, ImportError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| workbook_error(path, e))?;
    let range = workbook
        .worksheet_range(sheet)
        .map_err(|e| workbook_error(path, e))?;

    let mut rows = range.rows().map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
    let headers = rows
        .next()
        .unwrap_or_default()
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();
    let body = rows
        .filter(|row| row.iter().any(|c| !c.trim().is_empty()))
        .collect();
    Ok((headers, body))
}

// ============================================================================
// CSV exports
// ============================================================================

fn csv_rows(path: &Path, bytes: &[u8]) -> Result<SheetRows, ImportError> {
    let csv_err = |e: csv::Error| ImportError::Csv {
        path: path.to_path_buf(),
        source: e,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(bytes);
    let headers = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();

    let mut body = Vec::new();
    for row in reader.records() {
        let row = row.map_err(csv_err)?;
        body.push(row.iter().map(str::to_string).collect());
    }
    Ok((headers, body))
}

// ============================================================================
// Row rules
// ============================================================================

/// Column positions for one sheet layout.
#[derive(Debug)]
struct Layout {
    unique_id: usize,
    reference_id: Option<usize>,
    name: usize,
    xpath: usize,
    data_points: bool,
    versions: Vec<(String, usize)>,
}

impl Layout {
    fn detect(path: &Path, headers: &[String]) -> Result<Self, ImportError> {
        let position = |name: &str| headers.iter().position(|h| h == name);
        let missing = |column: &str| ImportError::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
        };

        let xpath = XPATH_COLUMNS
            .iter()
            .find_map(|&c| position(c))
            .ok_or_else(|| missing(XPATH_COLUMNS.join(" or ").as_str()))?;
        let (name, data_points) = match position(CONTAINER_NAME_COLUMN) {
            Some(idx) => (idx, false),
            None => (
                position(DATA_POINT_NAME_COLUMN).ok_or_else(|| {
                    missing(format!("{CONTAINER_NAME_COLUMN} or {DATA_POINT_NAME_COLUMN}").as_str())
                })?,
                true,
            ),
        };
        let unique_id = position(UNIQUE_ID_COLUMN).ok_or_else(|| missing(UNIQUE_ID_COLUMN))?;

        let versions = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.starts_with(VERSION_COLUMN_PREFIX))
            .map(|(idx, h)| (h.clone(), idx))
            .collect();

        Ok(Self {
            unique_id,
            reference_id: position(REFERENCE_ID_COLUMN),
            name,
            xpath,
            data_points,
            versions,
        })
    }
}

/// Read and validate one sheet.
pub fn read_sheet(source: &SheetSource) -> Result<SheetImport, ImportError> {
    let path = source.path.as_path();
    let bytes = std::fs::read(path).map_err(|e| ImportError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let sha256 = hex::encode(Sha256::digest(&bytes));

    let (headers, rows) = match source.format {
        SheetFormat::Csv => csv_rows(path, &bytes)?,
        SheetFormat::Workbook => worksheet_rows(path, &source.sheet)?,
    };
    let layout = Layout::detect(path, &headers)?;

    let mut records = Vec::new();
    let mut skipped = 0;
    let mut corrected_references = 0;

    for (idx, row) in rows.iter().enumerate() {
        let field = |i: usize| row.get(i).map(|f| f.trim()).unwrap_or("");
        // Header is line 1.
        let line = idx + 2;

        let unique_id = field(layout.unique_id);
        if unique_id.is_empty() {
            tracing::debug!(
                path = %path.display(),
                sheet = %source.sheet,
                line,
                "skipping row without unique id"
            );
            skipped += 1;
            continue;
        }

        let derived = derive_reference_id(unique_id);
        let provided = layout.reference_id.map(|i| field(i)).unwrap_or("");
        if !provided.is_empty() && provided != derived {
            tracing::warn!(
                path = %path.display(),
                sheet = %source.sheet,
                line,
                unique_id,
                provided,
                derived,
                "reference id does not match unique id; using derived value"
            );
            corrected_references += 1;
        }

        let name = field(layout.name);
        let base_xpath = normalize_xpath(field(layout.xpath));
        let xpath = if layout.data_points && !name.is_empty() {
            normalize_xpath(&format!("{base_xpath}/{name}"))
        } else {
            base_xpath
        };

        let versions: serde_json::Map<String, serde_json::Value> = layout
            .versions
            .iter()
            .map(|(label, i)| {
                let marker = field(*i);
                let value = if marker.is_empty() {
                    serde_json::Value::Null
                } else {
                    serde_json::Value::String(marker.to_string())
                };
                (label.clone(), value)
            })
            .collect();

        records.push(Record {
            sheet_source: source.sheet.clone(),
            unique_id: unique_id.to_string(),
            name: name.to_string(),
            xpath,
            reference_id: derived.to_string(),
            version_availability: serde_json::Value::Object(versions).to_string(),
        });
    }

    if skipped > 0 {
        tracing::warn!(
            path = %path.display(),
            sheet = %source.sheet,
            skipped,
            "rows without a unique id were skipped"
        );
    }

    Ok(SheetImport {
        source: source.clone(),
        records,
        skipped,
        corrected_references,
        sha256,
    })
}

/// Rebuild the store at `db_path` from `sources`.
///
/// All sheets are read before the new store is swapped in; any failure leaves
/// the previous store untouched.
pub fn import(
    sources: &[SheetSource],
    db_path: impl AsRef<Path>,
) -> Result<ImportSummary, ImportError> {
    if sources.is_empty() {
        return Err(ImportError::NoSources);
    }
    let db_path = db_path.as_ref();

    let mut builder = StoreBuilder::create(db_path)?;
    let mut imported = Vec::with_capacity(sources.len());

    for source in sources {
        let sheet = read_sheet(source)?;
        builder.insert_records(&sheet.records)?;

        let meta = SourceImport {
            sheet_source: sheet.source.sheet.clone(),
            source_path: sheet.source.path.display().to_string(),
            rows: sheet.records.len(),
            skipped: sheet.skipped,
            sha256: sheet.sha256.clone(),
            imported_at: Utc::now(),
        };
        builder.record_source(&meta)?;

        tracing::info!(
            sheet = %meta.sheet_source,
            rows = meta.rows,
            skipped = meta.skipped,
            corrected = sheet.corrected_references,
            "imported sheet"
        );
        imported.push(meta);
    }

    let db_path = builder.finish()?;
    Ok(ImportSummary {
        db_path,
        sources: imported,
    })
}
