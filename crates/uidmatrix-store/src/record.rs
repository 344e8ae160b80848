//! Record shape and the stored-form rules applied at import time.

use serde::{Deserialize, Serialize};

/// One row of the UniqueID Matrix.
///
/// Records are returned verbatim: nothing on the query path rewrites a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Which sheet (source table) the row came from.
    pub sheet_source: String,
    pub unique_id: String,
    pub name: String,
    pub xpath: String,
    /// `unique_id` without its trailing `.<instance>` segment.
    pub reference_id: String,
    /// Version label → presence marker, as JSON object text in source column order.
    pub version_availability: String,
}

/// A single entry of [`Record::version_availability`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    pub label: String,
    /// `None` when the sheet cell was empty (blank, `null`, or `nan`).
    pub marker: Option<String>,
}

impl Record {
    /// Decode the version availability map, keeping source column order.
    pub fn versions(&self) -> Result<Vec<VersionEntry>, serde_json::Error> {
        if self.version_availability.trim().is_empty() {
            return Ok(Vec::new());
        }
        let map: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&self.version_availability)?;

        Ok(map
            .into_iter()
            .map(|(label, value)| VersionEntry {
                label,
                marker: presence_marker(&value),
            })
            .collect())
    }
}

fn presence_marker(value: &serde_json::Value) -> Option<String> {
    let text = match value {
        serde_json::Value::Null => return None,
        serde_json::Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    if text.is_empty() || text.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(text)
    }
}

/// Strip the trailing `.<instance>` segment from a unique id.
///
/// An id without any `.` is its own reference.
pub fn derive_reference_id(unique_id: &str) -> &str {
    let unique_id = unique_id.trim();
    match unique_id.rsplit_once('.') {
        Some((reference, _instance)) if !reference.is_empty() => reference,
        _ => unique_id,
    }
}

/// Canonical xpath form: surrounding whitespace and every leading/trailing `/` removed.
///
/// Idempotent: `normalize_xpath(normalize_xpath(x)) == normalize_xpath(x)`.
pub fn normalize_xpath(raw: &str) -> String {
    raw.trim_matches(|c: char| c == '/' || c.is_whitespace())
        .to_string()
}
