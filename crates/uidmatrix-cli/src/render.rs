//! Human and JSON rendering of lookup results.

use colored::Colorize;
use std::fmt::Write as _;
use uidmatrix_resolve::Resolution;
use std::cmp::Reverse;
use uidmatrix_store::{Record, SourceImport, VersionEntry};

const NOT_AVAILABLE: &str = "N/A";

/// Text rendering. Records appear in store order; versions newest first.
pub fn resolution_text(resolution: &Resolution) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} -> '{}'",
        "Understanding:".dimmed(),
        resolution.intent.lookup_type,
        resolution.intent.search_value
    );

    if resolution.records.is_empty() {
        let _ = writeln!(out, "\n{}", "No results found.".yellow());
        return out;
    }

    let _ = writeln!(
        out,
        "\n{}",
        format!("Found {} result(s)", resolution.records.len()).bold()
    );
    for record in &resolution.records {
        out.push('\n');
        out.push_str(&record_text(record));
    }
    out
}

pub fn record_text(record: &Record) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<14}{}", "Unique ID:", record.unique_id.green().bold());
    let _ = writeln!(out, "{:<14}{}", "Name:", record.name);
    let _ = writeln!(out, "{:<14}{}", "Reference ID:", record.reference_id);
    let _ = writeln!(out, "{:<14}{}", "Source:", record.sheet_source);
    let _ = writeln!(out, "{:<14}{}", "XPath:", record.xpath.cyan());

    match record.versions() {
        Ok(versions) if versions.is_empty() => {}
        Ok(mut versions) => {
            newest_first(&mut versions);
            let _ = writeln!(out, "Versions:");
            for entry in &versions {
                let marker = entry.marker.as_deref().unwrap_or(NOT_AVAILABLE);
                let _ = writeln!(out, "  {:<24}{}", entry.label, marker);
            }
        }
        Err(e) => {
            tracing::warn!(unique_id = %record.unique_id, error = %e, "unreadable version data");
            let _ = writeln!(out, "Versions:     {}", record.version_availability);
        }
    }
    out
}

/// Sort by label, highest version first. Numeric runs compare as numbers, so
/// `Version 3.10` sorts above `Version 3.6`.
fn newest_first(versions: &mut [VersionEntry]) {
    versions.sort_by_cached_key(|entry| {
        Reverse((version_numbers(&entry.label), entry.label.clone()))
    });
}

fn version_numbers(label: &str) -> Vec<u64> {
    label
        .split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .map(|run| run.parse().unwrap_or(u64::MAX))
        .collect()
}

pub fn resolution_json(resolution: &Resolution) -> serde_json::Result<String> {
    serde_json::to_string_pretty(resolution)
}

pub fn sources_text(sources: &[SourceImport]) -> String {
    let mut out = String::new();
    for s in sources {
        let digest = s.sha256.get(..12).unwrap_or(&s.sha256);
        let _ = writeln!(
            out,
            "  {:<28} {:>7} rows  {:>5} skipped  sha256:{}  {}",
            s.sheet_source,
            s.rows,
            s.skipped,
            digest,
            s.imported_at.to_rfc3339()
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use uidmatrix_intent::{Intent, LookupType};
    use uidmatrix_store::{Column, Predicate};

    fn plain() {
        colored::control::set_override(false);
    }

    fn record(versions: &str) -> Record {
        Record {
            sheet_source: "Container XPaths".to_string(),
            unique_id: "MC000001.00001".to_string(),
            name: "MESSAGE".to_string(),
            xpath: "MESSAGE".to_string(),
            reference_id: "MC000001".to_string(),
            version_availability: versions.to_string(),
        }
    }

    #[test]
    fn versions_are_newest_first_with_placeholders() {
        plain();
        let text = record_text(&record(
            r#"{"Version 3.3": "X", "Version 3.4": null, "Version 3.5": "nan", "Version 3.6": "X"}"#,
        ));
        let lines: Vec<&str> = text.lines().skip_while(|l| *l != "Versions:").skip(1).collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].trim_start().starts_with("Version 3.6"));
        assert!(lines[0].ends_with('X'));
        assert!(lines[1].ends_with(NOT_AVAILABLE));
        assert!(lines[2].ends_with(NOT_AVAILABLE));
        assert!(lines[3].trim_start().starts_with("Version 3.3"));
    }

    #[test]
    fn version_order_comes_from_labels_not_columns() {
        plain();
        let text = record_text(&record(
            r#"{"Version 3.6": "X", "Version 3.10": "X", "Version 3.3": null, "Version 3.4": "X"}"#,
        ));
        let labels: Vec<&str> = text
            .lines()
            .skip_while(|l| *l != "Versions:")
            .skip(1)
            .filter_map(|l| l.split_whitespace().nth(1))
            .collect();
        assert_eq!(labels, vec!["3.10", "3.6", "3.4", "3.3"]);
    }

    #[test]
    fn empty_result_says_so() {
        plain();
        let res = Resolution {
            intent: Intent::new(LookupType::ByUniqueId, "ZZ1.1"),
            predicate: Predicate::exact(Column::UniqueId, "ZZ1.1"),
            records: vec![],
        };
        let text = resolution_text(&res);
        assert!(text.contains("Understanding: by_unique_id -> 'ZZ1.1'"));
        assert!(text.contains("No results found."));
    }

    #[test]
    fn json_carries_intent_and_records() {
        let res = Resolution {
            intent: Intent::new(LookupType::ByUniqueId, "MC000001.00001"),
            predicate: Predicate::exact(Column::UniqueId, "MC000001.00001"),
            records: vec![record("{}")],
        };
        let v: serde_json::Value = serde_json::from_str(&resolution_json(&res).unwrap()).unwrap();
        assert_eq!(v["intent"]["search_value"], "MC000001.00001");
        assert_eq!(v["records"][0]["unique_id"], "MC000001.00001");
        assert_eq!(v["predicate"]["value"], "mc000001.00001");
    }
}
