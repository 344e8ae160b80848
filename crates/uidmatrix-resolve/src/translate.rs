//! Intent → exact-match [`Predicate`].

use uidmatrix_intent::{Intent, LookupType};
use uidmatrix_store::{normalize_xpath, Column, Predicate};

/// The translator refused to build a predicate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported intent {lookup_type} -> {value:?}: {reason}")]
pub struct UnsupportedIntent {
    pub lookup_type: String,
    pub value: String,
    pub reason: &'static str,
}

pub fn column_for(lookup_type: LookupType) -> Column {
    match lookup_type {
        LookupType::ByUniqueId => Column::UniqueId,
        LookupType::ByReferenceId => Column::ReferenceId,
        LookupType::ByXpath => Column::Xpath,
    }
}

/// Build the predicate for `intent`.
///
/// Values are trimmed and case-folded; xpaths also lose leading and trailing
/// slashes. A value that normalizes to nothing is rejected.
pub fn translate(intent: &Intent) -> Result<Predicate, UnsupportedIntent> {
    let trimmed = intent.search_value.trim();
    let value = match intent.lookup_type {
        LookupType::ByXpath => normalize_xpath(trimmed),
        LookupType::ByUniqueId | LookupType::ByReferenceId => trimmed.to_string(),
    };

    if value.is_empty() {
        return Err(UnsupportedIntent {
            lookup_type: intent.lookup_type.to_string(),
            value: intent.search_value.clone(),
            reason: "value is empty after normalization",
        });
    }

    Ok(Predicate::exact(column_for(intent.lookup_type), &value))
}

/// Translate from the wire form, where the lookup type is still a string.
pub fn translate_raw(lookup_type: &str, value: &str) -> Result<Predicate, UnsupportedIntent> {
    let parsed: LookupType = lookup_type.parse().map_err(|_| UnsupportedIntent {
        lookup_type: lookup_type.to_string(),
        value: value.to_string(),
        reason: "lookup type is not one of by_unique_id, by_reference_id, by_xpath",
    })?;
    translate(&Intent::new(parsed, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xpath(v: &str) -> Result<Predicate, UnsupportedIntent> {
        translate(&Intent::new(LookupType::ByXpath, v))
    }

    #[test]
    fn maps_each_lookup_type_to_its_column() {
        let p = translate(&Intent::new(LookupType::ByUniqueId, " MC000001.00001 ")).unwrap();
        assert_eq!(p.column(), Column::UniqueId);
        assert_eq!(p.value(), "mc000001.00001");

        let p = translate(&Intent::new(LookupType::ByReferenceId, "MD000001")).unwrap();
        assert_eq!(p.column(), Column::ReferenceId);
        assert_eq!(p.value(), "md000001");

        let p = xpath("//MESSAGE/ABOUT_VERSIONS/ABOUT_VERSION/").unwrap();
        assert_eq!(p.column(), Column::Xpath);
        assert_eq!(p.value(), "message/about_versions/about_version");
    }

    #[test]
    fn slash_placement_does_not_matter() {
        let forms = ["X/Y", "/X/Y", "X/Y/", "//X/Y/", "  /X/Y  "];
        let expected = xpath("X/Y").unwrap();
        for form in forms {
            assert_eq!(xpath(form).unwrap(), expected, "{form}");
        }
    }

    #[test]
    fn empty_after_normalization_is_unsupported() {
        for v in ["//", "/", "   ", " / / "] {
            let err = xpath(v).unwrap_err();
            assert_eq!(err.lookup_type, "by_xpath");
        }
        assert!(translate(&Intent::new(LookupType::ByUniqueId, "  ")).is_err());
    }

    #[test]
    fn raw_lookup_type_outside_vocabulary_is_unsupported() {
        let err = translate_raw("by_something_else", "X").unwrap_err();
        assert_eq!(err.lookup_type, "by_something_else");
        assert!(translate_raw("by_reference_id", "MD000001").is_ok());
    }
}
