//! The closed lookup vocabulary and the shape of a parsed intent.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lookup operations the pipeline can run.
///
/// Adding a variant forces every translator `match` to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupType {
    ByUniqueId,
    ByReferenceId,
    ByXpath,
}

impl LookupType {
    pub const ALL: [LookupType; 3] = [
        LookupType::ByUniqueId,
        LookupType::ByReferenceId,
        LookupType::ByXpath,
    ];

    /// Wire name as emitted by the oracle.
    pub fn as_str(self) -> &'static str {
        match self {
            LookupType::ByUniqueId => "by_unique_id",
            LookupType::ByReferenceId => "by_reference_id",
            LookupType::ByXpath => "by_xpath",
        }
    }
}

impl fmt::Display for LookupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown lookup type {0:?} (expected by_unique_id, by_reference_id or by_xpath)")]
pub struct UnknownLookupType(pub String);

impl FromStr for LookupType {
    type Err = UnknownLookupType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        LookupType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownLookupType(s.to_string()))
    }
}

/// A classified query: what to look up and the raw value to look for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Intent {
    pub lookup_type: LookupType,
    /// As extracted from the query; normalization happens in translation.
    pub search_value: String,
}

impl Intent {
    pub fn new(lookup_type: LookupType, search_value: impl Into<String>) -> Self {
        Self {
            lookup_type,
            search_value: search_value.into(),
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> '{}'", self.lookup_type, self.search_value)
    }
}

/// What the oracle is asked to emit: `{"lookup_type": "...", "value": "..."}`.
///
/// `lookup_type` stays a string here so an out-of-vocabulary value is reported
/// as such instead of as a parse failure.
#[derive(Debug, Clone, Deserialize)]
pub struct WireIntent {
    pub lookup_type: String,
    #[serde(alias = "search_value")]
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_wire_name() {
        for t in LookupType::ALL {
            assert_eq!(t.as_str().parse::<LookupType>().unwrap(), t);
        }
        assert_eq!(
            " BY_XPATH ".parse::<LookupType>().unwrap(),
            LookupType::ByXpath
        );
    }

    #[test]
    fn rejects_out_of_vocabulary_names() {
        for bad in ["by_something_else", "", "unique_id", "by_unique_id_v2"] {
            assert!(bad.parse::<LookupType>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn serializes_with_wire_names() {
        let intent = Intent::new(LookupType::ByReferenceId, "MD000001");
        let v = serde_json::to_value(&intent).unwrap();
        assert_eq!(v["lookup_type"], "by_reference_id");
        assert_eq!(v["search_value"], "MD000001");
        assert_eq!(intent.to_string(), "by_reference_id -> 'MD000001'");
    }

    #[test]
    fn wire_intent_accepts_search_value_alias() {
        let w: WireIntent =
            serde_json::from_str(r#"{"lookup_type":"by_xpath","search_value":"A/B"}"#).unwrap();
        assert_eq!(w.value, "A/B");
    }
}
