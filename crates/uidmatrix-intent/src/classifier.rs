//! Query text → [`Intent`], via an oracle.
//!
//! The classifier makes exactly one oracle call per query. It never retries,
//! never falls back to a default intent, and never answers the question
//! itself: the only outputs are an `Intent` or a [`ClassifyError`].

use crate::extract::extract_json_object;
use crate::oracle::{IntentOracle, OracleError, OracleRequest};
use crate::schema::{Intent, LookupType, WireIntent};
use std::time::Instant;

pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 256;

/// Instruction sent with every query.
pub const INSTRUCTION: &str = r#"You classify lookup queries against the MISMO UniqueID Matrix.
Reply with exactly one JSON object and nothing else: no prose, no markdown, no code fences.

The object has two string fields:
- "lookup_type": one of "by_unique_id", "by_reference_id", "by_xpath"
- "value": the identifier or xpath to look up, copied from the query

Examples:
"Get xpath for ID MC000001.00001" -> {"lookup_type": "by_unique_id", "value": "MC000001.00001"}
"Show all instances of MC000001" -> {"lookup_type": "by_reference_id", "value": "MC000001"}
"Find ID for MESSAGE/DEAL_SETS/DEAL_SET" -> {"lookup_type": "by_xpath", "value": "MESSAGE/DEAL_SETS/DEAL_SET"}

Return only JSON."#;

// Keep error payloads readable in terminals and logs.
const RESPONSE_PREVIEW_CHARS: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("query is empty")]
    EmptyQuery,
    #[error("intent oracle unavailable: {0}")]
    OracleUnavailable(#[from] OracleError),
    #[error("could not understand that query ({reason})")]
    MalformedIntentResponse { reason: String, response: String },
    #[error("could not understand that query (unknown lookup type {lookup_type:?})")]
    InvalidLookupType {
        lookup_type: String,
        response: String,
    },
}

pub struct IntentClassifier<O> {
    oracle: O,
    max_output_tokens: u32,
}

impl<O: IntentOracle> IntentClassifier<O> {
    pub fn new(oracle: O) -> Self {
        Self {
            oracle,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn classify(&self, text: &str) -> Result<Intent, ClassifyError> {
        let query_text = text.trim();
        if query_text.is_empty() {
            return Err(ClassifyError::EmptyQuery);
        }

        let request = OracleRequest {
            instruction: INSTRUCTION.to_string(),
            query_text: query_text.to_string(),
            max_output_tokens: self.max_output_tokens,
        };

        let started = Instant::now();
        let response = self.oracle.complete(&request).map_err(|e| {
            tracing::warn!(oracle = %self.oracle.describe(), error = %e, "oracle call failed");
            ClassifyError::OracleUnavailable(e)
        })?;
        tracing::debug!(
            oracle = %self.oracle.describe(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "oracle replied"
        );

        let intent = parse_intent_response(&response)?;
        tracing::info!(
            lookup_type = %intent.lookup_type,
            value = %intent.search_value,
            "classified query"
        );
        Ok(intent)
    }
}

/// Parse an oracle reply into an [`Intent`].
///
/// The reply may carry fences or commentary around the object; see
/// [`extract_json_object`].
pub fn parse_intent_response(response: &str) -> Result<Intent, ClassifyError> {
    let malformed = |reason: String| ClassifyError::MalformedIntentResponse {
        reason,
        response: preview(response),
    };

    let object = extract_json_object(response)
        .ok_or_else(|| malformed("no JSON object in oracle response".to_string()))?;

    let wire: WireIntent = serde_json::from_str(object)
        .map_err(|e| malformed(format!("invalid intent JSON: {e}")))?;

    let lookup_type: LookupType =
        wire.lookup_type
            .parse()
            .map_err(|_| ClassifyError::InvalidLookupType {
                lookup_type: wire.lookup_type.clone(),
                response: preview(response),
            })?;

    if wire.value.trim().is_empty() {
        return Err(malformed("empty lookup value".to_string()));
    }

    Ok(Intent::new(lookup_type, wire.value))
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(RESPONSE_PREVIEW_CHARS).collect();
    if text.chars().count() > RESPONSE_PREVIEW_CHARS {
        out.push('…');
    }
    out
}
