//! Oracle interface: the only place a language model is consulted.
//!
//! An oracle turns `{instruction, query_text}` into free-form text that is
//! expected to contain one JSON object. It never sees the record store and its
//! output is never shown to the user as an answer.

mod offline;
pub mod providers;

pub use offline::OfflineOracle;
pub use providers::{build_oracle, Backend, ConfigError, OracleConfig};

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

// ============================================================================
// Interface
// ============================================================================

/// Request sent to an oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleRequest {
    /// System-level instruction constraining the output format.
    pub instruction: String,
    /// The user's query, untouched apart from trimming.
    pub query_text: String,
    pub max_output_tokens: u32,
}

/// Why an oracle call produced no usable text.
///
/// Every variant is an infrastructure failure; callers may retry the whole
/// invocation but the classifier never does.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("oracle call timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("failed to reach {endpoint}: {message}")]
    Network { endpoint: String, message: String },
    #[error("oracle rejected credentials (http {status}); check the API key")]
    Auth { status: u16 },
    #[error("oracle rate limited the request{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("oracle http error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("oracle returned no text ({0})")]
    EmptyResponse(String),
    #[error("oracle not configured: {0}")]
    NotConfigured(String),
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(", retry after {secs}s"),
        None => String::new(),
    }
}

/// A language-understanding service used strictly for intent extraction.
pub trait IntentOracle: Send + Sync {
    fn complete(&self, request: &OracleRequest) -> Result<String, OracleError>;

    /// Short label for logs and status output, e.g. `anthropic(claude-haiku-4-5)`.
    fn describe(&self) -> String;
}

impl<T: IntentOracle + ?Sized> IntentOracle for Box<T> {
    fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        (**self).complete(request)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<T: IntentOracle + ?Sized> IntentOracle for &T {
    fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        (**self).complete(request)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

// ============================================================================
// Scripted oracle (tests, demos)
// ============================================================================

/// Replays queued replies in order and records every request it receives.
///
/// Once the script runs out it reports [`OracleError::NotConfigured`].
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<Result<String, OracleError>>>,
    requests: Mutex<Vec<OracleRequest>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Oracle with a single queued reply.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::new().then_reply(text)
    }

    pub fn then_reply(self, text: impl Into<String>) -> Self {
        self.replies.lock().push_back(Ok(text.into()));
        self
    }

    pub fn then_fail(self, error: OracleError) -> Self {
        self.replies.lock().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl IntentOracle for ScriptedOracle {
    fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        self.requests.lock().push(request.clone());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::NotConfigured("script exhausted".to_string())))
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}
