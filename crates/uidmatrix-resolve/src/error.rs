use crate::translate::UnsupportedIntent;
use std::path::PathBuf;
use uidmatrix_intent::{ClassifyError, OracleError};
use uidmatrix_store::StoreError;

/// Every way a query can fail. "No match" is not here: it is an empty result.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("intent oracle unavailable: {0}")]
    OracleUnavailable(#[source] OracleError),

    #[error("could not understand that query ({reason})")]
    MalformedIntentResponse { reason: String, response: String },

    #[error("could not understand that query (unknown lookup type {lookup_type:?})")]
    InvalidLookupType { lookup_type: String },

    #[error(transparent)]
    UnsupportedIntent(#[from] UnsupportedIntent),

    #[error("record store unavailable at {}: {reason}; run `uidmatrix setup <XLSX|CSV>...` to build it", .path.display())]
    StoreUnavailable { path: PathBuf, reason: String },

    #[error("record store query failed: {0}")]
    Query(#[source] StoreError),
}

impl ResolveError {
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, ResolveError::StoreUnavailable { .. })
    }

    /// The query itself was the problem; rephrasing may help.
    pub fn is_not_understood(&self) -> bool {
        matches!(
            self,
            ResolveError::MalformedIntentResponse { .. }
                | ResolveError::InvalidLookupType { .. }
                | ResolveError::UnsupportedIntent(_)
        )
    }
}

impl From<ClassifyError> for ResolveError {
    fn from(e: ClassifyError) -> Self {
        match e {
            ClassifyError::EmptyQuery => ResolveError::EmptyQuery,
            ClassifyError::OracleUnavailable(e) => ResolveError::OracleUnavailable(e),
            ClassifyError::MalformedIntentResponse { reason, response } => {
                ResolveError::MalformedIntentResponse { reason, response }
            }
            ClassifyError::InvalidLookupType { lookup_type, .. } => {
                ResolveError::InvalidLookupType { lookup_type }
            }
        }
    }
}

impl From<StoreError> for ResolveError {
    fn from(e: StoreError) -> Self {
        let path = match &e {
            StoreError::Missing { path }
            | StoreError::Open { path, .. }
            | StoreError::NotInitialized { path } => Some(path.clone()),
            StoreError::Sqlite(_) | StoreError::Io { .. } => None,
        };
        match path {
            Some(path) => ResolveError::StoreUnavailable {
                path,
                reason: e.to_string(),
            },
            None => ResolveError::Query(e),
        }
    }
}
