//! classify → translate → execute.

use crate::error::ResolveError;
use crate::execute::RecordSource;
use crate::translate::translate;
use serde::Serialize;
use std::path::Path;
use uidmatrix_intent::{Intent, IntentClassifier, IntentOracle};
use uidmatrix_store::{Predicate, Record, RecordStore};

/// Outcome of one query. `records` may be empty; that is a valid answer.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub intent: Intent,
    pub predicate: Predicate,
    pub records: Vec<Record>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Open the store for querying, reporting any failure as `StoreUnavailable`.
pub fn open_store(path: impl AsRef<Path>) -> Result<RecordStore, ResolveError> {
    RecordStore::open(path).map_err(ResolveError::from)
}

/// Translate and execute an already-known intent. No oracle involved.
pub fn lookup<S: RecordSource>(source: &S, intent: Intent) -> Result<Resolution, ResolveError> {
    let predicate = translate(&intent)?;
    let records = source.execute(&predicate).map_err(ResolveError::from)?;
    tracing::info!(
        lookup_type = %intent.lookup_type,
        column = %predicate.column(),
        matches = records.len(),
        "lookup complete"
    );
    Ok(Resolution {
        intent,
        predicate,
        records,
    })
}

/// The full natural-language pipeline over one record source.
pub struct Resolver<O, S> {
    classifier: IntentClassifier<O>,
    source: S,
}

impl<O: IntentOracle, S: RecordSource> Resolver<O, S> {
    pub fn new(classifier: IntentClassifier<O>, source: S) -> Self {
        Self { classifier, source }
    }

    pub fn classifier(&self) -> &IntentClassifier<O> {
        &self.classifier
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Resolve a natural-language query.
    ///
    /// Classifier and translator failures propagate as-is and no query runs.
    pub fn resolve(&self, text: &str) -> Result<Resolution, ResolveError> {
        let intent = self.classifier.classify(text)?;
        lookup(&self.source, intent)
    }
}
