//! Retrieval: run one predicate, return rows verbatim.

use uidmatrix_store::{Predicate, Record, RecordStore, StoreError};

/// Anything that can answer an exact-match predicate.
///
/// Implementations return rows in natural order with no ranking or limit; an
/// empty vector means "no match", never an error.
pub trait RecordSource {
    fn execute(&self, predicate: &Predicate) -> Result<Vec<Record>, StoreError>;
}

impl RecordSource for RecordStore {
    fn execute(&self, predicate: &Predicate) -> Result<Vec<Record>, StoreError> {
        RecordStore::execute(self, predicate)
    }
}

impl<T: RecordSource + ?Sized> RecordSource for &T {
    fn execute(&self, predicate: &Predicate) -> Result<Vec<Record>, StoreError> {
        (**self).execute(predicate)
    }
}
