//! uidmatrix resolver
//!
//! ```text
//!   text ──► IntentClassifier ──► Intent ──► translate ──► Predicate
//!                                                              │
//!   Resolution { intent, predicate, records } ◄── RecordSource ┘
//! ```
//!
//! Failures stop the pipeline where they happen: a query that cannot be
//! classified or translated never reaches the store.

pub mod error;
pub mod execute;
pub mod pipeline;
pub mod translate;


pub use error::ResolveError;
pub use execute::RecordSource;
pub use pipeline::{lookup, open_store, Resolution, Resolver};
pub use translate::{column_for, translate, translate_raw, UnsupportedIntent};
