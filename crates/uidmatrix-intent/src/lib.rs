//! Intent classification for UniqueID Matrix queries.
//!
//! ```text
//!   "Get xpath for ID MC000001.00001"
//!                 │
//!                 ▼
//!   ┌──────────────────────────┐   {instruction, query_text}   ┌────────────┐
//!   │     IntentClassifier     │ ────────────────────────────▶ │   Oracle   │
//!   │                          │ ◀──────────────────────────── │ (LLM, ...) │
//!   └──────────────────────────┘       free-form text          └────────────┘
//!                 │  extract_json_object → WireIntent → LookupType
//!                 ▼
//!   Intent { by_unique_id, "MC000001.00001" }
//! ```
//!
//! The oracle is consulted for intent only. Its text is never returned to the
//! user; answers always come from the record store.

pub mod classifier;
pub mod extract;
pub mod oracle;
pub mod schema;

pub use classifier::{parse_intent_response, ClassifyError, IntentClassifier, INSTRUCTION};
pub use extract::extract_json_object;
pub use oracle::providers::ConfigOverrides;
pub use oracle::{
    build_oracle, Backend, ConfigError, IntentOracle, OfflineOracle, OracleConfig, OracleError,
    OracleRequest, ScriptedOracle,
};
pub use schema::{Intent, LookupType, UnknownLookupType, WireIntent};
