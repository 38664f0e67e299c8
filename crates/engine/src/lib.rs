//! # Buildlens Engine
//!
//! Turns the raw diagnostics of one build cycle into a grouped [`Report`].
//!
//! ## Pipeline
//!
//! ```text
//! errors / warnings (DiagnosticRecord)
//!     │
//!     ├──> Classifier (ordered rule table, first match wins)
//!     │      └─> taxonomy code + remediation, category counts
//!     │
//!     ├──> Type filters (includes, then excludes)
//!     │
//!     ├──> Grouper (configured path rules, then components/pages heuristics)
//!     │      └─> named buckets
//!     │
//!     └──> Assembler
//!            └─> Report + blocking diagnostics
//! ```
//!
//! Everything here is synchronous and infallible: malformed group rules are
//! dropped when compiled, and a classifier rule that cannot compile simply never
//! matches.
//!
//! [`Report`]: buildlens_protocol::Report

mod assembler;
mod classifier;
mod counts;
mod error;
mod grouper;

pub use assembler::{
    assemble, Assembler, Assembly, ClassifiedBatch, GroupedBatch, PendingDiagnostic,
    SeverityFilters, TypeFilter, DEFAULT_BLOCKING,
};
pub use classifier::{
    classify, extract_location, Classification, ClassificationRule, Classifier, Predicate,
};
pub use counts::CategoryCounts;
pub use error::RuleError;
pub use grouper::{
    group, normalize_path, GroupRule, GroupRules, IncludePattern, RawEntryRules, RawGroupRule,
    RawPattern, COMPONENT_GROUP_PREFIX, DEFAULT_GROUP, PAGE_GROUP_PREFIX,
};
