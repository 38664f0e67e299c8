//! # Buildlens Store
//!
//! Persists the latest [`Report`] and coordinates report generation.
//!
//! ```text
//! BuildTrigger
//!     │  try_begin (Idle → Collecting, or dropped)
//!     ├──> Classifying → Grouping → Assembling   (buildlens-engine)
//!     ├──> Persisting   write-then-rename into the output directory
//!     ├──> Halted       strict mode + blocking errors, caller exits
//!     └──> Publishing   ReportPublisher (live server) notified
//! ```
//!
//! [`Report`]: buildlens_protocol::Report

mod assets;
mod error;
mod pipeline;
mod sidecar;
mod store;

pub use assets::{DashboardAssets, EmbeddedAssets, NoAssets};
pub use error::{Result, StoreError};
pub use pipeline::{
    render_blocking, BlockingPolicy, CycleGuard, CycleOutcome, CycleState, ReportPipeline,
    ReportPublisher, DEFAULT_BLOCKING_MESSAGE,
};
pub use sidecar::{ensure_port_info, port_info_path, read_port_info, write_port_info};
pub use store::ReportStore;
