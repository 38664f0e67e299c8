//! Wire contract for buildlens.
//!
//! Everything that crosses a process or network boundary lives here: the raw
//! diagnostics handed over by the host build, the report persisted to disk and
//! served to dashboards, the push-channel messages and the port sidecar.

use anyhow::Result;
use serde::Serialize;

pub mod record;
pub mod report;
pub mod taxonomy;

pub use record::{BuildTrigger, DiagnosticRecord, Location, ModuleRef};
pub use report::{
    BuildStatus, ClassifiedDiagnostic, DiagnosticGroups, PortInfo, PushMessage, Report,
    ServerInfo, UNKNOWN_FILE,
};
pub use taxonomy::{DiagnosticType, Severity};

/// Report file written into the output directory on every cycle.
pub const REPORT_FILE_NAME: &str = "error-report.json";

/// Sidecar recording the live server port; the only file that survives a publish.
pub const PORT_INFO_FILE_NAME: &str = "port-info.json";

/// Dashboard entry document.
pub const DASHBOARD_ENTRY: &str = "index.html";

/// Static dashboard files. Changes to these never trigger a broadcast.
pub const DASHBOARD_ASSETS: &[&str] = &[
    "index.html",
    "spa-main.html",
    "spa-main.js",
    "main.js",
    "main-new.js",
    "styles.css",
    "error-detail.html",
    "error-detail.js",
    "file-detail.html",
    "file-detail.js",
];

#[must_use]
pub fn is_dashboard_asset(file_name: &str) -> bool {
    DASHBOARD_ASSETS.contains(&file_name)
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}

pub fn serialize_json_pretty<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(Into::into)
}
