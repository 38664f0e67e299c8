use crate::{DiagnosticType, Location, Severity};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Placeholder written to `filePath` when the host gave no usable path.
pub const UNKNOWN_FILE: &str = "未知文件";

/// Group name → diagnostics, in first-seen order.
pub type DiagnosticGroups = IndexMap<String, Vec<ClassifiedDiagnostic>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedDiagnostic {
    pub id: u64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(rename = "type")]
    pub kind: DiagnosticType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

/// Complete snapshot of one build cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub timestamp: DateTime<Utc>,
    pub build_status: BuildStatus,
    pub errors: DiagnosticGroups,
    pub warnings: DiagnosticGroups,
}

impl Report {
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warnings.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn groups(&self, severity: Severity) -> &DiagnosticGroups {
        match severity {
            Severity::Error => &self.errors,
            Severity::Warning => &self.warnings,
        }
    }
}

/// Server → client push-channel message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PushMessage {
    ReportUpdate {
        data: Report,
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
    },
}

impl PushMessage {
    #[must_use]
    pub fn report_update(report: Report) -> Self {
        Self::ReportUpdate {
            data: report,
            timestamp: Utc::now(),
        }
    }
}

/// Contents of the port sidecar file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    pub port: Option<u16>,
}

/// Body of the metadata route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub port: u16,
}
