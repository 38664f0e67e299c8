use serde::{Deserialize, Serialize};

/// Line/column position inside a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    /// Parses the host `"line:col"` / `"line:col-col"` notation.
    #[must_use]
    pub fn parse_loc(raw: &str) -> Option<Self> {
        let (line, rest) = raw.trim().split_once(':')?;
        let column = rest.split(['-', ':']).next()?;
        Some(Self {
            line: line.trim().parse().ok()?,
            column: column.trim().parse().ok()?,
        })
    }
}

/// Module reference attached to a host diagnostic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_sub_entry: Option<bool>,
}

/// One raw diagnostic as emitted by the host build. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticRecord {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<ModuleRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl DiagnosticRecord {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Best available source path, or `None` when the host gave nothing usable.
    #[must_use]
    pub fn resolved_path(&self) -> Option<&str> {
        let module = self.module.as_ref();
        [
            self.file.as_deref(),
            module.and_then(|m| m.resource.as_deref()),
            module.and_then(|m| m.name.as_deref()),
            self.module_identifier.as_deref(),
            self.module_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|p| !p.is_empty())
    }

    #[must_use]
    pub fn is_sub_entry(&self) -> Option<bool> {
        self.module.as_ref().and_then(|m| m.is_sub_entry)
    }
}

/// Completed-build event delivered by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTrigger {
    #[serde(default)]
    pub errors: Vec<DiagnosticRecord>,
    #[serde(default)]
    pub warnings: Vec<DiagnosticRecord>,
}
