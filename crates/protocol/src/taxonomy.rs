use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity channel a diagnostic was emitted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }
}

/// Closed classification taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticType {
    StyleError,
    TemplateError,
    SyntaxError,
    JsonError,
    ConfigError,
    EnvironmentError,
    BuildError,
    ResolutionError,
    ModuleNotFound,
    EslintError,
    #[serde(alias = "TSError")]
    TsTypeError,
    #[serde(alias = "LackOfLoader")]
    LackOfLoader,
    Unknown,
}

impl DiagnosticType {
    /// Every variant, in the order operator summaries list them.
    pub const ALL: [Self; 13] = [
        Self::StyleError,
        Self::TemplateError,
        Self::SyntaxError,
        Self::JsonError,
        Self::ConfigError,
        Self::EnvironmentError,
        Self::BuildError,
        Self::ResolutionError,
        Self::ModuleNotFound,
        Self::EslintError,
        Self::TsTypeError,
        Self::LackOfLoader,
        Self::Unknown,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StyleError => "styleError",
            Self::TemplateError => "templateError",
            Self::SyntaxError => "syntaxError",
            Self::JsonError => "jsonError",
            Self::ConfigError => "configError",
            Self::EnvironmentError => "environmentError",
            Self::BuildError => "buildError",
            Self::ResolutionError => "resolutionError",
            Self::ModuleNotFound => "moduleNotFound",
            Self::EslintError => "eslintError",
            Self::TsTypeError => "tsTypeError",
            Self::LackOfLoader => "lackOfLoader",
            Self::Unknown => "unknown",
        }
    }

    /// Counter key shown to the operator and on the dashboard.
    #[must_use]
    pub const fn category_label(self) -> &'static str {
        match self {
            Self::StyleError => "样式错误",
            Self::TemplateError => "模板错误",
            Self::SyntaxError => "语法错误",
            Self::JsonError => "JSON配置错误",
            Self::ConfigError => "配置错误",
            Self::EnvironmentError => "环境错误",
            Self::BuildError => "编译错误",
            Self::ResolutionError => "依赖解析错误",
            Self::ModuleNotFound => "资源加载错误",
            Self::EslintError => "eslint错误",
            Self::TsTypeError => "TS类型错误",
            Self::LackOfLoader => "缺少loader",
            Self::Unknown => "未知错误",
        }
    }

    #[must_use]
    pub const fn default_remediation(self) -> Option<&'static str> {
        let text = match self {
            Self::StyleError => {
                "Check the stylesheet at the reported line: selector syntax, imports and preprocessor directives."
            }
            Self::TemplateError => {
                "Fix the template expression or directive; only one expression is allowed per binding."
            }
            Self::SyntaxError => {
                "Fix the syntax error at the reported location; the module could not be parsed."
            }
            Self::JsonError => "Validate the JSON configuration block of the page or component.",
            Self::ConfigError => {
                "The build configuration is invalid; compare the reported option against the tool's schema."
            }
            Self::EnvironmentError => {
                "The build environment is unhealthy (runtime version, memory, file handles or permissions)."
            }
            Self::BuildError => {
                "A framework compile step rejected the module; check output paths and subpackage declarations."
            }
            Self::ResolutionError => {
                "An import binding or dependency could not be resolved; check export names and dependency versions."
            }
            Self::ModuleNotFound => {
                "The referenced module or resource does not exist; check the path and installed packages."
            }
            Self::EslintError => "Fix the lint violation or adjust the lint rule configuration.",
            Self::TsTypeError => "Resolve the TypeScript type error reported by the checker.",
            Self::LackOfLoader => {
                "No loader handles this file type; add a matching rule to the module rules."
            }
            Self::Unknown => return None,
        };
        Some(text)
    }

    #[must_use]
    pub const fn document(self) -> Option<&'static str> {
        match self {
            Self::EslintError => Some("https://eslint.org/docs/latest/rules/"),
            Self::TsTypeError => Some("https://www.typescriptlang.org/docs/handbook/2/everyday-types.html"),
            Self::LackOfLoader => Some("https://webpack.js.org/concepts/loaders/"),
            Self::ModuleNotFound | Self::ResolutionError => {
                Some("https://webpack.js.org/configuration/resolve/")
            }
            Self::ConfigError => Some("https://webpack.js.org/configuration/"),
            _ => None,
        }
    }
}

impl fmt::Display for DiagnosticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_names_match_as_str() {
        for kind in DiagnosticType::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn category_labels_are_unique() {
        let mut labels: Vec<_> = DiagnosticType::ALL
            .iter()
            .map(|k| k.category_label())
            .collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), DiagnosticType::ALL.len());
    }

    #[test]
    fn legacy_plugin_names_deserialize() {
        let kinds: Vec<DiagnosticType> =
            serde_json::from_str(r#"["TSError", "LackOfLoader", "tsTypeError"]"#).unwrap();
        assert_eq!(
            kinds,
            [
                DiagnosticType::TsTypeError,
                DiagnosticType::LackOfLoader,
                DiagnosticType::TsTypeError
            ]
        );
        assert_eq!(
            serde_json::to_string(&DiagnosticType::LackOfLoader).unwrap(),
            "\"lackOfLoader\""
        );
    }
}
