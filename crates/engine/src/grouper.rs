use crate::RuleError;
use log::warn;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

/// Bucket for diagnostics that match nothing, including those without a path.
pub const DEFAULT_GROUP: &str = "其他";
pub const COMPONENT_GROUP_PREFIX: &str = "组件-";
pub const PAGE_GROUP_PREFIX: &str = "页面-";

static COMPONENT_SEGMENT: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?:^|/)components/([^/]+)").ok());
static PAGE_SEGMENT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?:^|/)pages/([^/]+)").ok());

/// One include pattern as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawPattern {
    Literal(String),
    Regex {
        pattern: String,
        #[serde(default)]
        flags: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntryRules {
    #[serde(default)]
    include: Option<OneOrMany<RawPattern>>,
}

/// Group rule as written in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGroupRule {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub entry_rules: Option<RawEntryRules>,
    /// Older configs list bare regular expressions here.
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub ignore_sub_entry: bool,
}

impl RawGroupRule {
    fn include_patterns(&self) -> Vec<RawPattern> {
        let mut out = match self.entry_rules.as_ref().and_then(|r| r.include.clone()) {
            Some(OneOrMany::One(pattern)) => vec![pattern],
            Some(OneOrMany::Many(patterns)) => patterns,
            None => Vec::new(),
        };
        out.extend(self.patterns.iter().map(|p| RawPattern::Regex {
            pattern: p.clone(),
            flags: None,
        }));
        out
    }
}

#[derive(Debug, Clone)]
pub enum IncludePattern {
    /// Substring of the normalized path.
    Literal(String),
    Regex(Regex),
}

impl IncludePattern {
    pub fn literal(value: &str) -> Self {
        Self::Literal(normalize_path(value))
    }

    /// Compiles a regular expression with JavaScript-style flags.
    pub fn regex(rule_name: &str, source: &str, flags: &str) -> Result<Self, RuleError> {
        let mut builder = RegexBuilder::new(source);
        for flag in flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'g' | 'u' | 'y' => {}
                other => {
                    return Err(RuleError::UnsupportedFlag {
                        name: rule_name.to_string(),
                        flag: other,
                    })
                }
            }
        }
        builder
            .build()
            .map(Self::Regex)
            .map_err(|err| RuleError::InvalidPattern {
                name: rule_name.to_string(),
                pattern: source.to_string(),
                source: Box::new(err),
            })
    }

    fn compile(rule_name: &str, raw: &RawPattern) -> Result<Self, RuleError> {
        match raw {
            RawPattern::Literal(value) => Ok(Self::literal(value)),
            RawPattern::Regex { pattern, flags } => {
                Self::regex(rule_name, pattern, flags.as_deref().unwrap_or(""))
            }
        }
    }

    fn matches(&self, normalized_path: &str) -> bool {
        match self {
            Self::Literal(needle) => normalized_path.contains(needle.as_str()),
            Self::Regex(regex) => regex.is_match(normalized_path),
        }
    }
}

/// A named bucket and the patterns that route paths into it.
#[derive(Debug, Clone)]
pub struct GroupRule {
    pub name: String,
    pub include_patterns: Vec<IncludePattern>,
    pub ignore_sub_entry: bool,
}

impl GroupRule {
    pub fn new(name: impl Into<String>, include_patterns: Vec<IncludePattern>) -> Self {
        Self {
            name: name.into(),
            include_patterns,
            ignore_sub_entry: false,
        }
    }

    fn compile(index: usize, raw: &RawGroupRule) -> Result<Self, RuleError> {
        let name = raw
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(RuleError::MissingName { index })?;
        let raw_patterns = raw.include_patterns();
        if raw_patterns.is_empty() {
            return Err(RuleError::NoPatterns {
                name: name.to_string(),
            });
        }
        let include_patterns = raw_patterns
            .iter()
            .map(|p| IncludePattern::compile(name, p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: name.to_string(),
            include_patterns,
            ignore_sub_entry: raw.ignore_sub_entry,
        })
    }

    fn matches(&self, normalized_path: &str, sub_entry: Option<bool>) -> bool {
        if self.ignore_sub_entry && sub_entry == Some(false) {
            return false;
        }
        self.include_patterns
            .iter()
            .any(|pattern| pattern.matches(normalized_path))
    }
}

/// Ordered rule list; declaration order is priority order.
#[derive(Debug, Clone, Default)]
pub struct GroupRules {
    rules: Vec<GroupRule>,
}

impl GroupRules {
    pub fn new(rules: Vec<GroupRule>) -> Self {
        Self { rules }
    }

    /// Compiles configured rules, dropping malformed ones with a warning.
    pub fn from_raw(raw: &[RawGroupRule]) -> Self {
        let (rules, rejected) = Self::try_compile(raw);
        for err in rejected {
            warn!("discarding group rule: {err}");
        }
        rules
    }

    /// Like [`GroupRules::from_raw`] but hands the rejected rules back.
    pub fn try_compile(raw: &[RawGroupRule]) -> (Self, Vec<RuleError>) {
        let mut rules = Vec::with_capacity(raw.len());
        let mut rejected = Vec::new();
        for (index, rule) in raw.iter().enumerate() {
            match GroupRule::compile(index, rule) {
                Ok(rule) => rules.push(rule),
                Err(err) => rejected.push(err),
            }
        }
        (Self { rules }, rejected)
    }

    #[must_use]
    pub fn rules(&self) -> &[GroupRule] {
        &self.rules
    }

    #[must_use]
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name.as_str())
    }

    #[must_use]
    pub fn group(&self, path: Option<&str>) -> String {
        self.group_entry(path, None)
    }

    /// Resolves the bucket for `path`; `sub_entry` feeds `ignoreSubEntry` rules.
    #[must_use]
    pub fn group_entry(&self, path: Option<&str>, sub_entry: Option<bool>) -> String {
        let Some(path) = path.map(str::trim).filter(|p| !p.is_empty()) else {
            return DEFAULT_GROUP.to_string();
        };
        let normalized = normalize_path(path);
        self.rules
            .iter()
            .find(|rule| rule.matches(&normalized, sub_entry))
            .map_or_else(|| fallback_group(&normalized), |rule| rule.name.clone())
    }
}

/// Resolves the bucket for `path` against `rules`.
#[must_use]
pub fn group(path: &str, rules: &[GroupRule]) -> String {
    let normalized = normalize_path(path.trim());
    if normalized.is_empty() {
        return DEFAULT_GROUP.to_string();
    }
    rules
        .iter()
        .find(|rule| rule.matches(&normalized, None))
        .map_or_else(|| fallback_group(&normalized), |rule| rule.name.clone())
}

#[must_use]
pub fn normalize_path(raw: &str) -> String {
    raw.replace('\\', "/")
}

fn fallback_group(normalized: &str) -> String {
    if let Some(name) = first_segment_after(&COMPONENT_SEGMENT, normalized) {
        return format!("{COMPONENT_GROUP_PREFIX}{name}");
    }
    if let Some(name) = first_segment_after(&PAGE_SEGMENT, normalized) {
        return format!("{PAGE_GROUP_PREFIX}{name}");
    }
    DEFAULT_GROUP.to_string()
}

fn first_segment_after<'a>(regex: &Lazy<Option<Regex>>, path: &'a str) -> Option<&'a str> {
    let regex = regex.as_ref()?;
    Some(regex.captures(path)?.get(1)?.as_str())
}
