use crate::CategoryCounts;
use buildlens_protocol::{DiagnosticRecord, DiagnosticType, Location};
use log::warn;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;

/// How a rule inspects a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Substring of the lowercased message.
    Contains(String),
    /// Case-insensitive regular expression over the message.
    Pattern(String),
    /// Substring of the lowercased stack trace.
    StackContains(String),
}

/// One entry of the ordered classification table.
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    pub name: String,
    pub predicate: Predicate,
    pub kind: DiagnosticType,
    pub remediation: Option<String>,
    pub hint: Option<String>,
}

impl ClassificationRule {
    pub fn new(name: impl Into<String>, predicate: Predicate, kind: DiagnosticType) -> Self {
        Self {
            name: name.into(),
            predicate,
            kind,
            remediation: None,
            hint: None,
        }
    }

    #[must_use]
    pub fn remediation(mut self, text: impl Into<String>) -> Self {
        self.remediation = Some(text.into());
        self
    }

    #[must_use]
    pub fn hint(mut self, text: impl Into<String>) -> Self {
        self.hint = Some(text.into());
        self
    }
}

/// Result of classifying one diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: DiagnosticType,
    pub type_desc: Option<String>,
    pub hint: Option<String>,
    pub document: Option<String>,
    /// Name of the rule that matched; `None` for the `unknown` fallback.
    pub rule: Option<String>,
}

impl Classification {
    fn unknown() -> Self {
        Self {
            kind: DiagnosticType::Unknown,
            type_desc: None,
            hint: None,
            document: None,
            rule: None,
        }
    }
}

#[derive(Debug)]
enum Matcher {
    Contains(String),
    Pattern(Regex),
    StackContains(String),
    Disabled,
}

#[derive(Debug)]
struct CompiledRule {
    rule: ClassificationRule,
    matcher: Matcher,
}

impl CompiledRule {
    fn compile(rule: ClassificationRule) -> Self {
        let matcher = match &rule.predicate {
            Predicate::Contains(needle) => Matcher::Contains(needle.to_lowercase()),
            Predicate::StackContains(needle) => Matcher::StackContains(needle.to_lowercase()),
            Predicate::Pattern(source) => match RegexBuilder::new(source)
                .case_insensitive(true)
                .build()
            {
                Ok(regex) => Matcher::Pattern(regex),
                Err(err) => {
                    warn!("classifier rule '{}' disabled: {err}", rule.name);
                    Matcher::Disabled
                }
            },
        };
        Self { rule, matcher }
    }

    fn matches(&self, subject: &Subject<'_>) -> bool {
        match &self.matcher {
            Matcher::Contains(needle) => subject.message_lower.contains(needle.as_str()),
            Matcher::Pattern(regex) => regex.is_match(subject.message),
            Matcher::StackContains(needle) => subject
                .stack_lower
                .as_deref()
                .is_some_and(|stack| stack.contains(needle.as_str())),
            Matcher::Disabled => false,
        }
    }
}

struct Subject<'a> {
    message: &'a str,
    message_lower: String,
    stack_lower: Option<String>,
}

/// Ordered rule table evaluated top to bottom; the first match wins.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Arc<Vec<CompiledRule>>,
}

static BUILTIN: Lazy<Classifier> = Lazy::new(|| Classifier::new(builtin_rules()));

impl Default for Classifier {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Classifier {
    pub fn new(rules: Vec<ClassificationRule>) -> Self {
        Self {
            rules: Arc::new(rules.into_iter().map(CompiledRule::compile).collect()),
        }
    }

    /// Shared instance of the built-in table.
    #[must_use]
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Classifies `record` and bumps its category in `counts`. Never fails.
    pub fn classify(
        &self,
        record: &DiagnosticRecord,
        counts: &mut CategoryCounts,
    ) -> Classification {
        let classification = self.evaluate(record);
        counts.record(classification.kind);
        classification
    }

    fn evaluate(&self, record: &DiagnosticRecord) -> Classification {
        let subject = Subject {
            message: &record.message,
            message_lower: record.message.to_lowercase(),
            stack_lower: record.stack.as_deref().map(str::to_lowercase),
        };

        let Some(hit) = self.rules.iter().find(|rule| rule.matches(&subject)) else {
            return Classification::unknown();
        };
        let kind = hit.rule.kind;
        Classification {
            kind,
            type_desc: hit
                .rule
                .remediation
                .clone()
                .or_else(|| kind.default_remediation().map(str::to_string)),
            hint: hit.rule.hint.clone(),
            document: kind.document().map(str::to_string),
            rule: Some(hit.rule.name.clone()),
        }
    }
}

/// Classifies with the built-in table.
pub fn classify(record: &DiagnosticRecord, counts: &mut CategoryCounts) -> Classification {
    BUILTIN.classify(record, counts)
}

static MESSAGE_LOCATION: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\((\d+):(\d+)\)").ok());

/// `(line:col)` embedded in the message, else the structured location, else `loc`.
#[must_use]
pub fn extract_location(record: &DiagnosticRecord) -> Option<Location> {
    let from_message = MESSAGE_LOCATION.as_ref().and_then(|regex| {
        let caps = regex.captures(&record.message)?;
        Some(Location {
            line: caps.get(1)?.as_str().parse().ok()?,
            column: caps.get(2)?.as_str().parse().ok()?,
        })
    });
    from_message
        .or(record.location)
        .or_else(|| record.loc.as_deref().and_then(Location::parse_loc))
}

fn contains(name: &str, needle: &str, kind: DiagnosticType) -> ClassificationRule {
    ClassificationRule::new(name, Predicate::Contains(needle.to_string()), kind)
}

fn pattern(name: &str, source: &str, kind: DiagnosticType) -> ClassificationRule {
    ClassificationRule::new(name, Predicate::Pattern(source.to_string()), kind)
}

fn stack(name: &str, needle: &str, kind: DiagnosticType) -> ClassificationRule {
    ClassificationRule::new(name, Predicate::StackContains(needle.to_string()), kind)
}

// Narrow, tool-specific markers come first; broad heuristics (code frames,
// "not found") come last so they cannot swallow a more specific diagnostic.
#[allow(clippy::too_many_lines)]
fn builtin_rules() -> Vec<ClassificationRule> {
    use DiagnosticType::{
        BuildError, ConfigError, EnvironmentError, EslintError, JsonError, LackOfLoader,
        ModuleNotFound, ResolutionError, StyleError, SyntaxError, TemplateError, TsTypeError,
    };

    vec![
        contains("env.heap", "javascript heap out of memory", EnvironmentError)
            .hint("Raise --max-old-space-size for the build process."),
        contains("env.watchers", "enospc", EnvironmentError)
            .hint("The file watcher limit was reached; raise fs.inotify.max_user_watches."),
        contains("env.open-files", "emfile: too many open files", EnvironmentError),
        contains("env.permissions", "eacces: permission denied", EnvironmentError),
        contains("env.openssl", "err_ossl_evp_unsupported", EnvironmentError)
            .hint("Use a bundler release that supports the installed Node.js OpenSSL."),
        contains("env.browserslist", "caniuse-lite is outdated", EnvironmentError),
        pattern(
            "env.engine",
            r#"the\s+engine\s+"node"\s+is\s+incompatible"#,
            EnvironmentError,
        ),
        contains("style.compiler-tag", "[style compiler]", StyleError),
        contains("style.uri", "unable to find uri in", StyleError),
        contains("style.elif", "elif without a preceding if", StyleError),
        contains(
            "style.nested-rules",
            "rules are not allowed here and will not be processed",
            StyleError,
        ),
        pattern(
            "style.loader-failure",
            r"module\s+(?:build\s+failed|error)\s+\(from\s+.*?\b(?:stylus|sass|less|css)-loader\b.*?\):",
            StyleError,
        ),
        pattern(
            "style.line-report",
            r"line\s+\d+:\s+[\s\S]+?\.(?:styl|sass|scss|less|css).*?(?:error|warning)",
            StyleError,
        ),
        contains("template.compiler-tag", "[template compiler]", TemplateError),
        contains(
            "template.expression-parser",
            "[mpx dynamic expression parser error]",
            TemplateError,
        ),
        contains(
            "template.unsupported-grammar",
            "grammar is not supported in the template",
            TemplateError,
        ),
        contains(
            "template.single-expression",
            "only support one expression in the template",
            TemplateError,
        ),
        contains("template.option-chain", "[optionchain] option", TemplateError),
        contains("json.compiler-tag", "[json compiler]", JsonError),
        contains("json.processor-tag", "[json processor]", JsonError),
        contains("config.invalid-object", "invalid configuration object", ConfigError),
        contains(
            "config.unknown-property",
            "configuration has an unknown property",
            ConfigError,
        ),
        contains("config.invalid-options", "invalid options object", ConfigError),
        contains(
            "config.unknown-option",
            "options has an unknown property",
            ConfigError,
        ),
        pattern(
            "config.schema",
            r"configuration\.[\w.\[\]]+\s+should\s+be",
            ConfigError,
        ),
        contains(
            "framework.script-setup",
            "[@mpxjs/webpack-plugin script-setup-compiler]",
            BuildError,
        ),
        contains("framework.plugin-loader", "[plugin loader][", BuildError),
        contains("framework.mpx-loader", "[mpx-loader]", BuildError),
        contains("framework.native-loader", "[native-loader][", BuildError),
        contains(
            "framework.output-conflict",
            "] is registered with a conflict outputpath [",
            BuildError,
        ),
        pattern(
            "framework.output-registered",
            r"registered\s+with\s+(?:conflicted\s+)?outputpath",
            BuildError,
        ),
        contains(
            "framework.extract-missing-filename",
            "get extracted file error: missing filename!",
            BuildError,
        ),
        contains(
            "framework.subpackage-root",
            "need to declare subpackage name by root",
            BuildError,
        ),
        contains("framework.same-index", "] is filled with same index [", BuildError),
        contains("framework.subpackage-async", "通过分包异步声明", BuildError),
        contains("framework.subpackage-split", "会分别输出到两个分包中", BuildError)
            .hint("Add the module to subpackageModulesRules so it is emitted once."),
        contains(
            "framework.subpackage-rules",
            "加入到subpackagemodulesrules来解决这个问题！",
            BuildError,
        ),
        contains(
            "framework.loader-options",
            "loader options must be string or object",
            BuildError,
        ),
        contains(
            "loader.appropriate",
            "you may need an appropriate loader",
            LackOfLoader,
        ),
        contains("loader.additional", "you may need an additional loader", LackOfLoader),
        pattern("eslint.tag", r"eslinterror|\[eslint\]", EslintError),
        pattern("ts.code", r"\bts\d{4,5}\b", TsTypeError),
        contains(
            "syntax.function-paren",
            "expected opening parenthesis after function",
            SyntaxError,
        ),
        contains("syntax.closing-paren", "expected closing parenthesis", SyntaxError),
        contains("syntax.script-tag", "[script compiler]", SyntaxError),
        pattern(
            "syntax.generic",
            r"module\s+parse\s+failed|module\s+build\s+failed|syntaxerror|unexpected\s+token|missing\s*[\]\})]|unterminated\s+(?:string|regex)|(?:expression|statement)\s+expected|invalid\s+expression|hookwebpackerror|parseerror|(?:\d+\|.*){3}",
            SyntaxError,
        ),
        pattern(
            "resolution.export",
            r"export\s+'[^']+'\s+(?:\(.*?\)\s+)?was\s+not\s+found\s+in",
            ResolutionError,
        )
        .hint("The imported binding is not exported by the target module."),
        contains(
            "resolution.dependency-tree",
            "unable to resolve dependency tree",
            ResolutionError,
        ),
        contains(
            "resolution.dependency",
            "could not resolve dependency",
            ResolutionError,
        ),
        contains(
            "resolution.peer",
            "conflicting peer dependency",
            ResolutionError,
        ),
        contains("module.not-found", "module not found", ModuleNotFound),
        contains("module.cant-resolve", "can't resolve", ModuleNotFound),
        contains("module.cannot-find", "cannot find module", ModuleNotFound),
        contains(
            "module.not-a-resource",
            "is not a page/component/static resource",
            ModuleNotFound,
        ),
        contains(
            "module.outside-pages",
            "is not in current pages directory",
            ModuleNotFound,
        ),
        pattern("module.was-not-found", r"was\s+not\s+found", ModuleNotFound),
        contains(
            "framework.expr-arguments",
            "function arguments must be numbers",
            BuildError,
        ),
        contains("framework.expr-function", "unknown function:", BuildError),
        contains("framework.expr-operator", "unknown operator:", BuildError),
        stack("framework.stack", "@mpxjs/webpack-plugin", BuildError)
            .hint("Raised inside the framework plugin; the stack shows the failing compile step."),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(message: &str) -> DiagnosticType {
        classify(&DiagnosticRecord::new(message), &mut CategoryCounts::new()).kind
    }

    #[test]
    fn style_compiler_tag_is_style_error() {
        assert_eq!(
            kind_of("[style compiler][a.scss]: bad selector"),
            DiagnosticType::StyleError
        );
    }

    #[test]
    fn module_not_found_is_detected() {
        assert_eq!(
            kind_of("Module not found: Error: Can't resolve './x'"),
            DiagnosticType::ModuleNotFound
        );
    }

    #[test]
    fn narrow_tags_beat_generic_heuristics() {
        // The code frame would trip the generic syntax heuristic.
        let message = "[json compiler]: Unexpected token }\n 1| {\n 2|   \"a\": 1,\n 3| }";
        assert_eq!(kind_of(message), DiagnosticType::JsonError);

        let message = "Module parse failed: Unexpected token (1:0)\nYou may need an appropriate loader to handle this file type.";
        assert_eq!(kind_of(message), DiagnosticType::LackOfLoader);

        let message = "export 'foo' (imported as 'foo') was not found in './bar'";
        assert_eq!(kind_of(message), DiagnosticType::ResolutionError);
    }

    #[test]
    fn lint_and_type_errors_are_recognised() {
        assert_eq!(
            kind_of("ESLintError: [eslint] src/a.js\n  3:1  error  no-undef"),
            DiagnosticType::EslintError
        );
        assert_eq!(
            kind_of("TS2322: Type 'string' is not assignable to type 'number'."),
            DiagnosticType::TsTypeError
        );
    }

    #[test]
    fn stack_marks_framework_failures() {
        let record = DiagnosticRecord::new("something odd happened")
            .with_stack("Error\n    at compile (node_modules/@mpxjs/webpack-plugin/lib/index.js:10:3)");
        let result = classify(&record, &mut CategoryCounts::new());
        assert_eq!(result.kind, DiagnosticType::BuildError);
        assert_eq!(result.rule.as_deref(), Some("framework.stack"));
        assert!(result.hint.is_some());
    }

    #[test]
    fn unmatched_input_is_unknown_without_remediation() {
        let result = classify(&DiagnosticRecord::new(""), &mut CategoryCounts::new());
        assert_eq!(result, Classification::unknown());
        assert_eq!(kind_of("ok 🙂 \u{0}\u{7f}"), DiagnosticType::Unknown);
    }

    #[test]
    fn matched_rule_carries_remediation_and_document() {
        let result = classify(
            &DiagnosticRecord::new("TS2307: Cannot find module 'x'"),
            &mut CategoryCounts::new(),
        );
        assert_eq!(result.kind, DiagnosticType::TsTypeError);
        assert!(result.type_desc.is_some());
        assert!(result.document.is_some());
    }

    #[test]
    fn invalid_pattern_disables_only_that_rule() {
        let classifier = Classifier::new(vec![
            pattern("broken", "(unclosed", DiagnosticType::SyntaxError),
            contains("fallback", "unclosed", DiagnosticType::StyleError),
        ]);
        let result = classifier.classify(
            &DiagnosticRecord::new("an (unclosed paren"),
            &mut CategoryCounts::new(),
        );
        assert_eq!(result.kind, DiagnosticType::StyleError);
        assert_eq!(result.rule.as_deref(), Some("fallback"));
    }

    #[test]
    fn custom_remediation_overrides_default() {
        let classifier = Classifier::new(vec![contains(
            "custom",
            "boom",
            DiagnosticType::BuildError,
        )
        .remediation("call the on-call")]);
        let result = classifier.classify(&DiagnosticRecord::new("BOOM"), &mut CategoryCounts::new());
        assert_eq!(result.type_desc.as_deref(), Some("call the on-call"));
    }

    #[test]
    fn counts_accumulate_across_calls() {
        let mut counts = CategoryCounts::new();
        classify(&DiagnosticRecord::new("[template compiler] x"), &mut counts);
        classify(&DiagnosticRecord::new("[template compiler] y"), &mut counts);
        classify(&DiagnosticRecord::new("???"), &mut counts);
        assert_eq!(counts.get(DiagnosticType::TemplateError), 2);
        assert_eq!(counts.get(DiagnosticType::Unknown), 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn every_builtin_pattern_compiles() {
        for rule in BUILTIN.rules.iter() {
            assert!(
                !matches!(rule.matcher, Matcher::Disabled),
                "rule {} failed to compile",
                rule.rule.name
            );
        }
    }

    #[test]
    fn location_prefers_message_then_record() {
        let record = DiagnosticRecord::new("Unexpected token (12:5)");
        assert_eq!(
            extract_location(&record),
            Some(Location { line: 12, column: 5 })
        );

        let mut record = DiagnosticRecord::new("no position here");
        record.loc = Some("7:2-4".to_string());
        assert_eq!(extract_location(&record), Some(Location { line: 7, column: 2 }));

        record.location = Some(Location { line: 1, column: 1 });
        assert_eq!(extract_location(&record), Some(Location { line: 1, column: 1 }));
    }
}
