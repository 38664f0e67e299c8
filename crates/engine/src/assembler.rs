use crate::{extract_location, CategoryCounts, Classifier, GroupRules};
use buildlens_protocol::{
    BuildStatus, ClassifiedDiagnostic, DiagnosticGroups, DiagnosticRecord, DiagnosticType,
    Report, Severity, UNKNOWN_FILE,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Types that halt a strict build unless configured otherwise.
pub const DEFAULT_BLOCKING: [DiagnosticType; 2] =
    [DiagnosticType::SyntaxError, DiagnosticType::ModuleNotFound];

/// Include list first (when non-empty), then exclude list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeFilter {
    #[serde(default)]
    pub includes: Vec<DiagnosticType>,
    #[serde(default)]
    pub excludes: Vec<DiagnosticType>,
}

impl TypeFilter {
    #[must_use]
    pub fn allows(&self, kind: DiagnosticType) -> bool {
        if !self.includes.is_empty() && !self.includes.contains(&kind) {
            return false;
        }
        !self.excludes.contains(&kind)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeverityFilters {
    pub errors: TypeFilter,
    pub warnings: TypeFilter,
}

impl SeverityFilters {
    #[must_use]
    pub const fn for_severity(&self, severity: Severity) -> &TypeFilter {
        match severity {
            Severity::Error => &self.errors,
            Severity::Warning => &self.warnings,
        }
    }
}

/// A diagnostic that survived filtering, with what the grouper needs.
#[derive(Debug, Clone)]
pub struct PendingDiagnostic {
    pub diagnostic: ClassifiedDiagnostic,
    pub path: Option<String>,
    pub sub_entry: Option<bool>,
}

/// Output of the classifying stage.
#[derive(Debug, Clone)]
pub struct ClassifiedBatch {
    pub timestamp: DateTime<Utc>,
    pub errors: Vec<PendingDiagnostic>,
    pub warnings: Vec<PendingDiagnostic>,
    pub error_counts: CategoryCounts,
    pub warning_counts: CategoryCounts,
}

/// Output of the grouping stage.
#[derive(Debug, Clone)]
pub struct GroupedBatch {
    pub timestamp: DateTime<Utc>,
    pub errors: DiagnosticGroups,
    pub warnings: DiagnosticGroups,
    pub error_counts: CategoryCounts,
    pub warning_counts: CategoryCounts,
}

/// A finished cycle: the report plus what the caller has to act on.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub report: Report,
    /// Errors whose type is in the blocking set, in id order.
    pub blocking: Vec<ClassifiedDiagnostic>,
    pub error_counts: CategoryCounts,
    pub warning_counts: CategoryCounts,
}

impl Assembly {
    #[must_use]
    pub fn has_blocking(&self) -> bool {
        !self.blocking.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Assembler {
    classifier: Classifier,
    rules: GroupRules,
    filters: SeverityFilters,
    blocking: HashSet<DiagnosticType>,
}

impl Assembler {
    pub fn new(
        rules: GroupRules,
        filters: SeverityFilters,
        blocking: impl IntoIterator<Item = DiagnosticType>,
    ) -> Self {
        Self {
            classifier: Classifier::builtin(),
            rules,
            filters,
            blocking: blocking.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn blocking_types(&self) -> &HashSet<DiagnosticType> {
        &self.blocking
    }

    pub fn assemble(&self, errors: &[DiagnosticRecord], warnings: &[DiagnosticRecord]) -> Assembly {
        self.assemble_at(errors, warnings, Utc::now())
    }

    pub fn assemble_at(
        &self,
        errors: &[DiagnosticRecord],
        warnings: &[DiagnosticRecord],
        now: DateTime<Utc>,
    ) -> Assembly {
        let classified = self.classify(errors, warnings, now);
        let grouped = self.group(classified);
        self.finish(grouped)
    }

    /// Classifies both channels, filters by type and numbers the survivors.
    pub fn classify(
        &self,
        errors: &[DiagnosticRecord],
        warnings: &[DiagnosticRecord],
        now: DateTime<Utc>,
    ) -> ClassifiedBatch {
        let mut error_counts = CategoryCounts::new();
        let mut warning_counts = CategoryCounts::new();
        let errors = self.classify_channel(errors, Severity::Error, &mut error_counts, now);
        let warnings = self.classify_channel(warnings, Severity::Warning, &mut warning_counts, now);
        ClassifiedBatch {
            timestamp: now,
            errors,
            warnings,
            error_counts,
            warning_counts,
        }
    }

    fn classify_channel(
        &self,
        records: &[DiagnosticRecord],
        severity: Severity,
        counts: &mut CategoryCounts,
        now: DateTime<Utc>,
    ) -> Vec<PendingDiagnostic> {
        let filter = self.filters.for_severity(severity);
        let mut next_id = 0u64;
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            let classification = self.classifier.classify(record, counts);
            if !filter.allows(classification.kind) {
                continue;
            }
            let path = record.resolved_path().map(str::to_string);
            let diagnostic = ClassifiedDiagnostic {
                id: next_id,
                message: record.message.clone(),
                stack: record.stack.clone(),
                file_path: path.clone().unwrap_or_else(|| UNKNOWN_FILE.to_string()),
                location: extract_location(record),
                kind: classification.kind,
                type_desc: classification.type_desc,
                hint: classification.hint,
                document: classification.document,
                severity,
                timestamp: now,
            };
            next_id += 1;
            out.push(PendingDiagnostic {
                diagnostic,
                path,
                sub_entry: record.is_sub_entry(),
            });
        }
        out
    }

    /// Buckets both channels; empty buckets are dropped.
    pub fn group(&self, batch: ClassifiedBatch) -> GroupedBatch {
        GroupedBatch {
            timestamp: batch.timestamp,
            errors: self.group_channel(batch.errors),
            warnings: self.group_channel(batch.warnings),
            error_counts: batch.error_counts,
            warning_counts: batch.warning_counts,
        }
    }

    fn group_channel(&self, pending: Vec<PendingDiagnostic>) -> DiagnosticGroups {
        // Configured groups keep their declared order on the dashboard.
        let mut groups: DiagnosticGroups = self
            .rules
            .names()
            .map(|name| (name.to_string(), Vec::new()))
            .collect();
        for item in pending {
            let name = self
                .rules
                .group_entry(item.path.as_deref(), item.sub_entry);
            groups.entry(name).or_default().push(item.diagnostic);
        }
        groups.retain(|_, items| !items.is_empty());
        groups
    }

    /// Stamps the report and collects blocking errors.
    pub fn finish(&self, grouped: GroupedBatch) -> Assembly {
        let mut blocking: Vec<ClassifiedDiagnostic> = grouped
            .errors
            .values()
            .flatten()
            .filter(|d| self.blocking.contains(&d.kind))
            .cloned()
            .collect();
        blocking.sort_by_key(|d| d.id);

        let build_status = if grouped.errors.is_empty() {
            BuildStatus::Success
        } else {
            BuildStatus::Failed
        };
        Assembly {
            report: Report {
                timestamp: grouped.timestamp,
                build_status,
                errors: grouped.errors,
                warnings: grouped.warnings,
            },
            blocking,
            error_counts: grouped.error_counts,
            warning_counts: grouped.warning_counts,
        }
    }
}

/// One-shot assembly with the built-in classifier.
pub fn assemble(
    errors: &[DiagnosticRecord],
    warnings: &[DiagnosticRecord],
    rules: &GroupRules,
    filters: &SeverityFilters,
    blocking: &[DiagnosticType],
) -> Assembly {
    Assembler::new(rules.clone(), filters.clone(), blocking.iter().copied()).assemble(errors, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GroupRule, IncludePattern, DEFAULT_GROUP};
    use pretty_assertions::assert_eq;

    fn record(message: &str, file: &str) -> DiagnosticRecord {
        DiagnosticRecord::new(message).with_file(file)
    }

    fn ids(groups: &DiagnosticGroups) -> Vec<u64> {
        let mut ids: Vec<u64> = groups.values().flatten().map(|d| d.id).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn ids_are_sequential_per_channel() {
        let errors = vec![
            record("[style compiler] a", "/p/src/components/A/a.less"),
            record("[style compiler] b", "/p/src/pages/home/b.less"),
        ];
        let warnings = vec![record("[eslint] w", "/p/src/x.js")];
        let assembly = assemble(&errors, &warnings, &GroupRules::default(), &SeverityFilters::default(), &DEFAULT_BLOCKING);

        assert_eq!(ids(&assembly.report.errors), vec![0, 1]);
        assert_eq!(ids(&assembly.report.warnings), vec![0]);
        assert_eq!(assembly.report.build_status, BuildStatus::Failed);
    }

    #[test]
    fn include_runs_before_exclude() {
        let filters = SeverityFilters {
            errors: TypeFilter {
                includes: vec![DiagnosticType::StyleError, DiagnosticType::TemplateError],
                excludes: vec![DiagnosticType::TemplateError],
            },
            warnings: TypeFilter::default(),
        };
        let errors = vec![
            record("[style compiler] a", "/p/a.less"),
            record("[template compiler] b", "/p/b.mpx"),
            record("Module not found: x", "/p/c.js"),
        ];
        let assembly = assemble(&errors, &[], &GroupRules::default(), &filters, &DEFAULT_BLOCKING);

        let kinds: Vec<_> = assembly.report.errors.values().flatten().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![DiagnosticType::StyleError]);
        assert_eq!(ids(&assembly.report.errors), vec![0]);
        assert!(assembly.blocking.is_empty());
        // Counts reflect everything the compiler produced.
        assert_eq!(assembly.error_counts.total(), 3);
    }

    #[test]
    fn filtering_everything_yields_success_without_groups() {
        let filters = SeverityFilters {
            errors: TypeFilter {
                includes: Vec::new(),
                excludes: vec![DiagnosticType::Unknown],
            },
            warnings: TypeFilter::default(),
        };
        let assembly = assemble(&[DiagnosticRecord::new("???")], &[], &GroupRules::default(), &filters, &DEFAULT_BLOCKING);
        assert_eq!(assembly.report.build_status, BuildStatus::Success);
        assert!(assembly.report.errors.is_empty());
    }

    #[test]
    fn configured_groups_keep_order_and_empty_ones_are_dropped() {
        let rules = GroupRules::new(vec![
            GroupRule::new("unused", vec![IncludePattern::literal("src/nowhere")]),
            GroupRule::new("shared", vec![IncludePattern::literal("src/shared")]),
        ]);
        let errors = vec![
            DiagnosticRecord::new("boom"),
            record("boom", "/p/src/shared/a.js"),
            record("boom", "/p/src/components/Nav/a.js"),
        ];
        let assembly = assemble(&errors, &[], &rules, &SeverityFilters::default(), &[]);

        let names: Vec<_> = assembly.report.errors.keys().cloned().collect();
        assert_eq!(names, vec!["shared", DEFAULT_GROUP, "组件-Nav"]);
        assert!(assembly.report.errors.values().all(|items| !items.is_empty()));
        let orphan = &assembly.report.errors[DEFAULT_GROUP][0];
        assert_eq!(orphan.file_path, UNKNOWN_FILE);
    }

    #[test]
    fn every_filtered_diagnostic_lands_in_exactly_one_group() {
        let errors: Vec<_> = (0..25)
            .map(|i| record(&format!("error {i}"), &format!("/p/src/components/C{}/x.js", i % 4)))
            .collect();
        let assembly = assemble(&errors, &[], &GroupRules::default(), &SeverityFilters::default(), &[]);
        assert_eq!(assembly.report.error_count(), 25);
        assert_eq!(ids(&assembly.report.errors), (0..25).collect::<Vec<_>>());
    }

    #[test]
    fn blocking_errors_are_collected_in_id_order() {
        let errors = vec![
            record("Module not found: Error: Can't resolve './x'", "/p/src/components/B/b.js"),
            record("[style compiler] a", "/p/src/a.less"),
            record("SyntaxError: Unexpected token", "/p/src/components/A/a.js"),
        ];
        let assembly = assemble(&errors, &[], &GroupRules::default(), &SeverityFilters::default(), &DEFAULT_BLOCKING);
        let blocking: Vec<_> = assembly.blocking.iter().map(|d| (d.id, d.kind)).collect();
        assert_eq!(
            blocking,
            vec![(0, DiagnosticType::ModuleNotFound), (2, DiagnosticType::SyntaxError)]
        );
        assert!(assembly.has_blocking());
    }

    #[test]
    fn warnings_never_block() {
        let warnings = vec![record("Module not found: x", "/p/a.js")];
        let assembly = assemble(&[], &warnings, &GroupRules::default(), &SeverityFilters::default(), &DEFAULT_BLOCKING);
        assert!(!assembly.has_blocking());
        assert_eq!(assembly.report.build_status, BuildStatus::Success);
    }

    #[test]
    fn report_timestamp_is_the_cycle_time() {
        let now: DateTime<Utc> = "2024-01-02T03:04:05Z".parse().unwrap();
        let assembler = Assembler::new(GroupRules::default(), SeverityFilters::default(), DEFAULT_BLOCKING);
        let assembly = assembler.assemble_at(&[record("x", "/a.js")], &[], now);
        assert_eq!(assembly.report.timestamp, now);
        assert!(assembly.report.errors.values().flatten().all(|d| d.timestamp == now));
    }
}
