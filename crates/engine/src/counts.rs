use buildlens_protocol::DiagnosticType;
use indexmap::IndexMap;
use serde::Serialize;

/// Per-category tally for one severity channel of one cycle.
///
/// Keys are the human-readable category labels; every label is present from the
/// start so summaries list categories in a stable order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    by_category: IndexMap<&'static str, usize>,
    total: usize,
}

impl Default for CategoryCounts {
    fn default() -> Self {
        Self {
            by_category: DiagnosticType::ALL
                .iter()
                .map(|kind| (kind.category_label(), 0))
                .collect(),
            total: 0,
        }
    }
}

impl CategoryCounts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: DiagnosticType) {
        *self.by_category.entry(kind.category_label()).or_insert(0) += 1;
        self.total += 1;
    }

    #[must_use]
    pub fn get(&self, kind: DiagnosticType) -> usize {
        self.by_category
            .get(kind.category_label())
            .copied()
            .unwrap_or(0)
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    /// Categories with at least one diagnostic, in taxonomy order.
    pub fn nonzero(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        self.by_category
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(label, count)| (*label, *count))
    }
}
