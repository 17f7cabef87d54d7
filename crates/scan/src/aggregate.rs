//! Grouped counts and rankings over result rows.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::reader::{category_of, read_table, result_files, ResultRow};

/// Bucket for rows that lack the grouped column.
pub const UNKNOWN_VALUE: &str = "unknown";

/// The category that carries axe-core violations.
pub const PRIMARY_CATEGORY: &str = "axe_core_audit";

const IMPACT_FIELD: &str = "impact";
const RULE_ID_FIELD: &str = "id";
const TOP_VIOLATIONS: usize = 10;

/// Count rows per distinct value of `field`, in first-seen order.
pub fn count_by_field(rows: &[ResultRow], field: &str) -> IndexMap<String, usize> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for row in rows {
        let value = row.get(field).map(String::as_str).unwrap_or(UNKNOWN_VALUE);
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }
    counts
}

/// The `n` most frequent values of `field`. Ties keep first-seen order.
pub fn top_n_by_field(rows: &[ResultRow], field: &str, n: usize) -> Vec<(String, usize)> {
    let mut ranked: Vec<(String, usize)> = count_by_field(rows, field).into_iter().collect();
    // sort_by is stable
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(n);
    ranked
}

/// One entry of the top violations ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationCount {
    pub id: String,
    pub count: usize,
}

/// Aggregate view of a results directory. Recomputed on every call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    pub total_issues: usize,
    pub by_audit_type: IndexMap<String, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axe_impact_breakdown: Option<IndexMap<String, usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_violations: Option<Vec<ViolationCount>>,
}

/// Summarize every result file in `dir`. A missing directory yields zeros.
pub fn summarize(dir: &Path) -> Summary {
    let mut summary = Summary::default();
    if !dir.is_dir() {
        return summary;
    }

    for path in result_files(dir, None) {
        let category = category_of(&path);
        let rows = read_table(&path).map(|t| t.rows).unwrap_or_default();

        summary.total_issues += rows.len();
        summary.by_audit_type.insert(category.clone(), rows.len());

        if category == PRIMARY_CATEGORY && !rows.is_empty() {
            summary.axe_impact_breakdown = Some(count_by_field(&rows, IMPACT_FIELD));
            summary.top_violations = Some(
                top_n_by_field(&rows, RULE_ID_FIELD, TOP_VIOLATIONS)
                    .into_iter()
                    .map(|(id, count)| ViolationCount { id, count })
                    .collect(),
            );
        }
    }

    summary
}
