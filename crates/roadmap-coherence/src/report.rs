//! Aggregated counts and human-readable rendering of coherence findings.

use crate::issue::{CoherenceIssue, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Issue counts per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::Warning => self.warning,
            Severity::Info => self.info,
        }
    }

    fn bump(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::Warning => self.warning += 1,
            Severity::Info => self.info += 1,
        }
    }
}

/// Summary of one validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoherenceSummary {
    pub total_issues: usize,
    pub by_severity: SeverityCounts,
    /// Counts keyed by issue type tag (e.g. `"missing_tasks"`)
    pub by_type: BTreeMap<String, usize>,
    pub items_validated: usize,
}

impl CoherenceSummary {
    pub fn from_issues(issues: &[CoherenceIssue], items_validated: usize) -> Self {
        let mut summary = Self {
            total_issues: issues.len(),
            items_validated,
            ..Self::default()
        };
        for issue in issues {
            summary.by_severity.bump(issue.severity);
            *summary
                .by_type
                .entry(issue.issue_type.as_str().to_string())
                .or_insert(0) += 1;
        }
        summary
    }
}

/// Render issues grouped by severity. An empty list renders as a success line.
pub fn format_report(issues: &[CoherenceIssue]) -> String {
    if issues.is_empty() {
        return "No coherence issues found!".to_string();
    }

    let summary = CoherenceSummary::from_issues(issues, 0);
    let mut out = format!(
        "Coherence report: {} issue(s) ({} critical, {} warning, {} info)\n",
        summary.total_issues,
        summary.by_severity.critical,
        summary.by_severity.warning,
        summary.by_severity.info
    );

    for severity in Severity::ALL {
        let group: Vec<&CoherenceIssue> =
            issues.iter().filter(|i| i.severity == severity).collect();
        if group.is_empty() {
            continue;
        }
        out.push_str(&format!("\n{} ({})\n", severity, group.len()));
        for issue in group {
            let fixable = if issue.auto_fixable { " [auto-fixable]" } else { "" };
            out.push_str(&format!(
                "  - [{}] {}: {}{}\n",
                issue.item_id, issue.issue_type, issue.description, fixable
            ));
            if let Some(suggestion) = &issue.suggestion {
                out.push_str(&format!("    Suggestion: {}\n", suggestion));
            }
        }
    }

    out
}
