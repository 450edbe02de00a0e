//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde_json::Value;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::engine::{ChangeKind, DiffReport, DiffType, FieldChange};
use crate::runner::RunReport;
use crate::tagging::TagReport;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Per-type counters row for table display.
#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Imported")]
    imported: usize,
    #[tabled(rename = "Created")]
    created: usize,
    #[tabled(rename = "Updated")]
    updated: usize,
    #[tabled(rename = "Skipped")]
    skipped: usize,
    #[tabled(rename = "Failed")]
    failed: usize,
    #[tabled(rename = "Deleted")]
    deleted: usize,
}

/// Diff row for table display.
#[derive(Tabled)]
struct DiffRow {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Fields")]
    fields: String,
}

/// Retagging step row for table display.
#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "Step")]
    step: String,
    #[tabled(rename = "Count")]
    count: usize,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the result of a run.
    #[must_use]
    pub fn format_report(&self, report: &RunReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => match &report.diff {
                Some(diff) => Self::format_diff_text(diff),
                None => Self::format_summary_text(report),
            },
        }
    }

    /// Formats run counters as text.
    fn format_summary_text(report: &RunReport) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "\n{} summary\n", report.command.to_string().bold());

        if report.summary.types.is_empty() {
            let _ = writeln!(output, "{} Nothing to do.", "✓".green());
            return output;
        }

        let rows: Vec<SummaryRow> = report
            .summary
            .types
            .iter()
            .map(|(ty, s)| SummaryRow {
                resource_type: ty.clone(),
                imported: s.imported,
                created: s.created,
                updated: s.updated,
                skipped: s.skipped,
                failed: s.failed,
                deleted: s.deleted,
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let total = report.summary.total();
        let status = if total.failed == 0 {
            format!("{} Completed", "✓".green())
        } else {
            format!("{} Completed with {} failure(s)", "⚠".yellow(), total.failed.to_string().red())
        };
        let _ = writeln!(output, "\n{status}");
        output
    }

    /// Formats a diff report as text.
    fn format_diff_text(report: &DiffReport) -> String {
        if !report.has_changes() {
            return format!("{} No differences - destination is up to date.\n", "✓".green());
        }

        let mut output = String::new();
        let rows: Vec<DiffRow> = report
            .diffs
            .iter()
            .map(|d| DiffRow {
                action: Self::format_diff_type(d.diff_type),
                resource_type: d.resource_type.clone(),
                id: Self::truncate(&d.id, 40),
                fields: d.changes.len().to_string(),
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        for diff in report.diffs.iter().filter(|d| !d.changes.is_empty() || !d.unresolved.is_empty()) {
            let _ = writeln!(output, "\n{} {}", diff.resource_type.bold(), diff.id);
            for change in &diff.changes {
                let _ = writeln!(output, "   {}", Self::format_change(change));
            }
            for reference in &diff.unresolved {
                let _ = writeln!(
                    output,
                    "   {} unresolved {} {} at {}",
                    "⚠".yellow(),
                    reference.target,
                    reference.value,
                    reference.path
                );
            }
        }

        let _ = write!(
            output,
            "\nDiffs: {} to create, {} to update, {} to delete\n",
            report.creates.to_string().green(),
            report.updates.to_string().yellow(),
            report.deletes.to_string().red()
        );
        output
    }

    /// Formats a diff type with color.
    fn format_diff_type(diff_type: DiffType) -> String {
        match diff_type {
            DiffType::Create => "+create".green().to_string(),
            DiffType::Update => "~update".yellow().to_string(),
            DiffType::Delete => "-delete".red().to_string(),
        }
    }

    fn format_change(change: &FieldChange) -> String {
        let show = |v: &Option<Value>| v.as_ref().map_or_else(String::new, |v| Self::truncate(&v.to_string(), 60));
        match change.kind {
            ChangeKind::Added => format!("{} {}: {}", "+".green(), change.path, show(&change.new)),
            ChangeKind::Removed => format!("{} {}: {}", "-".red(), change.path, show(&change.old)),
            ChangeKind::Changed => format!(
                "{} {}: {} -> {}",
                "~".yellow(),
                change.path,
                show(&change.old),
                show(&change.new)
            ),
        }
    }

    /// Formats the result of a `tag` run.
    #[must_use]
    pub fn format_tag_report(&self, report: &TagReport) -> String {
        if matches!(self.format, OutputFormat::Json) {
            return serde_json::to_string_pretty(report).unwrap_or_default();
        }

        let mut output = String::new();
        let _ = writeln!(output, "\n{} retagged\n", report.resource_type.bold());

        let rows: Vec<StepRow> = report
            .steps
            .iter()
            .map(|s| StepRow {
                step: s.step.clone(),
                count: s.count,
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        if !report.missing_required_tags.is_empty() {
            let _ = writeln!(
                output,
                "\n{} {} resource(s) lack a required tag: {}",
                "⚠".yellow(),
                report.missing_required_tags.len(),
                report.missing_required_tags.join(", ")
            );
        }
        let _ = writeln!(
            output,
            "\n{} {} remaining, {} tagged (backup in {})",
            "✓".green(),
            report.remaining,
            report.tagged,
            report.backup
        );
        output
    }

    /// Formats the cleanup confirmation question.
    #[must_use]
    pub fn format_cleanup_prompt(candidates: &[(String, String)]) -> String {
        let mut output = format!("The following {} resource(s) will be deleted:\n", candidates.len());
        for (ty, id) in candidates {
            let _ = writeln!(output, "  - {ty} {id}");
        }
        output.push_str("Do you want to delete them? [y/N]: ");
        output
    }

    /// Truncates a string to a maximum length.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}
