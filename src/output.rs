//! Terminal output for the command-line front end.
//!
//! All user-facing printing goes through [`OutputFormatter`] so that styling stays
//! consistent. Diagnostics for developers go through `tracing` instead.

use crate::category::CategoryMapping;
use crate::organizer::{MoveOutcome, MoveStatus, PlannedMove, RunReport};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;

/// Prints status lines, progress bars and run summaries.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// ```no_run
    /// use springclean::output::OutputFormatter;
    /// OutputFormatter::success("Organization complete");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red to stderr.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Warning for modes where stdout carries machine-readable output.
    pub fn warning_stderr(message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a determinate progress bar for a run over `total` files.
    ///
    /// ```no_run
    /// use springclean::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(10);
    /// pb.set_position(3);
    /// pb.finish_and_clear();
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("█▓░"),
        );
        pb
    }

    /// Formats one outcome the way the log pane shows it.
    pub fn outcome_line(outcome: &MoveOutcome) -> String {
        match outcome.status() {
            MoveStatus::Moved { .. } => format!(
                "{} Moved: {} → {}",
                "✓".green(),
                outcome.file_name(),
                outcome.category()
            ),
            MoveStatus::Failed { error } => format!(
                "{} Error moving {}: {}",
                "✗".red(),
                outcome.file_name(),
                error
            ),
        }
    }

    /// Prints every outcome of `report` in processing order.
    pub fn outcomes(report: &RunReport) {
        for outcome in report.outcomes() {
            println!("{}", Self::outcome_line(outcome));
        }
    }

    /// Prints the per-category table followed by moved/error totals.
    pub fn summary_table(report: &RunReport) {
        Self::header("=== Organization Complete ===");
        Self::category_table(&report.moved_by_category(), report.moved());

        let errors = report.errored().to_string();
        println!(
            "Files moved: {}  Errors: {}",
            report.moved().to_string().green().bold(),
            if report.errored() == 0 {
                errors.green()
            } else {
                errors.red().bold()
            }
        );
    }

    /// Prints what a dry run would do.
    pub fn plan(planned: &[PlannedMove]) {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for item in planned {
            Self::dry_run_notice(&format!("{} → {}", item.file_name, item.category));
            *counts.entry(item.category.clone()).or_insert(0) += 1;
        }
        Self::header("DRY RUN SUMMARY");
        Self::category_table(&counts, planned.len());
    }

    /// Lists the categories of `mapping` in precedence order.
    pub fn categories(mapping: &CategoryMapping) {
        let width = mapping
            .categories()
            .iter()
            .map(|category| category.name().len())
            .max()
            .unwrap_or(0);

        for category in mapping.categories() {
            println!(
                "{:<width$}  {}",
                format!("{}:", category.name()).bold(),
                category.extensions().join(", "),
                width = width + 1
            );
        }
        println!(
            "{}",
            format!(
                "Files matching none of these go to {}.",
                crate::category::OTHERS
            )
            .dimmed()
        );
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    fn category_table(counts: &BTreeMap<String, usize>, total_files: usize) {
        let width = counts.keys().map(String::len).max().unwrap_or(0).max(8);

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));
        for (category, count) in counts {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                file_word(*count),
                width = width
            );
        }
        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            file_word(total_files),
            width = width
        );
    }
}

fn file_word(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
