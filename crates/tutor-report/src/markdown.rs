//! Markdown report generation for learner progress.
//!
//! This module provides the [`MarkdownGenerator`] struct for converting a
//! [`ProgressReport`] into a human-readable Markdown document. The generated
//! report includes:
//!
//! - A summary table with answers, accuracy, difficulty and focus
//! - Per-skill mastery
//! - The skills most in need of practice
//! - The most recent answers
//!
//! # Example
//!
//! ```rust
//! use tutor_engine::initialize;
//! use tutor_report::{MarkdownGenerator, ProgressReport};
//!
//! let report = ProgressReport::new("learningState", &initialize(None));
//! let markdown = MarkdownGenerator::new(&report).generate();
//! assert!(markdown.contains("| counting within 120 | 45% |"));
//! ```

use chrono::{DateTime, Utc};
use std::fmt::Write;

use crate::ProgressReport;

/// Generates Markdown reports from learner progress.
pub struct MarkdownGenerator<'a> {
    report: &'a ProgressReport,
}

impl<'a> MarkdownGenerator<'a> {
    /// Creates a new Markdown generator for the given report.
    #[must_use]
    pub const fn new(report: &'a ProgressReport) -> Self {
        Self { report }
    }

    /// Generates the complete Markdown report.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();

        self.write_title(&mut output);
        self.write_summary(&mut output);
        self.write_mastery(&mut output);
        self.write_weakest(&mut output);
        self.write_recent_answers(&mut output);
        self.write_footer(&mut output);

        output
    }

    /// Writes the report title.
    fn write_title(&self, output: &mut String) {
        let _ = writeln!(
            output,
            "# Learning Progress Report: {}\n",
            escape_markdown(&self.report.learner)
        );
    }

    /// Writes the summary section with metrics table.
    fn write_summary(&self, output: &mut String) {
        let _ = writeln!(output, "## Summary\n");
        let _ = writeln!(output, "| Metric | Value |");
        let _ = writeln!(output, "|--------|-------|");
        let _ = writeln!(
            output,
            "| Answers Recorded | {} ({} correct) |",
            self.report.answers_recorded, self.report.answers_correct
        );
        let _ = writeln!(
            output,
            "| Recent Accuracy | {}% |",
            self.report.recent_accuracy_percent
        );
        let _ = writeln!(
            output,
            "| Target Difficulty | {} / 10 |",
            self.report.target_difficulty
        );

        let focus = if self.report.focus.is_empty() {
            "None".to_string()
        } else {
            self.report
                .focus
                .iter()
                .map(tutor_engine::Skill::label)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let _ = writeln!(output, "| Focus | {focus} |");
        let _ = writeln!(output);
    }

    /// Writes the per-skill mastery table.
    fn write_mastery(&self, output: &mut String) {
        let _ = writeln!(output, "## Skill Mastery\n");
        let _ = writeln!(output, "| Skill | Mastery |");
        let _ = writeln!(output, "|-------|---------|");
        for row in &self.report.skills {
            let _ = writeln!(output, "| {} | {}% |", row.label, row.mastery_percent);
        }
        let _ = writeln!(output);
    }

    /// Writes the weakest skills as a numbered list.
    fn write_weakest(&self, output: &mut String) {
        let _ = writeln!(output, "## Needs Practice\n");
        for (i, skill) in self.report.weakest.iter().enumerate() {
            let percent = self
                .report
                .skill(*skill)
                .map_or(0, |row| row.mastery_percent);
            let _ = writeln!(output, "{}. {} ({percent}%)", i + 1, skill.label());
        }
        let _ = writeln!(output);
    }

    /// Writes the recent answers table.
    fn write_recent_answers(&self, output: &mut String) {
        let _ = writeln!(output, "## Recent Answers\n");

        if self.report.recent_answers.is_empty() {
            let _ = writeln!(output, "_No answers recorded yet._\n");
            return;
        }

        let _ = writeln!(output, "| # | Skill | Difficulty | Result |");
        let _ = writeln!(output, "|---|-------|------------|--------|");
        for (i, answer) in self.report.recent_answers.iter().enumerate() {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} |",
                i + 1,
                answer.skill.label(),
                answer.difficulty,
                if answer.correct { "Correct" } else { "Incorrect" }
            );
        }
        let _ = writeln!(output);
    }

    /// Writes the footer with generation timestamp.
    fn write_footer(&self, output: &mut String) {
        let _ = writeln!(output, "---");
        let timestamp = format_timestamp(&self.report.generated_at);
        let _ = writeln!(output, "*Generated by Adaptive Tutor at {timestamp}*");
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Formats a timestamp for display.
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Escapes special Markdown characters in text.
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for ch in text.chars() {
        match ch {
            '*' | '_' | '`' | '#' | '[' | ']' | '(' | ')' | '!' | '\\' | '<' | '>' | '|' => {
                result.push('\\');
                result.push(ch);
            }
            '\n' => result.push(' '),
            _ => result.push(ch),
        }
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
