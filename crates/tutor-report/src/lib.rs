//! Learner Progress Reports
//!
//! This crate builds a [`ProgressReport`] from a learner's
//! [`LearningState`](tutor_engine::LearningState). Reports can be serialized
//! to JSON for programmatic access or rendered to Markdown for parents and
//! teachers.
//!
//! # Generators
//!
//! - [`json::JsonGenerator`] - Generate JSON reports with compact or pretty formatting
//! - [`MarkdownGenerator`] - Generate human-readable Markdown reports
//!
//! # Example
//!
//! ```rust
//! use tutor_engine::{initialize, Skill};
//! use tutor_report::{MarkdownGenerator, ProgressReport};
//!
//! let state = initialize(None).with_focus([Skill::AddWithin20]);
//! let report = ProgressReport::new("learningState", &state);
//!
//! assert_eq!(report.skills.len(), 9);
//! assert_eq!(report.recent_accuracy_percent, 60);
//!
//! let markdown = MarkdownGenerator::new(&report).generate();
//! assert!(markdown.contains("# Learning Progress Report"));
//! ```

pub mod json;
mod markdown;

pub use markdown::MarkdownGenerator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tutor_engine::{
    AnswerRecord, LearningState, Skill, ACCURACY_WINDOW, DEFAULT_CANDIDATE_POOL,
};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Failed to serialize the report to JSON.
    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to read or write report files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;

// ============================================================================
// Percentages
// ============================================================================

/// Converts a fraction in `[0, 1]` to a whole percentage, rounding.
#[must_use]
// In [0, 100] after the clamp.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn rounded_percent(fraction: f64) -> u8 {
    (fraction * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Converts a fraction in `[0, 1]` to a whole percentage, truncating.
#[must_use]
// In [0, 100] after the clamp.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn truncated_percent(fraction: f64) -> u8 {
    (fraction * 100.0).trunc().clamp(0.0, 100.0) as u8
}

// ============================================================================
// Report
// ============================================================================

/// Mastery of one skill, as shown in a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillProgress {
    /// The skill.
    pub skill: Skill,
    /// Human-readable label.
    pub label: String,
    /// Mastery in `[0, 1]`.
    pub mastery: f64,
    /// Mastery as a rounded whole percentage.
    pub mastery_percent: u8,
}

/// A snapshot of a learner's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    /// Session key identifying the learner.
    pub learner: String,

    /// When the report was generated.
    pub generated_at: DateTime<Utc>,

    /// Per-skill mastery in curriculum order.
    pub skills: Vec<SkillProgress>,

    /// Fraction of correct answers among the most recent answers.
    pub recent_accuracy: f64,

    /// Recent accuracy as a truncated whole percentage.
    pub recent_accuracy_percent: u8,

    /// Difficulty the learner is currently working at.
    pub target_difficulty: u8,

    /// Number of answers in the retained history.
    pub answers_recorded: usize,

    /// Number of correct answers in the retained history.
    pub answers_correct: usize,

    /// Lowest-mastery skills, weakest first.
    pub weakest: Vec<Skill>,

    /// Active focus override, if any.
    pub focus: Vec<Skill>,

    /// The most recent answers, oldest first.
    pub recent_answers: Vec<AnswerRecord>,
}

impl ProgressReport {
    /// Builds a report for `state`, stamped with the current time.
    #[must_use]
    pub fn new(learner: impl Into<String>, state: &LearningState) -> Self {
        Self::at(learner, state, Utc::now())
    }

    /// Builds a report for `state`, stamped with `generated_at`.
    #[must_use]
    pub fn at(learner: impl Into<String>, state: &LearningState, generated_at: DateTime<Utc>) -> Self {
        let skills = state
            .mastery()
            .iter()
            .map(|(skill, mastery)| SkillProgress {
                skill,
                label: skill.label(),
                mastery,
                mastery_percent: rounded_percent(mastery),
            })
            .collect();

        let weakest = state
            .mastery()
            .ranked()
            .into_iter()
            .take(DEFAULT_CANDIDATE_POOL)
            .map(|(skill, _)| skill)
            .collect();

        Self {
            learner: learner.into(),
            generated_at,
            skills,
            recent_accuracy: state.recent_accuracy(),
            recent_accuracy_percent: truncated_percent(state.recent_accuracy()),
            target_difficulty: state.target_difficulty().get(),
            answers_recorded: state.history().len(),
            answers_correct: state.history().iter().filter(|r| r.correct).count(),
            weakest,
            focus: state.focus().to_vec(),
            recent_answers: state.history().recent(ACCURACY_WINDOW),
        }
    }

    /// Serializes the report to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::Serialization` if JSON serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(ReportError::from)
    }

    /// Returns the progress row for `skill`.
    #[must_use]
    pub fn skill(&self, skill: Skill) -> Option<&SkillProgress> {
        self.skills.iter().find(|s| s.skill == skill)
    }
}

// ============================================================================
// Tests
// ============================================================================
