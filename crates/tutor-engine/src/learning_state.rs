//! Learning state for the adaptive tutor.
//!
//! This module owns the canonical per-learner record: per-skill mastery,
//! recent accuracy, the target difficulty and a bounded answer history.
//! It provides lenient initialization from a partial snapshot and the pure
//! transition applied after every submitted answer.

use std::collections::{BTreeMap, VecDeque};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::skill::{Difficulty, Skill};

/// Mastery assigned to every skill in a fresh state.
pub const START_MASTERY: f64 = 0.45;

/// Mastery assumed by [`MasteryMap::get`] for a skill with no entry.
pub const UNSET_MASTERY: f64 = 0.4;

/// Fixed step added (correct) or subtracted (incorrect) per answer.
pub const MASTERY_STEP: f64 = 0.18;

/// Maximum number of answers kept in the history.
pub const HISTORY_CAPACITY: usize = 20;

/// Number of most recent answers that make up recent accuracy.
pub const ACCURACY_WINDOW: usize = 10;

/// Recent accuracy reported before any answer has been recorded.
pub const DEFAULT_RECENT_ACCURACY: f64 = 0.6;

/// Recent accuracy at or above which the difficulty goes up one rung.
pub const RAISE_THRESHOLD: f64 = 0.85;

/// Recent accuracy at or below which the difficulty goes down one rung.
pub const LOWER_THRESHOLD: f64 = 0.55;

/// Applies the difficulty ratchet for the given recent accuracy.
///
/// At most one rung of movement per call; the result stays on the ladder.
///
/// # Examples
///
/// ```
/// use tutor_engine::{ratchet, Difficulty};
///
/// assert_eq!(ratchet(Difficulty::new(4), 0.9).get(), 5);
/// assert_eq!(ratchet(Difficulty::new(4), 0.5).get(), 3);
/// assert_eq!(ratchet(Difficulty::new(4), 0.7).get(), 4);
/// assert_eq!(ratchet(Difficulty::MAX, 1.0), Difficulty::MAX);
/// ```
#[must_use]
pub fn ratchet(difficulty: Difficulty, recent_accuracy: f64) -> Difficulty {
    if recent_accuracy >= RAISE_THRESHOLD {
        difficulty.raise()
    } else if recent_accuracy <= LOWER_THRESHOLD {
        difficulty.lower()
    } else {
        difficulty
    }
}

// ============================================================================
// MasteryMap
// ============================================================================

/// Per-skill mastery estimates in `[0, 1]`.
///
/// Deserialized entries are clamped; skills without an entry start at
/// [`START_MASTERY`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MasteryMap(BTreeMap<Skill, f64>);

impl MasteryMap {
    /// Creates a map with every skill set to `value` (clamped into `[0, 1]`).
    #[must_use]
    pub fn uniform(value: f64) -> Self {
        Self(Skill::ALL.into_iter().map(|s| (s, value.clamp(0.0, 1.0))).collect())
    }

    /// Returns the mastery for `skill`, or [`UNSET_MASTERY`] if it has no entry.
    #[must_use]
    pub fn get(&self, skill: Skill) -> f64 {
        self.0.get(&skill).copied().unwrap_or(UNSET_MASTERY)
    }

    /// Sets the mastery for `skill`, clamping into `[0, 1]`.
    pub fn set(&mut self, skill: Skill, value: f64) {
        self.0.insert(skill, value.clamp(0.0, 1.0));
    }

    /// Iterates over `(skill, mastery)` pairs in curriculum order.
    pub fn iter(&self) -> impl Iterator<Item = (Skill, f64)> + '_ {
        self.0.iter().map(|(s, m)| (*s, *m))
    }

    /// Returns every skill ranked by ascending mastery.
    ///
    /// Ties keep curriculum order.
    #[must_use]
    pub fn ranked(&self) -> Vec<(Skill, f64)> {
        let mut ranked: Vec<(Skill, f64)> = Skill::ALL.iter().map(|s| (*s, self.get(*s))).collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
        ranked
    }
}

impl Default for MasteryMap {
    fn default() -> Self {
        Self::uniform(START_MASTERY)
    }
}

impl<'de> Deserialize<'de> for MasteryMap {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = BTreeMap::<Skill, f64>::deserialize(deserializer)?;
        let mut mastery = Self::default();
        for (skill, value) in entries {
            mastery.set(skill, value);
        }
        Ok(mastery)
    }
}

// ============================================================================
// AnswerRecord
// ============================================================================

/// One submitted answer, as recorded in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    /// Skill the question targeted.
    pub skill: Skill,
    /// Difficulty the question was asked at.
    pub difficulty: Difficulty,
    /// Whether the answer was judged correct.
    pub correct: bool,
}

impl AnswerRecord {
    /// Creates a new `AnswerRecord`.
    #[must_use]
    pub const fn new(skill: Skill, difficulty: Difficulty, correct: bool) -> Self {
        Self {
            skill,
            difficulty,
            correct,
        }
    }

    /// Compact `skill@difficulty:✓|✗` form used in generator requests.
    #[must_use]
    pub fn compact(&self) -> String {
        format!(
            "{}@{}:{}",
            self.skill,
            self.difficulty,
            if self.correct { '✓' } else { '✗' }
        )
    }
}

// ============================================================================
// AnswerHistory
// ============================================================================

/// The most recent answers, oldest first, at most [`HISTORY_CAPACITY`] long.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AnswerHistory(VecDeque<AnswerRecord>);

impl<'de> Deserialize<'de> for AnswerHistory {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Vec::<AnswerRecord>::deserialize(deserializer).map(Self::from_records)
    }
}

impl AnswerHistory {
    /// Builds a history from records in chronological order, keeping only the
    /// most recent [`HISTORY_CAPACITY`].
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = AnswerRecord>) -> Self {
        let mut history = Self::default();
        for record in records {
            history.push(record);
        }
        history
    }

    /// Appends a record, evicting the oldest one while over capacity.
    pub fn push(&mut self, record: AnswerRecord) {
        self.0.push_back(record);
        while self.0.len() > HISTORY_CAPACITY {
            self.0.pop_front();
        }
    }

    /// Number of recorded answers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no answer has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the records, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &AnswerRecord> + ExactSizeIterator {
        self.0.iter()
    }

    /// Returns the last `n` records, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<AnswerRecord> {
        let skip = self.0.len().saturating_sub(n);
        self.0.iter().skip(skip).copied().collect()
    }

    /// Fraction of correct answers among the last [`ACCURACY_WINDOW`] records,
    /// or [`DEFAULT_RECENT_ACCURACY`] for an empty history.
    #[must_use]
    // Both counts are at most ACCURACY_WINDOW.
    #[allow(clippy::cast_precision_loss)]
    pub fn recent_accuracy(&self) -> f64 {
        let recent = self.recent(ACCURACY_WINDOW);
        if recent.is_empty() {
            return DEFAULT_RECENT_ACCURACY;
        }
        let correct = recent.iter().filter(|r| r.correct).count();
        correct as f64 / recent.len() as f64
    }
}

// ============================================================================
// PartialLearningState
// ============================================================================

/// A possibly incomplete or damaged learning-state snapshot.
///
/// Each field is read independently: a field holding the wrong JSON type is
/// treated as absent rather than failing the whole snapshot.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialLearningState {
    /// Raw mastery entries keyed by skill name.
    #[serde(default, deserialize_with = "lenient")]
    pub mastery: Option<Map<String, Value>>,

    /// Recent accuracy, if present and numeric.
    #[serde(default, deserialize_with = "lenient")]
    pub recent_accuracy: Option<f64>,

    /// Target difficulty, if present and numeric.
    #[serde(default, deserialize_with = "lenient")]
    pub target_difficulty: Option<f64>,

    /// Raw history entries, oldest first.
    #[serde(default, deserialize_with = "lenient")]
    pub history: Option<Vec<Value>>,

    /// Raw focus entries.
    #[serde(default, deserialize_with = "lenient")]
    pub focus: Option<Vec<Value>>,
}

impl PartialLearningState {
    /// Sets a single mastery entry, keeping any others already present.
    #[must_use]
    pub fn with_mastery(mut self, skill: Skill, value: f64) -> Self {
        self.mastery
            .get_or_insert_with(Map::new)
            .insert(skill.as_str().to_string(), Value::from(value));
        self
    }
}

/// Deserializes a field, mapping any type mismatch to `None`.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

// ============================================================================
// LearningState
// ============================================================================

/// The learner's adaptive state: the sole persisted unit.
///
/// Deserialization always goes through [`initialize`], so a deserialized
/// state satisfies the same invariants as a freshly built one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PartialLearningState")]
pub struct LearningState {
    mastery: MasteryMap,
    recent_accuracy: f64,
    target_difficulty: Difficulty,
    history: AnswerHistory,
    focus: Vec<Skill>,
}

impl Default for LearningState {
    fn default() -> Self {
        initialize(None)
    }
}

impl From<PartialLearningState> for LearningState {
    fn from(partial: PartialLearningState) -> Self {
        initialize(Some(partial))
    }
}

/// Builds a complete learning state, filling anything missing or malformed
/// in `existing` with defaults.
///
/// # Examples
///
/// ```
/// use tutor_engine::{initialize, PartialLearningState, Skill};
///
/// let fresh = initialize(None);
/// assert_eq!(fresh.mastery().get(Skill::AddWithin20), 0.45);
/// assert_eq!(fresh.target_difficulty().get(), 4);
///
/// let partial = PartialLearningState::default().with_mastery(Skill::AddWithin20, 0.8);
/// let state = initialize(Some(partial));
/// assert_eq!(state.mastery().get(Skill::AddWithin20), 0.8);
/// assert_eq!(state.mastery().get(Skill::SubtractWithin20), 0.45);
/// ```
#[must_use]
pub fn initialize(existing: Option<PartialLearningState>) -> LearningState {
    let existing = existing.unwrap_or_default();

    let mut mastery = MasteryMap::default();
    if let Some(raw) = &existing.mastery {
        for skill in Skill::ALL {
            if let Some(value) = raw
                .get(skill.as_str())
                .and_then(Value::as_f64)
                .filter(|v| v.is_finite())
            {
                mastery.set(skill, value);
            }
        }
    }

    let recent_accuracy = existing
        .recent_accuracy
        .filter(|v| v.is_finite())
        .map_or(DEFAULT_RECENT_ACCURACY, |v| v.clamp(0.0, 1.0));

    let target_difficulty = existing
        .target_difficulty
        .and_then(Difficulty::from_number)
        .unwrap_or_default();

    let history = AnswerHistory::from_records(
        existing
            .history
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| serde_json::from_value::<AnswerRecord>(v).ok()),
    );

    let focus = existing
        .focus
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| serde_json::from_value::<Skill>(v).ok())
        .collect();

    LearningState {
        mastery,
        recent_accuracy,
        target_difficulty,
        history,
        focus,
    }
}

/// Returns the state that follows `state` after `answer`.
///
/// Pure: `state` is left untouched.
#[must_use]
pub fn transition(state: &LearningState, answer: &AnswerRecord) -> LearningState {
    let mut next = state.clone();

    let delta = if answer.correct {
        MASTERY_STEP
    } else {
        -MASTERY_STEP
    };
    let current = next.mastery.get(answer.skill);
    next.mastery.set(answer.skill, current + delta);

    next.history.push(*answer);
    next.recent_accuracy = next.history.recent_accuracy();
    next.target_difficulty = ratchet(next.target_difficulty, next.recent_accuracy);

    debug!(
        skill = %answer.skill,
        correct = answer.correct,
        mastery = next.mastery.get(answer.skill),
        recent_accuracy = next.recent_accuracy,
        target_difficulty = %next.target_difficulty,
        "Learning state transitioned"
    );

    next
}

impl LearningState {
    /// Parses a serialized snapshot.
    ///
    /// Unparseable text is treated exactly like having no prior state.
    #[must_use]
    pub fn from_snapshot(text: &str) -> Self {
        match serde_json::from_str::<PartialLearningState>(text) {
            Ok(partial) => initialize(Some(partial)),
            Err(e) => {
                warn!(error = %e, "Corrupt learning state snapshot, starting fresh");
                Self::default()
            }
        }
    }

    /// Serializes the state to its snapshot form.
    pub fn to_snapshot(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Returns the state that follows this one after `answer`.
    #[must_use]
    pub fn transition(&self, answer: &AnswerRecord) -> Self {
        transition(self, answer)
    }

    /// Returns a copy with the focus override replaced.
    ///
    /// Duplicates are removed, keeping first occurrence order. An empty list
    /// clears the override.
    #[must_use]
    pub fn with_focus(&self, focus: impl IntoIterator<Item = Skill>) -> Self {
        let mut deduped: Vec<Skill> = Vec::new();
        for skill in focus {
            if !deduped.contains(&skill) {
                deduped.push(skill);
            }
        }
        Self {
            focus: deduped,
            ..self.clone()
        }
    }

    /// Per-skill mastery.
    #[must_use]
    pub const fn mastery(&self) -> &MasteryMap {
        &self.mastery
    }

    /// Fraction of correct answers among the most recent answers.
    #[must_use]
    pub const fn recent_accuracy(&self) -> f64 {
        self.recent_accuracy
    }

    /// Difficulty the learner is currently working at.
    #[must_use]
    pub const fn target_difficulty(&self) -> Difficulty {
        self.target_difficulty
    }

    /// Recorded answers, oldest first.
    #[must_use]
    pub const fn history(&self) -> &AnswerHistory {
        &self.history
    }

    /// Explicit override of the skills eligible for selection.
    #[must_use]
    pub fn focus(&self) -> &[Skill] {
        &self.focus
    }
}

// ============================================================================
// Tests
// ============================================================================
