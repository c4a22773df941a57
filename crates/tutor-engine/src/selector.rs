//! Question selection: which skill to practise next, and how hard.
//!
//! A [`Selector`] applies one [`SelectionPolicy`] for its whole lifetime.
//! Target difficulty is the state's target re-run through the accuracy
//! ratchet, so a streak keeps pushing difficulty between transitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::learning_state::{ratchet, LearningState, ACCURACY_WINDOW};
use crate::random::RandomSource;
use crate::skill::{Difficulty, Skill};

/// Default candidate pool size for [`SelectionPolicy::RandomAmongWeakest`].
pub const DEFAULT_CANDIDATE_POOL: usize = 3;

/// How the next target skill is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// The first focus skill if any, else the lowest-mastery skill.
    ///
    /// Fully deterministic; ties go to the earlier skill in the curriculum.
    #[default]
    WeakestFirst,
    /// Uniform choice among the focus skills if any, else among the `pool`
    /// lowest-mastery skills.
    RandomAmongWeakest {
        /// Number of weakest skills eligible when no focus is set.
        pool: usize,
    },
}

/// The skill and difficulty the next question should target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Skill to practise.
    pub skill: Skill,
    /// Difficulty to ask at.
    pub difficulty: Difficulty,
}

/// Chooses the next target for `state` under `policy`.
///
/// `random` is only consulted by [`SelectionPolicy::RandomAmongWeakest`].
///
/// # Examples
///
/// ```
/// use tutor_engine::{initialize, select_target, FixedSequence, SelectionPolicy, Skill};
///
/// let state = initialize(None).with_focus([Skill::TimeToHalfHour]);
/// let target = select_target(&state, SelectionPolicy::WeakestFirst, &mut FixedSequence::new(vec![0]));
/// assert_eq!(target.skill, Skill::TimeToHalfHour);
/// ```
pub fn select_target(
    state: &LearningState,
    policy: SelectionPolicy,
    random: &mut dyn RandomSource,
) -> Target {
    let ranked = state.mastery().ranked();
    let focus = state.focus();

    let skill = match policy {
        SelectionPolicy::WeakestFirst => focus
            .first()
            .copied()
            .unwrap_or_else(|| ranked.first().map_or(Skill::ALL[0], |(s, _)| *s)),
        SelectionPolicy::RandomAmongWeakest { pool } => {
            let candidates: Vec<Skill> = if focus.is_empty() {
                ranked.iter().take(pool.max(1)).map(|(s, _)| *s).collect()
            } else {
                focus.to_vec()
            };
            let index = random.pick(candidates.len());
            candidates.get(index).copied().unwrap_or(Skill::ALL[0])
        }
    };

    let difficulty = ratchet(state.target_difficulty(), state.recent_accuracy());

    debug!(
        skill = %skill,
        difficulty = %difficulty,
        policy = ?policy,
        focused = !focus.is_empty(),
        "Selected next target"
    );

    Target { skill, difficulty }
}

// ============================================================================
// GenerationRequest
// ============================================================================

/// Descriptor handed to the external question generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Per-session sequence number; responses for older ids are stale.
    pub request_id: u64,
    /// Skill the question must target.
    pub skill: Skill,
    /// Difficulty the question should be asked at.
    pub difficulty: Difficulty,
    /// Mastery for every skill at the time of the request.
    pub mastery_snapshot: BTreeMap<Skill, f64>,
    /// The most recent answers in compact `skill@difficulty:✓|✗` form, joined by `, `.
    pub recent_history_summary: String,
}

impl GenerationRequest {
    /// Packages a request for `target` from the current `state`.
    #[must_use]
    pub fn new(state: &LearningState, target: Target, request_id: u64) -> Self {
        let recent_history_summary = state
            .history()
            .recent(ACCURACY_WINDOW)
            .iter()
            .map(crate::learning_state::AnswerRecord::compact)
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            request_id,
            skill: target.skill,
            difficulty: target.difficulty,
            mastery_snapshot: state.mastery().iter().collect(),
            recent_history_summary,
        }
    }

    /// The target this request was built for.
    #[must_use]
    pub const fn target(&self) -> Target {
        Target {
            skill: self.skill,
            difficulty: self.difficulty,
        }
    }
}

// ============================================================================
// Selector
// ============================================================================

/// A selection policy bound to its random source.
pub struct Selector {
    policy: SelectionPolicy,
    random: Box<dyn RandomSource>,
}

impl std::fmt::Debug for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selector")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Selector {
    /// Creates a selector that uses `policy` for every call.
    #[must_use]
    pub fn new(policy: SelectionPolicy, random: Box<dyn RandomSource>) -> Self {
        Self { policy, random }
    }

    /// The policy this selector applies.
    #[must_use]
    pub const fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Chooses the next target for `state`.
    pub fn select(&mut self, state: &LearningState) -> Target {
        select_target(state, self.policy, self.random.as_mut())
    }

    /// Chooses the next target and packages it as a generator request.
    pub fn prepare(&mut self, state: &LearningState, request_id: u64) -> GenerationRequest {
        let target = self.select(state);
        GenerationRequest::new(state, target, request_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::learning_state::{initialize, AnswerRecord, PartialLearningState};
    use crate::random::FixedSequence;

    fn state_with(mastery: &[(Skill, f64)]) -> LearningState {
        let partial = mastery
            .iter()
            .fold(PartialLearningState::default(), |p, (s, m)| p.with_mastery(*s, *m));
        initialize(Some(partial))
    }

    fn scripted(values: &[usize]) -> FixedSequence {
        FixedSequence::new(values.to_vec())
    }

    // ------------------------------------------------------------------------
    // Weakest-first tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_weakest_first_picks_lowest_mastery() {
        let mastery: Vec<(Skill, f64)> = Skill::ALL
            .into_iter()
            .map(|s| (s, if s == Skill::AddWithin20 { 0.2 } else { 0.9 }))
            .collect();
        let state = state_with(&mastery);

        let target = select_target(&state, SelectionPolicy::WeakestFirst, &mut scripted(&[0]));
        assert_eq!(target.skill, Skill::AddWithin20);
    }

    #[test]
    fn test_weakest_first_two_skill_scenario() {
        let state = state_with(&[(Skill::AddWithin20, 0.2), (Skill::SubtractWithin20, 0.9)]);

        let target = select_target(&state, SelectionPolicy::WeakestFirst, &mut scripted(&[0]));
        assert_eq!(target.skill, Skill::AddWithin20);
    }

    #[test]
    fn test_weakest_first_ties_go_to_curriculum_order() {
        let state = initialize(None);
        let target = select_target(&state, SelectionPolicy::WeakestFirst, &mut scripted(&[5]));
        assert_eq!(target.skill, Skill::CountingWithin120);
    }

    #[test]
    fn test_weakest_first_focus_overrides_ranking() {
        let state = state_with(&[(Skill::AddWithin20, 0.0)])
            .with_focus([Skill::ShapesAttributes, Skill::TimeToHalfHour]);

        let target = select_target(&state, SelectionPolicy::WeakestFirst, &mut scripted(&[1]));
        assert_eq!(target.skill, Skill::ShapesAttributes);
    }

    #[test]
    fn test_weakest_first_is_deterministic() {
        let state = state_with(&[(Skill::MeasurementLength, 0.1)]);
        let first = select_target(&state, SelectionPolicy::WeakestFirst, &mut scripted(&[0]));
        let second = select_target(&state, SelectionPolicy::WeakestFirst, &mut scripted(&[2]));
        assert_eq!(first, second);
    }

    // ------------------------------------------------------------------------
    // Random-among-weakest tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_random_policy_pool_of_weakest() {
        let state = state_with(&[
            (Skill::TimeToHalfHour, 0.1),
            (Skill::ShapesAttributes, 0.2),
            (Skill::MeasurementLength, 0.3),
        ]);
        let policy = SelectionPolicy::RandomAmongWeakest { pool: 3 };
        let mut random = scripted(&[0, 1, 2, 3]);

        let picks: Vec<Skill> = (0..4)
            .map(|_| select_target(&state, policy, &mut random).skill)
            .collect();

        assert_eq!(
            picks,
            vec![
                Skill::TimeToHalfHour,
                Skill::ShapesAttributes,
                Skill::MeasurementLength,
                Skill::TimeToHalfHour,
            ]
        );
    }

    #[test]
    fn test_random_policy_uses_focus_as_pool() {
        let state = initialize(None).with_focus([Skill::FractionsHalvesQuarters, Skill::AddWithin20]);
        let policy = SelectionPolicy::RandomAmongWeakest { pool: 3 };

        let target = select_target(&state, policy, &mut scripted(&[1]));
        assert_eq!(target.skill, Skill::AddWithin20);
    }

    #[test]
    fn test_random_policy_zero_pool_behaves_as_one() {
        let state = state_with(&[(Skill::WordProblemsAddSub, 0.05)]);
        let policy = SelectionPolicy::RandomAmongWeakest { pool: 0 };

        let target = select_target(&state, policy, &mut scripted(&[7]));
        assert_eq!(target.skill, Skill::WordProblemsAddSub);
    }

    // ------------------------------------------------------------------------
    // Difficulty tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_fresh_state_target_keeps_start_difficulty() {
        // Default accuracy 0.6 sits inside the hold band.
        let target = select_target(&initialize(None), SelectionPolicy::WeakestFirst, &mut scripted(&[0]));
        assert_eq!(target.difficulty, Difficulty::START);
    }

    #[test]
    fn test_selection_reapplies_ratchet() {
        let mut state = initialize(None);
        state = state.transition(&AnswerRecord::new(Skill::AddWithin20, Difficulty::START, true));
        assert_eq!(state.target_difficulty().get(), 5);

        let target = select_target(&state, SelectionPolicy::WeakestFirst, &mut scripted(&[0]));
        assert_eq!(target.difficulty.get(), 6);

        let mut low = initialize(None);
        low = low.transition(&AnswerRecord::new(Skill::AddWithin20, Difficulty::START, false));
        let target = select_target(&low, SelectionPolicy::WeakestFirst, &mut scripted(&[0]));
        assert_eq!(target.difficulty.get(), 2);
    }

    #[test]
    fn test_selection_difficulty_stays_on_ladder() {
        let mut state = initialize(None);
        for _ in 0..15 {
            state = state.transition(&AnswerRecord::new(Skill::AddWithin20, Difficulty::MAX, true));
        }
        let target = select_target(&state, SelectionPolicy::WeakestFirst, &mut scripted(&[0]));
        assert_eq!(target.difficulty, Difficulty::MAX);
    }

    // ------------------------------------------------------------------------
    // Request tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_request_summary_uses_last_ten_answers() {
        let mut state = initialize(None);
        for i in 0..12 {
            state = state.transition(&AnswerRecord::new(
                Skill::SubtractWithin20,
                Difficulty::new(3),
                i % 2 == 0,
            ));
        }
        let mut selector = Selector::new(SelectionPolicy::WeakestFirst, Box::new(scripted(&[0])));
        let request = selector.prepare(&state, 7);

        assert_eq!(request.request_id, 7);
        let entries: Vec<&str> = request.recent_history_summary.split(", ").collect();
        assert_eq!(entries.len(), 10);
        assert_eq!(entries[0], "subtract_within_20@3:✓");
        assert_eq!(entries[9], "subtract_within_20@3:✗");
        assert_eq!(request.mastery_snapshot.len(), 9);
    }

    #[test]
    fn test_request_empty_history_summary() {
        let mut selector = Selector::new(SelectionPolicy::default(), Box::new(scripted(&[0])));
        let request = selector.prepare(&initialize(None), 1);

        assert_eq!(request.recent_history_summary, "");
        assert_eq!(request.target().skill, Skill::CountingWithin120);
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let mut selector = Selector::new(SelectionPolicy::WeakestFirst, Box::new(scripted(&[0])));
        let json = serde_json::to_value(selector.prepare(&initialize(None), 3)).unwrap();

        assert_eq!(json["requestId"], json!(3));
        assert_eq!(json["skill"], json!("counting_within_120"));
        assert_eq!(json["difficulty"], json!(4));
        assert_eq!(json["masterySnapshot"]["add_within_20"], json!(0.45));
        assert_eq!(json["recentHistorySummary"], json!(""));
    }
}
