//! End-to-end tests for the adaptive learning loop.
//!
//! These tests drive the public engine API the way a front end does:
//! initialize or load a state, answer questions, and check that mastery,
//! accuracy and difficulty evolve as expected and survive a restart.

use std::path::PathBuf;

use serde_json::json;
use tutor_engine::{
    initialize, judge_answer, select_target, AnswerRecord, Difficulty, FileStore, FixedSequence,
    KeyValueStore, LearningState, OfflineGenerator, PartialLearningState, QuestionSource,
    SelectionPolicy, Session, Skill, HISTORY_CAPACITY, MASTERY_STEP,
};
use tutor_report::{MarkdownGenerator, ProgressReport};

/// Creates an empty, unique directory under the system temp dir.
fn temp_state_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tutor-it-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn answer(skill: Skill, difficulty: u8, correct: bool) -> AnswerRecord {
    AnswerRecord::new(skill, Difficulty::new(i64::from(difficulty)), correct)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ============================================================================
// State Transition Properties
// ============================================================================

/// A partial snapshot holding one mastery value leaves everything else at defaults.
#[test]
fn test_initialize_from_single_mastery_entry() {
    for skill in Skill::ALL {
        let partial: PartialLearningState =
            serde_json::from_value(json!({ "mastery": { skill.as_str(): 0.9 } }))
                .expect("partial snapshot should parse");
        let state = initialize(Some(partial));

        for other in Skill::ALL {
            let expected = if other == skill { 0.9 } else { 0.45 };
            assert!(close(state.mastery().get(other), expected), "{other}");
        }
        assert!(state.history().is_empty());
    }
}

/// A correct answer adds a fixed step to the skill's mastery; an incorrect one subtracts it.
#[test]
fn test_transition_moves_mastery_by_one_step() {
    for start in [0.0, 0.3, 0.45, 0.9, 1.0] {
        let state = initialize(Some(
            PartialLearningState::default().with_mastery(Skill::TimeToHalfHour, start),
        ));

        let up = state.transition(&answer(Skill::TimeToHalfHour, 4, true));
        let down = state.transition(&answer(Skill::TimeToHalfHour, 4, false));

        assert!(close(
            up.mastery().get(Skill::TimeToHalfHour),
            (start + MASTERY_STEP).clamp(0.0, 1.0)
        ));
        assert!(close(
            down.mastery().get(Skill::TimeToHalfHour),
            (start - MASTERY_STEP).clamp(0.0, 1.0)
        ));
        assert!(close(up.mastery().get(Skill::AddWithin20), 0.45));
    }
}

/// History never grows past its capacity and evicts oldest answers first.
#[test]
fn test_history_is_bounded_fifo() {
    let mut state = initialize(None);
    for i in 0..25u8 {
        state = state.transition(&answer(Skill::ALL[usize::from(i) % 9], i % 10 + 1, i % 2 == 0));
        assert!(state.history().len() <= HISTORY_CAPACITY);
    }

    assert_eq!(state.history().len(), HISTORY_CAPACITY);
    let first = state.history().iter().next().expect("history is not empty");
    assert_eq!(*first, answer(Skill::ALL[5], 6, false));
}

/// Recent accuracy is always the correct fraction of the last ten answers.
#[test]
#[allow(clippy::cast_precision_loss)]
fn test_recent_accuracy_tracks_last_ten_answers() {
    let pattern = [true, false, false, true, true, true, false, true, false, false, true, true, false];
    let mut state = initialize(None);

    for correct in pattern {
        state = state.transition(&answer(Skill::AddWithin20, 4, correct));

        let window = state.history().recent(10);
        let hits = window.iter().filter(|r| r.correct).count();
        assert!(close(state.recent_accuracy(), hits as f64 / window.len() as f64));
    }
}

/// Difficulty stays on the ladder however long the run.
#[test]
fn test_difficulty_stays_in_range() {
    let mut state = initialize(None);
    for i in 0..200u32 {
        let correct = (i / 15) % 2 == 0;
        state = state.transition(&answer(Skill::SubtractWithin20, 10, correct));
        let d = state.target_difficulty().get();
        assert!((1..=10).contains(&d), "difficulty {d} out of range");
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_ten_correct_answers_reach_the_top() {
    let mut state = initialize(None);
    for _ in 0..10 {
        state = state.transition(&answer(Skill::AddWithin20, 4, true));
    }

    assert!(close(state.mastery().get(Skill::AddWithin20), 1.0));
    assert!(close(state.recent_accuracy(), 1.0));
    assert_eq!(state.target_difficulty().get(), 10);
}

#[test]
fn test_ten_incorrect_answers_reach_the_bottom() {
    let mut state = initialize(None);
    for _ in 0..10 {
        state = state.transition(&answer(Skill::AddWithin20, 4, false));
    }

    assert!(close(state.mastery().get(Skill::AddWithin20), 0.0));
    assert!(close(state.recent_accuracy(), 0.0));
    assert_eq!(state.target_difficulty().get(), 1);
}

#[test]
fn test_answers_are_judged_by_trimmed_text() {
    assert!(judge_answer(" 16 ", "16"));
    assert!(!judge_answer("sixteen", "16"));
}

#[test]
fn test_weakest_first_picks_lowest_mastery() {
    let state = initialize(Some(
        PartialLearningState::default()
            .with_mastery(Skill::MeasurementLength, 0.2)
            .with_mastery(Skill::ShapesAttributes, 0.9),
    ));

    let target = select_target(
        &state,
        SelectionPolicy::WeakestFirst,
        &mut FixedSequence::new(vec![0]),
    );
    assert_eq!(target.skill, Skill::MeasurementLength);
    assert_eq!(target.difficulty.get(), 4);
}

#[test]
fn test_random_policy_follows_injected_sequence() {
    let state = initialize(Some(
        PartialLearningState::default()
            .with_mastery(Skill::MeasurementLength, 0.1)
            .with_mastery(Skill::ShapesAttributes, 0.2)
            .with_mastery(Skill::TimeToHalfHour, 0.3),
    ));
    let mut random = FixedSequence::new(vec![2, 1, 0]);
    let policy = SelectionPolicy::RandomAmongWeakest { pool: 3 };

    let picks: Vec<Skill> = (0..3)
        .map(|_| select_target(&state, policy, &mut random).skill)
        .collect();
    assert_eq!(
        picks,
        vec![
            Skill::TimeToHalfHour,
            Skill::ShapesAttributes,
            Skill::MeasurementLength
        ]
    );
}

// ============================================================================
// Persistence
// ============================================================================

/// Progress made in one session is picked up by the next one.
#[tokio::test]
async fn test_session_progress_survives_restart() {
    let dir = temp_state_dir("restart");

    {
        let mut session = Session::bootstrap_with_policy(
            "learningState",
            SelectionPolicy::WeakestFirst,
            Box::new(FileStore::new(&dir)),
            Box::new(FixedSequence::new(vec![0])),
        )
        .expect("bootstrap should succeed");

        for _ in 0..3 {
            let source = session.load_next(&OfflineGenerator).await;
            assert_eq!(source, QuestionSource::Fallback);

            let expected = session
                .current_question()
                .expect("a question is loaded")
                .correct_answer
                .clone();
            let feedback = session.submit_answer(&expected).expect("question was pending");
            assert!(feedback.correct);
        }
    }

    let store = FileStore::new(&dir);
    assert!(store.get("learningState").expect("store readable").is_some());

    let session = Session::bootstrap_with_policy(
        "learningState",
        SelectionPolicy::WeakestFirst,
        Box::new(store),
        Box::new(FixedSequence::new(vec![0])),
    )
    .expect("bootstrap should succeed");

    let state = session.state();
    assert_eq!(state.history().len(), 3);
    assert!(close(state.recent_accuracy(), 1.0));
    assert_eq!(state.target_difficulty().get(), 7);

    let _ = std::fs::remove_dir_all(&dir);
}

/// A corrupt snapshot on disk starts the learner over instead of failing.
#[test]
fn test_corrupt_snapshot_falls_back_to_defaults() {
    let dir = temp_state_dir("corrupt");
    let mut store = FileStore::new(&dir);
    store
        .set("learningState", "{ this is not json")
        .expect("write should succeed");

    let session = Session::bootstrap_with_policy(
        "learningState",
        SelectionPolicy::WeakestFirst,
        Box::new(store),
        Box::new(FixedSequence::new(vec![0])),
    )
    .expect("bootstrap should succeed");

    assert_eq!(*session.state(), LearningState::default());

    let _ = std::fs::remove_dir_all(&dir);
}

/// A hand-edited snapshot with stray fields and bad entries still loads.
#[test]
fn test_lenient_snapshot_from_disk() {
    let dir = temp_state_dir("lenient");
    let mut store = FileStore::new(&dir);
    let snapshot = json!({
        "mastery": { "add_within_20": 1.7, "geometry": 0.1, "time_to_half_hour": "high" },
        "recent_accuracy": 0.8,
        "target_difficulty": 12,
        "history": [
            { "skill": "add_within_20", "difficulty": 3, "correct": true },
            { "skill": "geometry", "difficulty": 3, "correct": true },
            { "skill": "add_within_20", "difficulty": 4, "correct": "yes" }
        ],
        "focus": ["add_within_20", "geometry"],
        "theme": "dark"
    });
    store
        .set("learningState", &snapshot.to_string())
        .expect("write should succeed");

    let session = Session::bootstrap_with_policy(
        "learningState",
        SelectionPolicy::WeakestFirst,
        Box::new(store),
        Box::new(FixedSequence::new(vec![0])),
    )
    .expect("bootstrap should succeed");
    let state = session.state();

    assert!(close(state.mastery().get(Skill::AddWithin20), 1.0));
    assert!(close(state.mastery().get(Skill::TimeToHalfHour), 0.45));
    assert_eq!(state.target_difficulty().get(), 10);
    assert_eq!(state.history().len(), 1);
    assert_eq!(state.focus(), &[Skill::AddWithin20]);

    let _ = std::fs::remove_dir_all(&dir);
}

// ============================================================================
// Reports
// ============================================================================

#[test]
fn test_report_reflects_practice() {
    let mut state = initialize(None);
    for correct in [true, true, false] {
        state = state.transition(&answer(Skill::PlaceValueTensOnes, 4, correct));
    }

    let report = ProgressReport::new("learningState", &state);
    assert_eq!(report.answers_recorded, 3);
    assert_eq!(report.answers_correct, 2);
    assert_eq!(report.recent_accuracy_percent, 66);
    assert_eq!(
        report
            .skill(Skill::PlaceValueTensOnes)
            .expect("every skill is reported")
            .mastery_percent,
        63
    );

    let markdown = MarkdownGenerator::new(&report).generate();
    assert!(markdown.contains("| place value tens ones | 63% |"));
    assert!(markdown.contains("| Recent Accuracy | 66% |"));
}
