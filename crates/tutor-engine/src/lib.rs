//! Adaptive Tutor Engine
//!
//! Tracks per-skill mastery for a Grade 1 math learner, adapts the target
//! difficulty after every answer, and selects the next skill to practise.
//! Question content comes from an external generator with a local fallback.

pub mod api;
pub mod config;
pub mod error;
pub mod generator;
pub mod learning_state;
pub mod question;
pub mod random;
pub mod selector;
pub mod session;
pub mod skill;
pub mod storage;

pub use api::{
    create_router, AnswerRequest, AnswerResponse, AppState, CurrentQuestionResponse,
    ErrorResponse, FocusRequest, NextQuestionResponse,
};
pub use config::{Config, GeneratorConfig, PolicyKind};
pub use error::{Result, TutorError};
pub use generator::{
    fetch_or_fallback, resolve_response, HttpGenerator, OfflineGenerator, QuestionGenerator,
    QuestionSource,
};
pub use learning_state::{
    initialize, ratchet, transition, AnswerHistory, AnswerRecord, LearningState, MasteryMap,
    PartialLearningState, ACCURACY_WINDOW, DEFAULT_RECENT_ACCURACY, HISTORY_CAPACITY,
    LOWER_THRESHOLD, MASTERY_STEP, RAISE_THRESHOLD, START_MASTERY, UNSET_MASTERY,
};
pub use question::{
    extract_json, fallback_question, judge_answer, repair, Question, QuestionFormat, CHOICE_COUNT,
};
pub use random::{FixedSequence, RandomSource, SeededRandom, ThreadRandom};
pub use selector::{
    select_target, GenerationRequest, SelectionPolicy, Selector, Target, DEFAULT_CANDIDATE_POOL,
};
pub use session::{AnswerFeedback, Session};
pub use skill::{Difficulty, Skill, UnknownSkill};
pub use storage::{load_state, save_state, FileStore, KeyValueStore, MemoryStore};
