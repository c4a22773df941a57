//! The per-learner session driver.
//!
//! A [`Session`] owns the learning state for one learner and sequences the
//! answer loop: select a target, obtain a question, judge the answer,
//! transition and persist. It assumes a single writer; hosts that share a
//! session across tasks wrap it in a mutex.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::generator::{resolve_response, QuestionGenerator, QuestionSource};
use crate::learning_state::{AnswerRecord, LearningState};
use crate::question::Question;
use crate::random::RandomSource;
use crate::selector::{GenerationRequest, SelectionPolicy, Selector};
use crate::skill::Skill;
use crate::storage::{load_state, save_state, KeyValueStore};

/// Outcome of a submitted answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerFeedback {
    /// Id of the question that was answered.
    pub question_id: String,
    /// Whether the answer matched.
    pub correct: bool,
    /// The expected answer.
    pub correct_answer: String,
    /// Explanation to show the learner.
    pub explanation: String,
}

/// One learner's adaptive session.
pub struct Session {
    session_key: String,
    store: Box<dyn KeyValueStore>,
    selector: Selector,
    state: LearningState,
    current: Option<Question>,
    last_request_id: u64,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_key", &self.session_key)
            .field("selector", &self.selector)
            .field("state", &self.state)
            .field("current", &self.current)
            .field("last_request_id", &self.last_request_id)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Loads the stored state for `config.session_key`, or starts fresh.
    ///
    /// A corrupt snapshot is treated as no prior state.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn bootstrap(
        config: &Config,
        store: Box<dyn KeyValueStore>,
        random: Box<dyn RandomSource>,
    ) -> Result<Self> {
        Self::bootstrap_with_policy(&config.session_key, config.selection_policy(), store, random)
    }

    /// Like [`Session::bootstrap`], with the key and policy given directly.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn bootstrap_with_policy(
        session_key: &str,
        policy: SelectionPolicy,
        store: Box<dyn KeyValueStore>,
        random: Box<dyn RandomSource>,
    ) -> Result<Self> {
        let state = load_state(store.as_ref(), session_key)?;

        info!(
            session_key,
            policy = ?policy,
            answers = state.history().len(),
            target_difficulty = %state.target_difficulty(),
            "Session bootstrapped"
        );

        Ok(Self {
            session_key: session_key.to_string(),
            store,
            selector: Selector::new(policy, random),
            state,
            current: None,
            last_request_id: 0,
        })
    }

    /// The current learning state.
    #[must_use]
    pub const fn state(&self) -> &LearningState {
        &self.state
    }

    /// The question awaiting an answer, if any.
    #[must_use]
    pub const fn current_question(&self) -> Option<&Question> {
        self.current.as_ref()
    }

    /// The selection policy fixed at bootstrap.
    #[must_use]
    pub const fn policy(&self) -> SelectionPolicy {
        self.selector.policy()
    }

    /// Selects the next target and issues a request with a fresh id.
    ///
    /// Issuing a request makes any earlier outstanding request stale.
    pub fn prepare_request(&mut self) -> GenerationRequest {
        self.last_request_id += 1;
        self.selector.prepare(&self.state, self.last_request_id)
    }

    /// Accepts a generator outcome for `request`.
    ///
    /// The outcome is repaired, or replaced by a local fallback, and becomes
    /// the current question. Returns `None` and changes nothing if a newer
    /// request has been issued since.
    pub fn accept_question(
        &mut self,
        request: &GenerationRequest,
        response: Result<Value>,
    ) -> Option<QuestionSource> {
        if request.request_id != self.last_request_id {
            debug!(
                request_id = request.request_id,
                latest = self.last_request_id,
                "Discarding stale question"
            );
            return None;
        }

        let (question, source) = resolve_response(request, response);
        self.current = Some(question);
        Some(source)
    }

    /// Prepares a request, asks `generator`, and installs the result.
    ///
    /// Always ends with a current question; generator failures are replaced
    /// by a local fallback.
    pub async fn load_next(&mut self, generator: &dyn QuestionGenerator) -> QuestionSource {
        let request = self.prepare_request();
        let response = generator.generate(&self.state, &request).await;
        let (question, source) = resolve_response(&request, response);
        self.current = Some(question);
        source
    }

    /// Judges `raw` against the current question and advances the state.
    ///
    /// The question is consumed. Returns `None` if no question is awaiting an
    /// answer. A failure to persist the new state is logged, not returned.
    pub fn submit_answer(&mut self, raw: &str) -> Option<AnswerFeedback> {
        let question = self.current.take()?;
        let correct = question.judge(raw);

        let record = AnswerRecord::new(question.skill, question.difficulty, correct);
        self.state = self.state.transition(&record);

        info!(
            question_id = %question.id,
            skill = %question.skill,
            correct,
            mastery = self.state.mastery().get(question.skill),
            target_difficulty = %self.state.target_difficulty(),
            "Answer recorded"
        );

        self.persist_logged();

        Some(AnswerFeedback {
            question_id: question.id,
            correct,
            correct_answer: question.correct_answer,
            explanation: question.explanation,
        })
    }

    /// Replaces the focus override; an empty list clears it.
    pub fn set_focus(&mut self, skills: impl IntoIterator<Item = Skill>) {
        self.state = self.state.with_focus(skills);
        info!(focus = ?self.state.focus(), "Focus updated");
        self.persist_logged();
    }

    /// Discards all progress and the stored snapshot.
    pub fn reset(&mut self) {
        self.state = LearningState::default();
        self.current = None;
        if let Err(e) = self.store.remove(&self.session_key) {
            warn!(session_key = %self.session_key, error = %e, "Failed to remove stored learning state");
        }
        info!(session_key = %self.session_key, "Session reset");
    }

    /// Writes the current state to the store.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the store write fails.
    pub fn persist(&mut self) -> Result<()> {
        save_state(self.store.as_mut(), &self.session_key, &self.state)
    }

    fn persist_logged(&mut self) {
        if let Err(e) = self.persist() {
            warn!(session_key = %self.session_key, error = %e, "Failed to persist learning state");
        }
    }
}
