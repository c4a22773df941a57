//! The external question generator boundary.
//!
//! Question content is produced elsewhere. This module defines the trait the
//! engine calls, an HTTP implementation, and the two-stage
//! fetch-then-fallback that guarantees a question is always available.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, TutorError};
use crate::learning_state::LearningState;
use crate::question::{extract_json, fallback_question, repair, Question};
use crate::selector::GenerationRequest;

/// Something that can produce a raw question for a request.
///
/// Implementations return the response body as JSON; repair and fallback are
/// applied by the caller.
pub trait QuestionGenerator: Send + Sync {
    /// Requests a question for `request`.
    fn generate<'a>(
        &'a self,
        state: &'a LearningState,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<Value>>;
}

/// Where a delivered question came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionSource {
    /// Produced by the external generator (possibly repaired).
    Generated,
    /// Synthesised locally after the generator failed or was unavailable.
    Fallback,
}

/// Obtains a question for `request`, falling back to a local one on any failure.
///
/// Never fails: transport errors, bad statuses and schema mismatches all
/// resolve to [`fallback_question`].
pub async fn fetch_or_fallback(
    generator: &dyn QuestionGenerator,
    state: &LearningState,
    request: &GenerationRequest,
) -> (Question, QuestionSource) {
    let response = generator.generate(state, request).await;
    resolve_response(request, response)
}

/// Turns a generator outcome into a question: repaired on success, local
/// fallback on any failure.
pub fn resolve_response(
    request: &GenerationRequest,
    response: Result<Value>,
) -> (Question, QuestionSource) {
    match response.and_then(|raw| repair(&raw, request.target())) {
        Ok(question) => {
            debug!(
                request_id = request.request_id,
                question_id = %question.id,
                skill = %question.skill,
                "Generated question accepted"
            );
            (question, QuestionSource::Generated)
        }
        Err(TutorError::GeneratorUnavailable) => {
            debug!(request_id = request.request_id, "No generator configured, using local question");
            (
                fallback_question(request.target(), request.request_id),
                QuestionSource::Fallback,
            )
        }
        Err(e) => {
            warn!(
                request_id = request.request_id,
                skill = %request.skill,
                transient = e.is_transient(),
                error = %e,
                "Question generation failed, using local question"
            );
            (
                fallback_question(request.target(), request.request_id),
                QuestionSource::Fallback,
            )
        }
    }
}

// ============================================================================
// OfflineGenerator
// ============================================================================

/// A generator that is never available.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineGenerator;

impl QuestionGenerator for OfflineGenerator {
    fn generate<'a>(
        &'a self,
        _state: &'a LearningState,
        _request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<Value>> {
        futures::future::ready(Err(TutorError::GeneratorUnavailable)).boxed()
    }
}

// ============================================================================
// HttpGenerator
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeneratePayload<'a> {
    learning_state: &'a LearningState,
    request: &'a GenerationRequest,
}

/// Posts `{learningState, request}` to an HTTP endpoint and reads a question back.
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    client: Client,
    endpoint: String,
}

impl HttpGenerator {
    /// Creates a generator for `endpoint` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TutorError::generator_transport(e.to_string(), false))?;

        info!(endpoint = %endpoint, timeout_secs = timeout.as_secs(), "HTTP question generator configured");
        Ok(Self { client, endpoint })
    }

    /// The endpoint questions are requested from.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, state: &LearningState, request: &GenerationRequest) -> Result<Value> {
        let payload = GeneratePayload {
            learning_state: state,
            request,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| TutorError::generator_transport(e.to_string(), e.is_timeout()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TutorError::generator_transport(e.to_string(), e.is_timeout()))?;

        if !status.is_success() {
            return Err(TutorError::generator_status(status.as_u16(), body));
        }

        extract_json(&body)
            .ok_or_else(|| TutorError::malformed_question("response body is not JSON"))
    }
}

impl QuestionGenerator for HttpGenerator {
    fn generate<'a>(
        &'a self,
        state: &'a LearningState,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<Value>> {
        self.post(state, request).boxed()
    }
}
