//! Integration tests for the HTTP question generator and the tutor API.
//!
//! A small axum server stands in for the external question generator. The
//! tests check that generated questions are repaired and served, and that
//! every kind of generator failure ends in a local fallback question.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use tutor_engine::{
    create_router, fetch_or_fallback, AppState, FixedSequence, HttpGenerator, LearningState,
    MemoryStore, QuestionFormat, QuestionGenerator, QuestionSource, SelectionPolicy, Selector,
    Session, Skill, TutorError,
};

// ============================================================================
// Generator Stub
// ============================================================================

/// Echoes the requested skill back with an out-of-range difficulty.
async fn generate_ok(Json(payload): Json<Value>) -> Json<Value> {
    let request = &payload["request"];
    Json(json!({
        "id": format!("gen-{}", request["requestId"]),
        "skill": request["skill"],
        "difficulty": 42,
        "format": "numeric",
        "stem": "What is 10 + 5?",
        "correct_answer": 15,
        "explanation": "10 and 5 more is 15."
    }))
}

async fn generate_error() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "model overloaded")
}

async fn generate_prose() -> String {
    concat!(
        "Sure! Here is a question:\n",
        r#"{"id": "p1", "skill": "time_to_half_hour", "format": "multiple_choice", "#,
        r#""stem": "What time is it?", "choices": ["3:00", "3:30", "4:00", "4:30"], "#,
        r#""correct_answer": "3:30", "explanation": "The long hand points at 6."}"#,
        "\nGood luck!"
    )
    .to_string()
}

async fn generate_missing_stem() -> Json<Value> {
    Json(json!({ "id": "x1", "correct_answer": "3" }))
}

async fn generate_slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({ "id": "late", "stem": "Too late?", "correct_answer": "1" }))
}

/// Starts the generator stub and returns its base URL.
async fn spawn_generator_stub() -> String {
    let router = Router::new()
        .route("/ok", post(generate_ok))
        .route("/error", post(generate_error))
        .route("/prose", post(generate_prose))
        .route("/missing-stem", post(generate_missing_stem))
        .route("/slow", post(generate_slow));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    format!("http://{addr}")
}

/// Returns a URL nothing is listening on.
fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let addr: SocketAddr = listener.local_addr().expect("Failed to get local addr");
    drop(listener);
    format!("http://{addr}/generate")
}

fn generator(url: &str) -> HttpGenerator {
    HttpGenerator::new(url, Duration::from_secs(2)).expect("Failed to build client")
}

fn weakest_first() -> Selector {
    Selector::new(
        SelectionPolicy::WeakestFirst,
        Box::new(FixedSequence::new(vec![0])),
    )
}

// ============================================================================
// HttpGenerator
// ============================================================================

#[tokio::test]
async fn test_generated_question_is_repaired() {
    let base = spawn_generator_stub().await;
    let state = LearningState::default();
    let request = weakest_first().prepare(&state, 7);

    let (question, source) = fetch_or_fallback(&generator(&format!("{base}/ok")), &state, &request).await;

    assert_eq!(source, QuestionSource::Generated);
    assert_eq!(question.id, "gen-7");
    assert_eq!(question.skill, request.skill);
    assert_eq!(question.difficulty.get(), 10);
    assert_eq!(question.format, QuestionFormat::Numeric);
    assert_eq!(question.correct_answer, "15");
    assert!(question.judge(" 15 "));
}

#[tokio::test]
async fn test_prose_wrapped_json_is_accepted() {
    let base = spawn_generator_stub().await;
    let state = LearningState::default();
    let request = weakest_first().prepare(&state, 1);

    let (question, source) =
        fetch_or_fallback(&generator(&format!("{base}/prose")), &state, &request).await;

    assert_eq!(source, QuestionSource::Generated);
    assert_eq!(question.skill, Skill::TimeToHalfHour);
    assert_eq!(question.format, QuestionFormat::MultipleChoice);
    assert_eq!(question.choices.as_ref().map(Vec::len), Some(4));
    assert_eq!(question.difficulty, request.difficulty);
}

#[tokio::test]
async fn test_server_error_is_reported_and_falls_back() {
    let base = spawn_generator_stub().await;
    let state = LearningState::default();
    let request = weakest_first().prepare(&state, 3);
    let generator = generator(&format!("{base}/error"));

    let err = generator
        .generate(&state, &request)
        .await
        .expect_err("500 should be an error");
    assert!(matches!(err, TutorError::GeneratorStatus { status: 500, .. }));

    let (question, source) = fetch_or_fallback(&generator, &state, &request).await;
    assert_eq!(source, QuestionSource::Fallback);
    assert_eq!(question.id, "local-3");
    assert_eq!(question.skill, request.skill);
}

#[tokio::test]
async fn test_schema_mismatch_falls_back() {
    let base = spawn_generator_stub().await;
    let state = LearningState::default();
    let request = weakest_first().prepare(&state, 4);

    let (question, source) =
        fetch_or_fallback(&generator(&format!("{base}/missing-stem")), &state, &request).await;

    assert_eq!(source, QuestionSource::Fallback);
    assert_eq!(question.id, "local-4");
}

#[tokio::test]
async fn test_timeout_falls_back() {
    let base = spawn_generator_stub().await;
    let state = LearningState::default();
    let request = weakest_first().prepare(&state, 5);
    let generator = HttpGenerator::new(format!("{base}/slow"), Duration::from_millis(200))
        .expect("Failed to build client");

    let err = generator
        .generate(&state, &request)
        .await
        .expect_err("slow generator should time out");
    assert!(matches!(
        err,
        TutorError::GeneratorTransport {
            timed_out: true,
            ..
        }
    ));

    let (_, source) = fetch_or_fallback(&generator, &state, &request).await;
    assert_eq!(source, QuestionSource::Fallback);
}

#[tokio::test]
async fn test_unreachable_generator_falls_back() {
    let state = LearningState::default();
    let request = weakest_first().prepare(&state, 6);
    let generator = generator(&unreachable_url());

    let err = generator
        .generate(&state, &request)
        .await
        .expect_err("nothing is listening");
    assert!(err.is_generator_failure());

    let (question, source) = fetch_or_fallback(&generator, &state, &request).await;
    assert_eq!(source, QuestionSource::Fallback);
    assert_eq!(question.id, "local-6");
}

// ============================================================================
// Tutor API over HTTP
// ============================================================================

/// Starts the tutor API backed by `generator` and returns its base URL.
async fn spawn_tutor(generator: Arc<dyn QuestionGenerator>) -> String {
    let session = Session::bootstrap_with_policy(
        "learningState",
        SelectionPolicy::WeakestFirst,
        Box::new(MemoryStore::new()),
        Box::new(FixedSequence::new(vec![0])),
    )
    .expect("bootstrap should succeed");
    let router = create_router(AppState::new(session, generator));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    format!("http://{addr}/api")
}

#[tokio::test]
async fn test_quiz_round_trip_through_api() {
    let stub = spawn_generator_stub().await;
    let api = spawn_tutor(Arc::new(generator(&format!("{stub}/ok")))).await;
    let client = reqwest::Client::new();

    let next: Value = client
        .post(format!("{api}/question/next"))
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("invalid json");
    assert_eq!(next["source"], "generated");
    assert_eq!(next["requestId"], 1);
    assert_eq!(next["question"]["skill"], "counting_within_120");

    let answered: Value = client
        .post(format!("{api}/answer"))
        .json(&json!({ "answer": "15" }))
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("invalid json");
    assert_eq!(answered["correct"], true);
    assert_eq!(answered["correctAnswer"], "15");
    assert_eq!(answered["state"]["history"].as_array().map(Vec::len), Some(1));
    assert_eq!(answered["state"]["target_difficulty"], 5);

    let again = client
        .post(format!("{api}/answer"))
        .json(&json!({ "answer": "15" }))
        .send()
        .await
        .expect("request failed");
    assert_eq!(again.status(), reqwest::StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_api_serves_fallback_when_generator_fails() {
    let api = spawn_tutor(Arc::new(generator(&unreachable_url()))).await;
    let client = reqwest::Client::new();

    let next: Value = client
        .post(format!("{api}/question/next"))
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("invalid json");

    assert_eq!(next["source"], "fallback");
    assert_eq!(next["question"]["id"], "local-1");
    assert_eq!(next["question"]["correct_answer"], "20");

    let current: Value = client
        .get(format!("{api}/question"))
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("invalid json");
    assert_eq!(current["question"]["id"], "local-1");
}
