//! Integration tests for the Veritas API.
//!
//! Each test builds its own router over scripted collaborators and an
//! in-memory or temp-dir conversation store, then drives it with `oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use veritas_api::handlers::{AskResponse, HealthResponse, SessionResponse};
use veritas_api::{create_router, AppState, SessionRegistry};
use veritas_core::{Datasource, Document, Turn, Verdict, VeritasConfig};
use veritas_rag::mock::{ScriptedChatModel, StaticRetriever, StaticWebSearch};
use veritas_rag::{Collaborators, HistoryWriter, Orchestrator, RagConfig};
use veritas_storage::{ConversationStore, JsonFileStore, MemoryStore};

// =============================================================================
// Helpers
// =============================================================================

const TEST_TOKEN: &str = "test-token-12345";

struct TestApp {
    router: axum::Router,
    state: AppState,
    writer: Arc<HistoryWriter>,
}

fn build(model: ScriptedChatModel, store: Arc<dyn ConversationStore>, config: VeritasConfig) -> TestApp {
    let writer = Arc::new(HistoryWriter::new(Arc::clone(&store), 3));
    let collaborators = Collaborators::new(
        Arc::new(model),
        Arc::new(StaticRetriever::new(vec![Document::new(
            "Agents use short-term and long-term memory.",
        )])),
        Arc::new(StaticWebSearch::new(vec![json!({"content": "Sunny, 24C"})])),
    );
    let orchestrator = Arc::new(Orchestrator::new(
        collaborators,
        store,
        Arc::clone(&writer),
        RagConfig::from_config(&config),
    ));
    let sessions = Arc::new(SessionRegistry::new(Duration::from_secs(
        config.sessions.ttl_secs,
    )));
    let state = AppState::new(config, orchestrator, sessions, TEST_TOKEN);
    TestApp {
        router: create_router(state.clone()),
        state,
        writer,
    }
}

/// Model that answers every question directly with `answer`.
fn direct_model(answer: &str) -> ScriptedChatModel {
    ScriptedChatModel::new()
        .route(Datasource::GenerateDirectly)
        .answer(answer)
        .adequacy(Verdict::Yes)
}

fn make_app(model: ScriptedChatModel) -> TestApp {
    build(model, Arc::new(MemoryStore::new()), VeritasConfig::default())
}

fn post_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed_get(uri: &str, token: &str) -> Request<Body> {
    Request::get(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

async fn open_session(app: &TestApp, user_id: &str) -> String {
    let resp = app
        .router
        .clone()
        .oneshot(post_json("/auth/session", TEST_TOKEN, json!({"user_id": user_id})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let session: SessionResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(session.user_id, user_id);
    session.token
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_no_auth_required() {
    let app = make_app(ScriptedChatModel::new());
    let resp = app
        .router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.active_sessions, 0);
}

// =============================================================================
// Auth
// =============================================================================

#[tokio::test]
async fn test_ask_without_token_returns_401() {
    let app = make_app(direct_model("hi"));
    let resp = app
        .router
        .oneshot(
            Request::post("/chat/ask")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"question": "hello"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(resp).await;
    assert_eq!(json["error"], "unauthorized");
    assert!(json["message"].as_str().unwrap().contains("Missing"));
}

#[tokio::test]
async fn test_unknown_token_returns_401() {
    let app = make_app(direct_model("hi"));
    let resp = app
        .router
        .oneshot(authed_get("/chat/history", "not-a-session"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_token_cannot_issue_sessions() {
    let app = make_app(ScriptedChatModel::new());
    let token = open_session(&app, "alice").await;
    let resp = app
        .router
        .clone()
        .oneshot(post_json("/auth/session", &token, json!({"user_id": "mallory"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_blank_user_id_rejected() {
    let app = make_app(ScriptedChatModel::new());
    let resp = app
        .router
        .oneshot(post_json("/auth/session", TEST_TOKEN, json!({"user_id": "  "})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_expired_session_returns_401() {
    let mut config = VeritasConfig::default();
    config.sessions.ttl_secs = 0;
    let app = build(direct_model("hi"), Arc::new(MemoryStore::new()), config);
    let token = open_session(&app, "alice").await;

    let resp = app
        .router
        .clone()
        .oneshot(authed_get("/chat/history", &token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.state.sessions.purge_expired(), 1);
}

// =============================================================================
// Ask
// =============================================================================

#[tokio::test]
async fn test_ask_returns_answer_json() {
    let app = make_app(direct_model("Hello there"));
    let resp = app
        .router
        .clone()
        .oneshot(post_json("/chat/ask", TEST_TOKEN, json!({"question": "hi"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: AskResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.answer, "Hello there");
    assert_eq!(body.status, "success");
    assert_eq!(body.generate_count, 1);
    assert!(!body.exhausted);
}

#[tokio::test]
async fn test_ask_answer_stream_is_narrated_text() {
    let model = ScriptedChatModel::new()
        .route(Datasource::Vectorstore)
        .relevance(Verdict::Yes)
        .answer("They remember.")
        .hallucination(Verdict::Yes)
        .adequacy(Verdict::Yes);
    let app = make_app(model);
    let resp = app
        .router
        .clone()
        .oneshot(post_json(
            "/chat/ask",
            TEST_TOKEN,
            json!({"question": "agent memory?", "stream": true}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    let text = String::from_utf8(body_bytes(resp).await).unwrap();
    assert_eq!(
        text,
        "[Thinking...]\n[Referencing on knowledge base...]\n[Answer]\nThey remember."
    );
}

#[tokio::test]
async fn test_ask_detail_stream_is_sse() {
    let model = ScriptedChatModel::new()
        .route(Datasource::WebSearch)
        .answer("Sunny.")
        .hallucination(Verdict::Yes)
        .adequacy(Verdict::Yes);
    let app = make_app(model);
    let resp = app
        .router
        .clone()
        .oneshot(post_json(
            "/chat/ask",
            TEST_TOKEN,
            json!({"question": "weather today?", "stream": "detail"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let text = String::from_utf8(body_bytes(resp).await).unwrap();
    let events: Vec<Value> = text
        .lines()
        .filter_map(|l| l.strip_prefix("data: "))
        .map(|d| serde_json::from_str(d).unwrap())
        .collect();
    let kinds: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
    assert_eq!(kinds.first(), Some(&"init"));
    assert_eq!(kinds[1], "search");
    assert_eq!(kinds[2], "start");
    assert_eq!(kinds.last(), Some(&"final"));
    assert_eq!(events.last().unwrap()["generate_id"], 1);
    assert!(events.last().unwrap().get("content").is_none());
}

#[tokio::test]
async fn test_detail_stream_reports_failure_as_error_event() {
    let app = make_app(ScriptedChatModel::new().route_raw("database"));
    let resp = app
        .router
        .clone()
        .oneshot(post_json(
            "/chat/ask",
            TEST_TOKEN,
            json!({"question": "q", "stream": "detail"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let text = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(text.contains("event: error"));
    assert!(text.contains("upstream_error"));
}

#[tokio::test]
async fn test_contract_violation_returns_502() {
    let app = make_app(ScriptedChatModel::new().route_raw("database"));
    let resp = app
        .router
        .oneshot(post_json("/chat/ask", TEST_TOKEN, json!({"question": "q"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(resp).await;
    assert_eq!(json["error"], "upstream_error");
}

#[tokio::test]
async fn test_empty_question_returns_400() {
    let app = make_app(direct_model("unused"));
    let resp = app
        .router
        .oneshot(post_json(
            "/chat/ask",
            TEST_TOKEN,
            json!({"question": "   ", "stream": "detail"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_stream_mode_returns_400() {
    let app = make_app(direct_model("unused"));
    let resp = app
        .router
        .oneshot(post_json(
            "/chat/ask",
            TEST_TOKEN,
            json!({"question": "hi", "stream": "verbose"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert!(json["message"].as_str().unwrap().contains("verbose"));
}

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let mut config = VeritasConfig::default();
    config.api.rate_limit_per_sec = 1;
    let app = build(direct_model("ok"), Arc::new(MemoryStore::new()), config);

    let mut statuses = Vec::new();
    for _ in 0..5 {
        let resp = app
            .router
            .clone()
            .oneshot(authed_get("/chat/history", TEST_TOKEN))
            .await
            .unwrap();
        statuses.push(resp.status());
    }
    assert!(statuses.contains(&StatusCode::TOO_MANY_REQUESTS));
    assert_eq!(statuses[0], StatusCode::OK);
}

// =============================================================================
// History
// =============================================================================

#[tokio::test]
async fn test_history_returns_pairs_for_session_user() {
    let store = MemoryStore::new()
        .with_history(
            "alice",
            vec![
                Turn::user("What is CoT?"),
                Turn::assistant("Chain of thought."),
                Turn::user("dangling"),
            ],
        )
        .await;
    let app = build(ScriptedChatModel::new(), Arc::new(store), VeritasConfig::default());
    let token = open_session(&app, "alice").await;

    let resp = app
        .router
        .clone()
        .oneshot(authed_get("/chat/history", &token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await,
        json!([{"question": "What is CoT?", "answer": "Chain of thought."}])
    );

    // The admin token reads the default user's log.
    let resp = app
        .router
        .clone()
        .oneshot(authed_get("/chat/history", TEST_TOKEN))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await, json!([]));
}

#[tokio::test]
async fn test_answers_persist_to_json_files_per_user() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path(), "dialogue_{user_id}.json"));
    let model = ScriptedChatModel::new()
        .route(Datasource::GenerateDirectly)
        .answer("first answer")
        .answer("second answer")
        .adequacy(Verdict::Yes);
    let app = build(model, store.clone(), VeritasConfig::default());
    let token = open_session(&app, "bob").await;

    for question in ["first question", "second question"] {
        let resp = app
            .router
            .clone()
            .oneshot(post_json("/chat/ask", &token, json!({"question": question})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        // Let the background write land before the next turn reads the log.
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    app.writer.shutdown().await;

    assert!(dir.path().join("dialogue_bob.json").exists());
    let turns = store.load("bob").await.unwrap();
    assert_eq!(
        turns,
        vec![
            Turn::user("first question"),
            Turn::assistant("first answer"),
            Turn::user("second question"),
            Turn::assistant("second answer"),
        ]
    );
}
