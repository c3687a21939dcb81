#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response, StatusCode},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;
use trivia_api::{
    config::Config,
    create_router,
    models::QuestionDocument,
    services::{
        document_store::DocumentStore,
        memory_store::{InMemoryDocumentStore, InMemorySessionStore},
        AppState,
    },
};

pub struct TestApp {
    pub router: Router,
    pub documents: Arc<InMemoryDocumentStore>,
}

pub fn question(id: &str, rand: f64) -> QuestionDocument {
    QuestionDocument::from_value(json!({
        "_id": id,
        "rand": rand,
        "question": format!("Question {}", id),
        "questionES": format!("Pregunta {}", id),
        "correctAnswer": format!("right {}", id),
        "correctAnswerES": format!("correcta {}", id),
        "incorrectAnswers": ["wrong a", "wrong b", "wrong c"],
        "incorrectAnswersES": ["mal a", "mal b", "mal c"],
        "timesAttempted": 2,
        "timesCorrect": 1
    }))
    .expect("question fixture is an object")
}

pub fn create_test_app(question_count: usize) -> TestApp {
    let documents = Arc::new(InMemoryDocumentStore::with_documents(
        (0..question_count)
            .map(|i| question(&format!("q{}", i), (i as f64 + 0.5) / question_count as f64)),
    ));

    create_test_app_with_store(documents.clone(), documents)
}

/// Serves questions through `store`, which should wrap `documents`.
pub fn create_test_app_with_store(
    documents: Arc<InMemoryDocumentStore>,
    store: Arc<dyn DocumentStore>,
) -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let config = Config {
        question_timeout_ms: 200,
        metrics_auth: "metrics:secret".to_string(),
        ..Config::default()
    };

    let state = Arc::new(AppState::with_stores(
        config,
        store,
        Arc::new(InMemorySessionStore::new()),
    ));

    TestApp {
        router: create_router(state),
        documents,
    }
}

pub async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }

    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: String) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
}

/// `name=value` part of the session cookie set on the response, if any.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("trivia_session="))
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8_lossy(&bytes).to_string()
}

pub fn assert_status(response: &Response<Body>, expected: StatusCode) {
    assert_eq!(response.status(), expected, "unexpected status");
}
