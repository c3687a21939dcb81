use async_trait::async_trait;
use axum::http::{header, StatusCode};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tower::ServiceExt;
use trivia_api::{
    error::Result,
    models::{Direction, QuestionDocument, ViewRow},
    services::{document_store::DocumentStore, memory_store::InMemoryDocumentStore},
};

mod common;

use common::{
    assert_status, body_json, body_text, create_test_app, create_test_app_with_store, get,
    post_json, question, session_cookie,
};

/// Another client's answer lands between our read and our write.
struct ConcurrentAnswerStore {
    inner: Arc<InMemoryDocumentStore>,
}

#[async_trait]
impl DocumentStore for ConcurrentAnswerStore {
    async fn retrieve_by_id(&self, id: &str) -> Result<Option<QuestionDocument>> {
        let read = self.inner.retrieve_by_id(id).await?;
        if let Some(document) = &read {
            let mut theirs = document.clone();
            theirs.set_counters(
                document.times_attempted().unwrap_or_default() + 1,
                document.times_correct().unwrap_or_default(),
            );
            let revision = document.revision().unwrap_or_default().to_string();
            self.inner.update_by_id(id, &revision, theirs).await?;
        }
        Ok(read)
    }

    async fn query_ordered(
        &self,
        view: &str,
        direction: Direction,
        start_key: f64,
    ) -> Result<Vec<ViewRow>> {
        self.inner.query_ordered(view, direction, start_key).await
    }

    async fn update_by_id(
        &self,
        id: &str,
        revision: &str,
        document: QuestionDocument,
    ) -> Result<String> {
        self.inner.update_by_id(id, revision, document).await
    }
}

#[tokio::test]
async fn test_get_question_returns_view_and_sets_session_cookie() {
    let app = create_test_app(3);

    let response = get(&app.router, "/getquestion", None).await;
    assert_status(&response, StatusCode::OK);
    assert!(session_cookie(&response).is_some());
    assert!(response.headers().get("x-trace-id").is_some());

    let json = body_json(response).await;
    let id = json["id"].as_str().unwrap();
    assert!(["q0", "q1", "q2"].contains(&id));
    assert_eq!(json["question"], format!("Question {}", id));
    assert_eq!(json["correct"], format!("right {}", id));
    assert_eq!(json["timesAttempted"], 2);
    assert_eq!(json["timesCorrect"], 1);

    let answers: HashSet<&str> = ["answer1", "answer2", "answer3", "answer4"]
        .iter()
        .map(|key| json[*key].as_str().unwrap())
        .collect();
    let expected: HashSet<&str> = [
        json["correct"].as_str().unwrap(),
        "wrong a",
        "wrong b",
        "wrong c",
    ]
    .into_iter()
    .collect();
    assert_eq!(answers, expected);
}

#[tokio::test]
async fn test_same_session_does_not_repeat_until_exhausted() {
    let app = create_test_app(4);

    let first = get(&app.router, "/getquestion", None).await;
    let cookie = session_cookie(&first).expect("session cookie");
    let mut seen = vec![body_json(first).await["id"].as_str().unwrap().to_string()];

    for _ in 0..3 {
        let response = get(&app.router, "/getquestion", Some(&cookie)).await;
        assert_status(&response, StatusCode::OK);
        // an existing session is not re-issued
        assert!(session_cookie(&response).is_none());
        let id = body_json(response).await["id"].as_str().unwrap().to_string();
        assert!(!seen.contains(&id), "{} repeated", id);
        seen.push(id);
    }

    // all four asked: the next request still answers and starts over
    let response = get(&app.router, "/getquestion", Some(&cookie)).await;
    assert_status(&response, StatusCode::OK);
}

#[tokio::test]
async fn test_get_question_in_spanish() {
    let app = create_test_app(2);

    let response = get(&app.router, "/getquestion/ES", None).await;
    assert_status(&response, StatusCode::OK);

    let json = body_json(response).await;
    let id = json["id"].as_str().unwrap();
    assert_eq!(json["question"], format!("Pregunta {}", id));
    assert_eq!(json["correct"], format!("correcta {}", id));
}

#[tokio::test]
async fn test_unknown_language_falls_back_to_english() {
    let app = create_test_app(2);

    for uri in ["/getquestion/FR", "/getquestion/EN"] {
        let response = get(&app.router, uri, None).await;
        assert_status(&response, StatusCode::OK);
        let json = body_json(response).await;
        let id = json["id"].as_str().unwrap();
        assert_eq!(json["question"], format!("Question {}", id));
    }
}

#[tokio::test]
async fn test_get_question_without_questions_is_bad_request() {
    let app = create_test_app(0);

    let response = get(&app.router, "/getquestion", None).await;
    assert_status(&response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_questions_returns_distinct_batch() {
    let app = create_test_app(10);

    let response = get(&app.router, "/getquestions", None).await;
    assert_status(&response, StatusCode::OK);
    let cookie = session_cookie(&response).expect("session cookie");

    let first_batch = body_json(response).await;
    let first_ids: HashSet<String> = first_batch
        .as_array()
        .unwrap()
        .iter()
        .map(|view| view["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(first_ids.len(), 5);

    // the second batch of the same session draws from the other five
    let response = get(&app.router, "/getquestions/ES", Some(&cookie)).await;
    assert_status(&response, StatusCode::OK);
    let second_batch = body_json(response).await;
    let second_ids: HashSet<String> = second_batch
        .as_array()
        .unwrap()
        .iter()
        .map(|view| view["id"].as_str().unwrap().to_string())
        .collect();

    assert_eq!(second_ids.len(), 5);
    assert!(first_ids.is_disjoint(&second_ids));
    assert!(second_batch[0]["question"]
        .as_str()
        .unwrap()
        .starts_with("Pregunta"));
}

#[tokio::test]
async fn test_get_questions_with_fewer_questions_than_batch() {
    let app = create_test_app(3);

    let response = get(&app.router, "/getquestions", None).await;
    assert_status(&response, StatusCode::OK);

    // three unseen, then the list resets and questions repeat
    let batch = body_json(response).await;
    assert_eq!(batch.as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_get_questions_empty_store_is_bad_request() {
    let app = create_test_app(0);

    let response = get(&app.router, "/getquestions", None).await;
    assert_status(&response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_questions_when_store_is_down_is_bad_request() {
    let app = create_test_app(5);
    app.documents.set_failing(true);

    let response = get(&app.router, "/getquestions", None).await;
    assert_status(&response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_post_correct_answer_updates_counters() {
    let app = create_test_app(2);

    let body = json!({ "question": "q1", "correct": true });
    let response = post_json(&app.router, "/answer", body.to_string()).await;
    assert_status(&response, StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain; charset=utf-8"
    );
    assert_eq!(body_text(response).await, "Question q1 updated");

    let stored = app.documents.get("q1").await.unwrap();
    assert_eq!(stored.times_attempted(), Some(3));
    assert_eq!(stored.times_correct(), Some(2));
}

#[tokio::test]
async fn test_post_incorrect_answer_updates_attempts_only() {
    let app = create_test_app(2);

    let body = json!({ "question": "q0", "correct": false });
    let response = post_json(&app.router, "/answer", body.to_string()).await;
    assert_status(&response, StatusCode::OK);

    let stored = app.documents.get("q0").await.unwrap();
    assert_eq!(stored.times_attempted(), Some(3));
    assert_eq!(stored.times_correct(), Some(1));
}

#[tokio::test]
async fn test_post_answer_for_unknown_question_is_bad_request() {
    let app = create_test_app(2);

    let body = json!({ "question": "q99", "correct": true });
    let response = post_json(&app.router, "/answer", body.to_string()).await;

    assert_status(&response, StatusCode::BAD_REQUEST);
    assert_eq!(app.documents.write_count(), 0);
}

#[tokio::test]
async fn test_post_answer_losing_a_write_race_is_bad_request() {
    let documents = Arc::new(InMemoryDocumentStore::with_documents([question("q0", 0.5)]));
    let store = Arc::new(ConcurrentAnswerStore {
        inner: documents.clone(),
    });
    let app = create_test_app_with_store(documents, store);

    let body = json!({ "question": "q0", "correct": true });
    let response = post_json(&app.router, "/answer", body.to_string()).await;

    assert_status(&response, StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("q0"));

    // only the other client's incorrect answer is counted
    let stored = app.documents.get("q0").await.unwrap();
    assert_eq!(stored.times_attempted(), Some(3));
    assert_eq!(stored.times_correct(), Some(1));
    assert_eq!(app.documents.write_count(), 1);
}

#[tokio::test]
async fn test_post_answer_rejects_malformed_bodies() {
    let app = create_test_app(2);

    let bodies = [
        "not json".to_string(),
        json!({ "question": "q1" }).to_string(),
        json!({ "correct": true }).to_string(),
        json!({ "question": "", "correct": true }).to_string(),
        json!({ "question": "q1", "correct": "yes" }).to_string(),
    ];

    for body in bodies {
        let response = post_json(&app.router, "/answer", body.clone()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {}", body);
    }
    assert_eq!(app.documents.write_count(), 0);
}

#[tokio::test]
async fn test_health_reports_store_status() {
    let app = create_test_app(1);

    let response = get(&app.router, "/health", None).await;
    assert_status(&response, StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["dependencies"]["document_store"]["status"], "healthy");

    app.documents.set_failing(true);
    let response = get(&app.router, "/health", None).await;
    assert_status(&response, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["status"], "degraded");
}

#[tokio::test]
async fn test_metrics_requires_basic_auth() {
    let app = create_test_app(1);

    let response = get(&app.router, "/metrics", None).await;
    assert_status(&response, StatusCode::UNAUTHORIZED);

    let credentials = general_purpose::STANDARD.encode("metrics:secret");
    let response = app
        .router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .uri("/metrics")
                .header(header::AUTHORIZATION, format!("Basic {}", credentials))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_status(&response, StatusCode::OK);
    assert!(body_text(response).await.contains("http_requests_total"));
}
