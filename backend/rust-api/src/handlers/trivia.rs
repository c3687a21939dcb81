use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::TriviaError,
    extractors::AppJson,
    models::{AnswerRequest, Language},
    services::{session_store::SessionContext, AppState},
};

pub const SESSION_COOKIE: &str = "trivia_session";

/// Resolves the caller's session from its cookie, minting a new one when absent.
fn resolve_session(state: &AppState, jar: CookieJar) -> (SessionContext, CookieJar) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let session = state.session(cookie.value());
        return (session, jar);
    }

    let session_id = Uuid::new_v4().to_string();
    tracing::debug!("Starting new session {}", session_id);

    let cookie = Cookie::build((SESSION_COOKIE, session_id.clone()))
        .path("/")
        .http_only(true)
        .secure(state.config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(state.config.session_ttl_seconds as i64))
        .build();

    (state.session(&session_id), jar.add(cookie))
}

/// GET /getquestion - one unseen question in the default language
pub async fn get_question(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, TriviaError> {
    serve_question(&state, jar, None).await
}

/// GET /getquestion/{language}
pub async fn get_question_in_language(
    State(state): State<Arc<AppState>>,
    Path(language): Path<String>,
    jar: CookieJar,
) -> Result<impl IntoResponse, TriviaError> {
    serve_question(&state, jar, Some(&language)).await
}

async fn serve_question(
    state: &AppState,
    jar: CookieJar,
    language: Option<&str>,
) -> Result<impl IntoResponse, TriviaError> {
    tracing::debug!("GET - /getquestion route handler...");
    let language = Language::from_param(language);
    let (session, jar) = resolve_session(state, jar);

    let view = state
        .trivia_service()
        .get_one_question(&session, language)
        .await?;

    Ok((jar, Json(view)))
}

/// GET /getquestions - a batch of distinct unseen questions
pub async fn get_questions(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, TriviaError> {
    serve_questions(&state, jar, None).await
}

/// GET /getquestions/{language}
pub async fn get_questions_in_language(
    State(state): State<Arc<AppState>>,
    Path(language): Path<String>,
    jar: CookieJar,
) -> Result<impl IntoResponse, TriviaError> {
    serve_questions(&state, jar, Some(&language)).await
}

async fn serve_questions(
    state: &AppState,
    jar: CookieJar,
    language: Option<&str>,
) -> Result<impl IntoResponse, TriviaError> {
    tracing::debug!("GET - /getquestions route handler...");
    let language = Language::from_param(language);
    let (session, jar) = resolve_session(state, jar);

    let views = state
        .trivia_service()
        .get_many_questions(&session, language, state.config.batch_size)
        .await?;

    Ok((jar, Json(views)))
}

/// POST /answer - record whether a question was answered correctly
pub async fn post_answer(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<AnswerRequest>,
) -> Result<impl IntoResponse, TriviaError> {
    tracing::debug!("POST - /answer route handler...");
    req.validate()
        .map_err(|e| TriviaError::Validation(e.to_string()))?;

    state
        .trivia_service()
        .submit_answer(&req.question, req.correct)
        .await?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("Question {} updated", req.question),
    ))
}
