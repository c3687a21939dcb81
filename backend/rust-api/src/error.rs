use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TriviaError>;

/// Failures surfaced by the question store, the session store and the trivia service.
///
/// Every variant is a per-request failure; none of them is fatal to the process.
#[derive(Error, Debug)]
pub enum TriviaError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Document store error: {0}")]
    Store(String),

    #[error("Revision conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Session store error: {0}")]
    Session(String),
}

impl From<mongodb::error::Error> for TriviaError {
    fn from(err: mongodb::error::Error) -> Self {
        TriviaError::Store(err.to_string())
    }
}

impl From<redis::RedisError> for TriviaError {
    fn from(err: redis::RedisError) -> Self {
        TriviaError::Session(err.to_string())
    }
}

/// All failures collapse to 400 for the client.
impl IntoResponse for TriviaError {
    fn into_response(self) -> Response {
        match &self {
            TriviaError::Store(_) | TriviaError::Session(_) => {
                tracing::error!("Request failed: {}", self)
            }
            _ => tracing::warn!("Request failed: {}", self),
        }
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}
