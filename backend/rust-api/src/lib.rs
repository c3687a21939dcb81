use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::TriviaError;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler).layer(middleware::from_fn_with_state(
                app_state.clone(),
                handlers::metrics_auth_middleware,
            )),
        )
        .merge(trivia_routes())
        .with_state(app_state)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn trivia_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/getquestion", get(handlers::trivia::get_question))
        .route(
            "/getquestion/{language}",
            get(handlers::trivia::get_question_in_language),
        )
        .route("/getquestions", get(handlers::trivia::get_questions))
        .route(
            "/getquestions/{language}",
            get(handlers::trivia::get_questions_in_language),
        )
        .route("/answer", post(handlers::trivia::post_answer))
}
