use axum::{
    extract::{FromRequest, Request},
    Json,
};

use crate::error::TriviaError;

/// JSON extractor whose rejections go through [`TriviaError`] so malformed bodies answer 400.
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: serde::de::DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = TriviaError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(TriviaError::Validation(format!(
                "Failed to parse JSON request body: {}",
                rejection.body_text()
            ))),
        }
    }
}
