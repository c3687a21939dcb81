use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Routes whose trailing segment is a free-form language code.
const LANGUAGE_ROUTES: [&str; 2] = ["getquestion", "getquestions"];

/// Records request count and latency per route
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    response
}

/// Collapses caller-chosen segments so label cardinality stays bounded.
fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let mut normalized = Vec::with_capacity(segments.len());

    for (index, segment) in segments.iter().enumerate() {
        let follows_language_route =
            index > 0 && LANGUAGE_ROUTES.contains(&segments[index - 1]) && !segment.is_empty();
        if follows_language_route {
            normalized.push("{language}");
        } else {
            normalized.push(*segment);
        }
    }

    normalized.join("/")
}
