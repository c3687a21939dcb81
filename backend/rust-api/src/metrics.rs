use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Document store
    pub static ref DB_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "db_operations_total",
        "Total number of document store operations",
        &["operation", "collection", "status"]
    )
    .unwrap();

    pub static ref DB_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "db_operation_duration_seconds",
        "Document store operation duration in seconds",
        &["operation", "collection"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    // Session store
    pub static ref SESSION_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "session_operations_total",
        "Total number of session store operations",
        &["operation", "status"]
    )
    .unwrap();

    pub static ref SESSION_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "session_operation_duration_seconds",
        "Session store operation duration in seconds",
        &["operation"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1]
    )
    .unwrap();

    // Business Metrics
    pub static ref QUESTIONS_SERVED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "questions_served_total",
        "Total number of questions served",
        &["endpoint"]
    )
    .unwrap();

    pub static ref ASKED_LIST_RESETS_TOTAL: IntCounter = register_int_counter!(
        "asked_list_resets_total",
        "Number of times a session exhausted every question and started over"
    )
    .unwrap();

    pub static ref BATCH_LOOKUP_TIMEOUTS_TOTAL: IntCounter = register_int_counter!(
        "batch_lookup_timeouts_total",
        "Question lookups dropped from a batch after exceeding the per-call timeout"
    )
    .unwrap();

    pub static ref ANSWERS_SUBMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "answers_submitted_total",
        "Total number of answers recorded",
        &["correct"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track document store operation with metrics
pub async fn track_db_operation<F, T, E>(
    operation: &str,
    collection: &str,
    future: F,
) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    DB_OPERATIONS_TOTAL
        .with_label_values(&[operation, collection, status])
        .inc();

    DB_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, collection])
        .observe(duration);

    result
}

/// Helper: track session store operation with metrics
pub async fn track_session_operation<F, T, E>(operation: &str, future: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    SESSION_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();

    SESSION_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration);

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_metrics() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/getquestion", "200"])
            .inc();
        ASKED_LIST_RESETS_TOTAL.inc();

        let output = render_metrics().unwrap();
        assert!(output.contains("http_requests_total"));
        assert!(output.contains("asked_list_resets_total"));
    }

    #[tokio::test]
    async fn track_db_operation_counts_failures() {
        let before = DB_OPERATIONS_TOTAL
            .with_label_values(&["find", "metrics_test", "error"])
            .get();

        let result: Result<(), &str> =
            track_db_operation("find", "metrics_test", async { Err("boom") }).await;

        assert!(result.is_err());
        let after = DB_OPERATIONS_TOTAL
            .with_label_values(&["find", "metrics_test", "error"])
            .get();
        assert_eq!(after, before + 1);
    }
}
