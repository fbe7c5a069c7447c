use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Records request count and latency per normalized route.
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

/// Replaces invite codes, creator ids, game names and indexes with
/// placeholders to keep label cardinality bounded.
fn normalize_path(path: &str) -> String {
    let mut normalized = Vec::new();
    let mut previous = "";

    for segment in path.split('/') {
        let placeholder = match previous {
            "quizzes" if !segment.is_empty() => Some("{code}"),
            "hosts" if !segment.is_empty() => Some("{creator}"),
            "templates" if !segment.is_empty() => Some("{template}"),
            "practice" if !segment.is_empty() && segment != "leaderboard" => Some("{game}"),
            _ if is_numeric_id(segment) => Some("{index}"),
            _ => None,
        };
        normalized.push(placeholder.unwrap_or(segment));
        previous = segment;
    }

    normalized.join("/")
}

fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
