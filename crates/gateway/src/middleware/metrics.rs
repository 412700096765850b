//! Per-request metrics, labelled by route template

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use docvault_common::metrics::RequestMetrics;

pub async fn track_requests(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_string());
    let tracker = RequestMetrics::start(request.method().as_str(), &endpoint);

    let response = next.run(request).await;

    tracker.finish(response.status().as_u16());
    response
}
