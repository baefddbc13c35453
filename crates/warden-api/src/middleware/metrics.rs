//! Metrics tracking middleware
//!
//! Tracks request latency, counts, and status codes per endpoint
//!
//! Author: hephaex@gmail.com

use crate::state::AppState;
use axum::{
    extract::{MatchedPath, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

/// Bucket for requests no route matched
const UNMATCHED: &str = "<unmatched>";

/// Metrics tracking middleware
///
/// Keyed by the matched route template, so the number of entries is bounded
/// by the route table regardless of the paths clients send. Recorded before
/// the response is returned.
pub async fn metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let endpoint = endpoint_key(&request);

    let response = next.run(request).await;

    let latency_us = start.elapsed().as_micros() as u64;
    state
        .record_request(endpoint, response.status().as_u16(), latency_us)
        .await;

    response
}

/// `"<METHOD> <route template>"`; every unmatched request shares one key,
/// whatever its method or path.
fn endpoint_key(request: &Request) -> String {
    match request.extensions().get::<MatchedPath>() {
        Some(route) => format!("{} {}", method_label(request.method()), route.as_str()),
        None => UNMATCHED.to_string(),
    }
}

/// Extension methods collapse into `OTHER`
fn method_label(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::PATCH => "PATCH",
        Method::HEAD => "HEAD",
        Method::OPTIONS => "OPTIONS",
        _ => "OTHER",
    }
}
