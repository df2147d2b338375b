//! HTTP layers shared by every route
//!
//! CORS for the operator console, one tracing span per request tagged with
//! the calling user, and [`Caller`] extraction.

use axum::http::{header, HeaderName, HeaderValue, Method, Request};
use std::time::Duration;
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultOnResponse, MakeSpan, TraceLayer},
    LatencyUnit,
};
use tracing::{Level, Span};

use crate::config::CorsConfig;

pub mod caller;

pub use caller::{Caller, CALLER_HEADER};

/// Methods the console uses.
const CONSOLE_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// CORS for the console. An empty origin list or `*` allows any origin,
/// which never carries credentials.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let any_origin =
        config.allowed_origins.is_empty() || config.allowed_origins.iter().any(|o| o == "*");

    let origin = if any_origin {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(CONSOLE_METHODS)
        .allow_headers([
            header::ACCEPT,
            header::CONTENT_TYPE,
            HeaderName::from_static(CALLER_HEADER),
        ])
        .allow_credentials(config.allow_credentials && !any_origin)
        .max_age(Duration::from_secs(3600))
}

/// Request span carrying method, path and the `x-warden-user` caller, so
/// gateway events logged inside a handler name who issued them.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallerSpan;

impl<B> MakeSpan<B> for CallerSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let caller = request
            .headers()
            .get(CALLER_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("-");
        tracing::info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path(),
            caller = %caller,
        )
    }
}

pub fn tracing_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, CallerSpan> {
    TraceLayer::new_for_http().make_span_with(CallerSpan).on_response(
        DefaultOnResponse::new()
            .level(Level::INFO)
            .latency_unit(LatencyUnit::Micros),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    async fn preflight(config: CorsConfig, origin: &str) -> axum::http::HeaderMap {
        let app = Router::new()
            .route("/api/products", get(|| async { "ok" }))
            .layer(cors_layer(&config));
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/products")
                    .header(header::ORIGIN, origin)
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "DELETE")
                    .header(header::ACCESS_CONTROL_REQUEST_HEADERS, CALLER_HEADER)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        response.headers().clone()
    }

    #[tokio::test]
    async fn test_listed_origin_with_credentials() {
        let config = CorsConfig {
            allowed_origins: vec!["http://localhost:4200".to_string()],
            allow_credentials: true,
        };
        let headers = preflight(config, "http://localhost:4200").await;

        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:4200"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        let allowed = headers[header::ACCESS_CONTROL_ALLOW_HEADERS].to_str().unwrap();
        assert!(allowed.contains(CALLER_HEADER));
    }

    #[tokio::test]
    async fn test_unlisted_origin_gets_no_grant() {
        let config = CorsConfig {
            allowed_origins: vec!["http://localhost:4200".to_string()],
            allow_credentials: false,
        };
        let headers = preflight(config, "http://evil.example").await;
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn test_wildcard_drops_credentials() {
        let config = CorsConfig {
            allowed_origins: vec!["*".to_string()],
            allow_credentials: true,
        };
        let headers = preflight(config, "http://anywhere.example").await;
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
    }
}
