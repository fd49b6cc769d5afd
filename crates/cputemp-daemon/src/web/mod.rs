//! HTTP adapter for the request router.
//!
//! Every request goes through a single fallback handler that hands method and
//! path to [`RequestRouter`] and copies the outcome onto the response.

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, Uri},
    response::{IntoResponse, Response},
    Router,
};
use cputemp_core::RequestRouter;
use tower_http::set_header::SetResponseHeaderLayer;

/// Creates the web router.
pub fn create_router(router: RequestRouter) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(router)
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
}

/// Any method, any path.
async fn dispatch(State(router): State<RequestRouter>, method: Method, uri: Uri) -> Response {
    let outcome = router.route(&method, uri.path()).await;
    (
        outcome.status,
        [(header::CONTENT_TYPE, outcome.content_type)],
        outcome.body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderMap, Request, StatusCode};
    use cputemp_core::{CacheSettings, SensorCache, SensorSource, StaticAssets};
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::io;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    struct FixedSource(&'static str);

    impl SensorSource for FixedSource {
        fn read(&self) -> BoxFuture<'_, io::Result<String>> {
            futures::future::ready(Ok(self.0.to_string())).boxed()
        }

        fn describe(&self) -> String {
            "fixed".to_string()
        }
    }

    struct HangingSource;

    impl SensorSource for HangingSource {
        fn read(&self) -> BoxFuture<'_, io::Result<String>> {
            futures::future::pending().boxed()
        }

        fn describe(&self) -> String {
            "hanging".to_string()
        }
    }

    fn app(source: Arc<dyn SensorSource>) -> Router {
        let settings = CacheSettings {
            read_timeout: Duration::from_secs(60),
            ..CacheSettings::default()
        };
        let cache = SensorCache::new(source, settings);
        let mut assets = StaticAssets::new();
        assets.insert("/favicon.ico", vec![0u8, 0, 1, 0], "image/x-icon");
        create_router(RequestRouter::new(cache, Arc::new(assets), "/temp"))
    }

    fn header_string(headers: &HeaderMap, name: header::HeaderName) -> String {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, String, String, Vec<u8>) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        let status = response.status();
        let content_type = header_string(response.headers(), header::CONTENT_TYPE);
        let allow_origin = header_string(response.headers(), header::ACCESS_CONTROL_ALLOW_ORIGIN);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, allow_origin, body.to_vec())
    }

    #[tokio::test]
    async fn test_temperature_json() {
        let (status, content_type, allow_origin, body) =
            send(app(Arc::new(FixedSource("38500"))), Method::GET, "/temp/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "application/json; charset=utf-8");
        assert_eq!(allow_origin, "*");
        assert_eq!(body, br#"{"temp":38.5}"#);
    }

    #[tokio::test]
    async fn test_query_string_ignored() {
        let (status, _, _, body) = send(
            app(Arc::new(FixedSource("45600"))),
            Method::GET,
            "/temp?t=123",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, br#"{"temp":45.6}"#);
    }

    #[tokio::test]
    async fn test_metrics_text() {
        let (status, content_type, allow_origin, body) = send(
            app(Arc::new(FixedSource("75300"))),
            Method::GET,
            "/temp/metrics",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "text/plain");
        assert_eq!(allow_origin, "*");
        let text = String::from_utf8(body).unwrap();
        assert!(text.lines().any(|line| line == "cpu_temperature 75.3"));
    }

    #[tokio::test]
    async fn test_invalid_reading_is_500() {
        let (status, content_type, _, body) = send(
            app(Arc::new(FixedSource("not a number"))),
            Method::GET,
            "/temp",
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(content_type, "application/json; charset=utf-8");
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(body["temp"].is_null());
        assert!(!body["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_post_is_405() {
        let (status, _, allow_origin, body) =
            send(app(Arc::new(FixedSource("38500"))), Method::POST, "/temp/").await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(allow_origin, "*");
        assert_eq!(body, br#"{"temp":null}"#);
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let (status, _, allow_origin, body) = send(
            app(Arc::new(FixedSource("38500"))),
            Method::GET,
            "/temp/doesnotexist",
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(allow_origin, "*");
        assert_eq!(body, br#"{"temp":null}"#);
    }

    #[tokio::test]
    async fn test_asset_bytes() {
        let (status, content_type, allow_origin, body) = send(
            app(Arc::new(FixedSource("38500"))),
            Method::GET,
            "/temp/favicon.ico",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "image/x-icon");
        assert_eq!(allow_origin, "*");
        assert_eq!(body, vec![0u8, 0, 1, 0]);
    }

    #[tokio::test]
    async fn test_ping_not_blocked_by_pending_read() {
        let app = app(Arc::new(HangingSource));

        let pending = tokio::spawn(send(app.clone(), Method::GET, "/temp"));
        tokio::task::yield_now().await;

        let (status, _, _, body) = tokio::time::timeout(
            Duration::from_secs(1),
            send(app, Method::GET, "/temp/ping"),
        )
        .await
        .expect("ping blocked by temperature read");

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, br#"{"status":"UP"}"#);
        assert!(!pending.is_finished());
        pending.abort();
    }
}
