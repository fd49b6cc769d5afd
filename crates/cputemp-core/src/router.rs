//! Request routing.
//!
//! [`RequestRouter`] maps a method and path to a [`RouteOutcome`] without
//! touching the transport. The HTTP server only copies the outcome onto the
//! wire.
//!
//! | suffix after base | response |
//! |---|---|
//! | `""`, `/` | `{"temp": <celsius>}` |
//! | `/ping` | `{"status": "UP"}` |
//! | `/metrics` | Prometheus text |
//! | asset route | asset bytes |
//! | other | 404 `{"temp": null}` |
//!
//! Methods other than `GET` and paths outside the base get 405.

use bytes::Bytes;
use http::{Method, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

use crate::assets::AssetStore;
use crate::cache::SensorCache;
use crate::metrics;

/// Content type of every JSON response.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Status, content type and body of a routed request.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteOutcome {
    pub status: StatusCode,
    pub content_type: String,
    pub body: Bytes,
}

impl RouteOutcome {
    fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status,
                content_type: JSON_CONTENT_TYPE.to_string(),
                body: body.into(),
            },
            Err(e) => {
                error!(error = %e, "Failed to encode response body");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    content_type: JSON_CONTENT_TYPE.to_string(),
                    body: Bytes::from_static(b"{\"temp\":null}"),
                }
            }
        }
    }

    fn temp(status: StatusCode, temp: Option<f64>) -> Self {
        Self::json(status, &TempBody { temp, error: None })
    }

    fn error(message: String) -> Self {
        Self::json(
            StatusCode::INTERNAL_SERVER_ERROR,
            &TempBody {
                temp: None,
                error: Some(message),
            },
        )
    }
}

#[derive(Serialize)]
struct TempBody {
    temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct PingBody {
    status: &'static str,
}

/// Dispatches requests under a base prefix.
#[derive(Clone)]
pub struct RequestRouter {
    cache: SensorCache,
    assets: Arc<dyn AssetStore>,
    base: String,
}

impl RequestRouter {
    /// Creates a router serving under `base` (e.g. `/temp`).
    ///
    /// A trailing slash on `base` is ignored, so `/` serves from the root.
    pub fn new(cache: SensorCache, assets: Arc<dyn AssetStore>, base: &str) -> Self {
        Self {
            cache,
            assets,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// Returns the base prefix.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Produces the response for a request.
    pub async fn route(&self, method: &Method, path: &str) -> RouteOutcome {
        let start = Instant::now();
        debug!(method = %method, path = %path, "Received HTTP request");

        // A path outside the base is answered like a wrong method.
        let suffix = match path.strip_prefix(self.base.as_str()) {
            Some(suffix) if *method == Method::GET => suffix,
            _ => {
                let outcome = RouteOutcome::temp(StatusCode::METHOD_NOT_ALLOWED, None);
                warn!(
                    method = %method,
                    path = %path,
                    status = outcome.status.as_u16(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Method not allowed"
                );
                return outcome;
            }
        };

        let outcome = match suffix {
            "" | "/" => self.temperature().await,
            "/ping" => RouteOutcome::json(StatusCode::OK, &PingBody { status: "UP" }),
            "/metrics" => self.metrics().await,
            _ => match self.assets.get(suffix) {
                Some(asset) => RouteOutcome {
                    status: StatusCode::OK,
                    content_type: asset.content_type.clone(),
                    body: asset.bytes.clone(),
                },
                None => RouteOutcome::temp(StatusCode::NOT_FOUND, None),
            },
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let status = outcome.status.as_u16();
        if outcome.status == StatusCode::NOT_FOUND {
            warn!(path = %suffix, status, duration_ms, "Resource not found");
        } else if outcome.status.is_server_error() {
            error!(path = %suffix, status, duration_ms, "Error handling request");
        } else {
            debug!(
                path = %suffix,
                status,
                content_type = %outcome.content_type,
                duration_ms,
                "Request completed"
            );
        }
        outcome
    }

    async fn temperature(&self) -> RouteOutcome {
        match self.cache.read().await {
            Ok(sample) => RouteOutcome::temp(StatusCode::OK, Some(sample.celsius)),
            Err(e) => {
                error!(error = %e, endpoint = "temperature", "Temperature read failed");
                RouteOutcome::error(e.to_string())
            }
        }
    }

    async fn metrics(&self) -> RouteOutcome {
        match self.cache.read().await {
            Ok(sample) => RouteOutcome {
                status: StatusCode::OK,
                content_type: metrics::CONTENT_TYPE.to_string(),
                body: metrics::exposition(sample.celsius).into(),
            },
            Err(e) => {
                error!(error = %e, endpoint = "metrics", "Temperature read failed");
                RouteOutcome::error(e.to_string())
            }
        }
    }
}
