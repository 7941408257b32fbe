//! HTTP surface.
//!
//! - `POST /api/convert-excel` - multipart upload (field `excelFile`), one PDF
//!   data URI per worksheet back.
//! - `GET /api/health` - liveness plus whether this machine can convert at all.
//!
//! CORS is fully permissive: the endpoint is called from a browser page
//! served elsewhere.

pub mod routes;

use crate::convert::Converter;
use crate::error::Sheet2PdfError;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::{Ipv4Addr, SocketAddr};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Route of the conversion endpoint.
pub const CONVERT_PATH: &str = "/api/convert-excel";

/// Listener settings for [`serve`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Default `127.0.0.1:5000`.
    pub bind: SocketAddr,
    /// Largest accepted request body. Default 50 MB.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 5000)),
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub converter: Converter,
}

/// Build the router with the default body limit.
pub fn router(converter: Converter) -> Router {
    router_with_limit(converter, ServerConfig::default().max_upload_bytes)
}

pub fn router_with_limit(converter: Converter, max_upload_bytes: usize) -> Router {
    Router::new()
        .route(CONVERT_PATH, post(routes::convert_excel))
        .route("/api/health", get(routes::health))
        .with_state(AppState { converter })
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: ServerConfig, converter: Converter) -> Result<(), Sheet2PdfError> {
    let platform_supported = converter.host().platform_supported();
    let app = router_with_limit(converter, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| Sheet2PdfError::Internal(format!("Cannot bind {}: {}", config.bind, e)))?;
    info!(
        "Listening on http://{} (conversion {})",
        config.bind,
        if platform_supported {
            "enabled"
        } else {
            "unavailable on this platform"
        }
    );

    axum::serve(listener, app)
        .await
        .map_err(|e| Sheet2PdfError::Internal(format!("Server error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_listener() {
        let config = ServerConfig::default();
        assert_eq!(config.bind.to_string(), "127.0.0.1:5000");
        assert_eq!(config.max_upload_bytes, 52_428_800);
    }
}
