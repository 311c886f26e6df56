use std::net::SocketAddr;

use axum::{Router, http::HeaderValue, response::IntoResponse, routing::get};
use ethindex_metrics::gather_default_metrics;
use tracing::{info, warn};

pub async fn start_metrics_server(address: SocketAddr) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!(%address, "Serving metrics");
    axum::serve(listener, metrics_router()).await?;
    Ok(())
}

pub fn metrics_router() -> Router {
    Router::new()
        .route("/metrics", get(get_metrics))
        .route("/health", get(get_health))
}

async fn get_health() -> impl IntoResponse {
    r#"{"status": "healthy", "service": "ethindex"}"#
}

async fn get_metrics() -> impl IntoResponse {
    let mut response = gather_default_metrics()
        .inspect_err(|err| {
            warn!(%err, "Failed to gather Prometheus metrics");
        })
        .unwrap_or_default()
        .into_response();
    let content_type = HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8");
    response.headers_mut().insert("content-type", content_type);
    response
}
