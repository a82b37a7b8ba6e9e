// Copyright (C) 2026  Leadtime Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//! HTTP server for the Prometheus scrape endpoint
//!
//! Serves `/metrics` in the text exposition format and `/health` for
//! liveness probes.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::{types::MetricsConfig, MetricsRegistry};

const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

/// HTTP server for Prometheus metrics
#[derive(Clone)]
pub struct MetricsServer {
    registry: MetricsRegistry,
    config: MetricsConfig,
}

impl MetricsServer {
    /// Create a new metrics server listening on all interfaces at `port`
    pub fn new(registry: MetricsRegistry, port: u16) -> Self {
        Self {
            registry,
            config: MetricsConfig::with_port(port),
        }
    }

    /// Create a new metrics server with custom configuration
    pub fn with_config(registry: MetricsRegistry, config: MetricsConfig) -> Self {
        Self { registry, config }
    }

    /// Get the bind address for the server
    pub fn bind_address(&self) -> String {
        self.config.socket_addr()
    }

    /// Router exposing `/metrics` and `/health`
    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .with_state(self.registry.clone())
    }

    /// Bind the configured address
    pub async fn bind(&self) -> anyhow::Result<TcpListener> {
        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind metrics server to {}: {}", addr, e))?;
        Ok(listener)
    }

    /// Start the metrics server and run until `shutdown` resolves.
    ///
    /// Returns immediately when the endpoint is disabled.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.config.enabled {
            info!("Metrics server disabled");
            return Ok(());
        }

        let listener = self.bind().await?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: Option<SocketAddr> = listener.local_addr().ok();
        if let Some(addr) = addr {
            info!("Metrics server listening on http://{}/metrics", addr);
        }

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| anyhow::anyhow!("Metrics server error: {}", e))
    }
}

async fn metrics_handler(State(registry): State<MetricsRegistry>) -> Response {
    match registry.encode() {
        Ok(body) => {
            debug!(bytes = body.len(), "Serving metrics");
            (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response()
        }
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
                .into_response()
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_server_creation() {
        let registry = MetricsRegistry::new().unwrap();
        let server = MetricsServer::new(registry, 9191);

        assert_eq!(server.bind_address(), "0.0.0.0:9191");
    }

    #[tokio::test]
    async fn test_disabled_server() {
        let registry = MetricsRegistry::new().unwrap();
        let config = MetricsConfig {
            port: 9092,
            enabled: false,
            bind_address: "127.0.0.1".to_string(),
        };

        let server = MetricsServer::with_config(registry, config);
        let result = server.serve(std::future::pending()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_bind_failure_reported() {
        let registry = MetricsRegistry::new().unwrap();
        let config = MetricsConfig {
            port: 9093,
            enabled: true,
            bind_address: "256.0.0.1".to_string(),
        };

        let server = MetricsServer::with_config(registry, config);
        assert!(server.serve(async {}).await.is_err());
    }
}
