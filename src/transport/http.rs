//! Streamable HTTP transport for the MCP server.
//!
//! Serves the MCP endpoint over axum with SSE streaming responses and one
//! `TriaiService` per session, all sharing the same tool provider.

use crate::db::Backend;
use crate::error::{DbError, DbResult};
use crate::mcp::TriaiService;
use crate::tools::ToolProvider;
use crate::transport::{Transport, dump_link_log, wait_for_signal};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Time allowed for open SSE streams to finish after a shutdown signal.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpTransport {
    provider: ToolProvider<Backend>,
    host: String,
    port: u16,
    /// MCP endpoint path
    endpoint: String,
}

impl HttpTransport {
    pub fn new(
        provider: ToolProvider<Backend>,
        host: impl Into<String>,
        port: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            host: host.into(),
            port,
            endpoint: endpoint.into(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    async fn run(&self) -> DbResult<()> {
        let bind_addr = self.bind_addr();
        info!(addr = %bind_addr, "Starting MCP server with HTTP transport");

        let provider = self.provider.clone();
        let service = StreamableHttpService::new(
            move || Ok(TriaiService::new(provider.clone())),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        // nest_service rejects "/", so the root endpoint uses fallback_service
        let app = if self.endpoint == "/" {
            axum::Router::new().fallback_service(service)
        } else {
            axum::Router::new().nest_service(&self.endpoint, service)
        };

        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            DbError::connection(
                format!("Failed to bind to {}: {}", bind_addr, e),
                "Check that the port is available",
            )
        })?;
        info!(endpoint = %self.endpoint, "MCP endpoint ready");

        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let notify = shutdown_notify.clone();
        let shutdown_signal = async move {
            wait_for_signal().await;
            notify.notify_one();
        };

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => info!("HTTP server stopped"),
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        return Err(DbError::internal(format!("HTTP server error: {}", e)));
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Waiting for connections to close (send signal again to force exit)..."
                );
                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => {}
        }

        dump_link_log(&self.provider);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{BackendKind, LinkOptions};

    fn provider() -> ToolProvider<Backend> {
        let backend = Backend::open(BackendKind::Mock, None, LinkOptions::default()).unwrap();
        ToolProvider::new(Arc::new(backend), "system")
    }

    #[test]
    fn test_http_transport_creation() {
        let transport = HttpTransport::new(provider(), "127.0.0.1", 8080, "/mcp");
        assert_eq!(transport.name(), "http");
        assert_eq!(transport.bind_addr(), "127.0.0.1:8080");
        assert_eq!(transport.endpoint(), "/mcp");
    }

    #[test]
    fn test_http_transport_root_endpoint() {
        let transport = HttpTransport::new(provider(), "0.0.0.0", 3000, "/");
        assert_eq!(transport.bind_addr(), "0.0.0.0:3000");
        assert_eq!(transport.endpoint(), "/");
    }
}
