//! Stdio transport for the MCP server.
//!
//! Reads JSON-RPC messages from stdin and writes responses to stdout, the
//! standard mode for agents that launch the server as a child process.

use crate::db::Backend;
use crate::error::{DbError, DbResult};
use crate::mcp::TriaiService;
use crate::tools::ToolProvider;
use crate::transport::{Transport, dump_link_log, wait_for_signal};
use rmcp::{ServiceExt, transport::stdio};
use tracing::{info, warn};

pub struct StdioTransport {
    provider: ToolProvider<Backend>,
}

impl StdioTransport {
    pub fn new(provider: ToolProvider<Backend>) -> Self {
        Self { provider }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> DbResult<()> {
        info!("Starting MCP server with stdio transport");

        let service = TriaiService::new(self.provider.clone());
        let running_service = service.serve(stdio()).await.map_err(|e| {
            DbError::internal(format!("Failed to start stdio transport: {}", e))
        })?;

        let shutdown_requested = tokio::select! {
            result = running_service.waiting() => {
                match result {
                    Ok(_quit_reason) => info!("Stdio transport completed normally"),
                    Err(e) => {
                        warn!(error = %e, "Stdio transport error");
                        return Err(DbError::internal(format!("Stdio transport error: {}", e)));
                    }
                }
                false
            }
            _ = wait_for_signal() => {
                info!("Shutdown signal received (send again to force exit)");
                true
            }
        };

        dump_link_log(&self.provider);

        if shutdown_requested {
            tokio::spawn(async {
                wait_for_signal().await;
                warn!("Received second signal, forcing immediate exit");
                std::process::exit(1);
            });
            // A pending stdin read cannot be interrupted by tokio::select!
            info!("Exiting process");
            std::process::exit(0);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}
