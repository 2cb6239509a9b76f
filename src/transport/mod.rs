//! Transport layer for the MCP server.
//!
//! - Stdio: standard input/output for CLI-launched agents
//! - HTTP: streamable HTTP (SSE responses) for networked agents

pub mod http;
pub mod stdio;

pub use http::HttpTransport;
pub use stdio::StdioTransport;

use crate::db::DataLink;
use crate::error::DbResult;
use crate::tools::ToolProvider;
use std::future::Future;
use tokio::signal;
use tracing::{debug, info, warn};

/// Link log entries echoed to tracing on shutdown.
const SHUTDOWN_LOG_TAIL: usize = 20;

/// Trait for MCP transport implementations.
pub trait Transport: Send + Sync {
    /// Serve until the client disconnects or a shutdown signal arrives.
    fn run(&self) -> impl Future<Output = DbResult<()>> + Send;

    /// Get the name of this transport for logging.
    fn name(&self) -> &'static str;
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
///
/// A signal source that cannot be installed is logged and never fires.
pub(crate) async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

/// Echo the tail of the link's diagnostic log before exit.
pub(crate) fn dump_link_log<L: DataLink>(provider: &ToolProvider<L>) {
    for entry in provider.link().read_log(SHUTDOWN_LOG_TAIL) {
        debug!(target: "triai::link", "{}", entry);
    }
}
