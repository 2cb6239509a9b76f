//! Configuration handling for the TriAI MCP server.
//!
//! Everything comes from CLI arguments with environment fallbacks and is read
//! once at startup.

use crate::db::{BackendKind, DEFAULT_LOG_CAPACITY, LinkOptions};
use crate::tools::provider::DEFAULT_AGENT;
use clap::{Parser, ValueEnum};
use std::time::Duration;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_MCP_ENDPOINT: &str = "/";
pub const DEFAULT_HOME_DATABASE: &str = "TriAI_Main";
pub const DEFAULT_CONNECT_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// Streamable HTTP with Server-Sent Events
    Http,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "triai-mcp-server", version, about)]
pub struct Config {
    /// Storage backend
    #[arg(long, value_enum, default_value = "mock", env = "TRIAI_BACKEND")]
    pub backend: BackendKind,

    /// PostgreSQL URL or SQL Server ADO connection string.
    /// Required for the postgres and sqlserver backends.
    #[arg(long, value_name = "URL", env = "TRIAI_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Database used when a tool call names none
    #[arg(long, default_value = DEFAULT_HOME_DATABASE, env = "TRIAI_HOME_DATABASE")]
    pub home_database: String,

    /// Agent name recorded in the query history
    #[arg(long, default_value = DEFAULT_AGENT, env = "TRIAI_AGENT")]
    pub agent: String,

    /// Entries kept in the data link's diagnostic log
    #[arg(long, default_value_t = DEFAULT_LOG_CAPACITY, env = "TRIAI_LOG_CAPACITY")]
    pub log_capacity: usize,

    /// Connection attempts before a call fails
    #[arg(long, default_value_t = DEFAULT_CONNECT_RETRIES, env = "TRIAI_CONNECT_RETRIES")]
    pub connect_retries: u32,

    /// Base reconnect delay; attempt n waits delay * 2^n
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY_MS, env = "TRIAI_RETRY_DELAY_MS")]
    pub retry_delay_ms: u64,

    /// Run multi-chunk bulk writes in a single transaction
    #[arg(long, env = "TRIAI_ATOMIC_BULK")]
    pub atomic_bulk: bool,

    /// Transport mode (stdio or http)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "stdio",
        env = "MCP_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(long, default_value = DEFAULT_HTTP_HOST, env = "MCP_HTTP_HOST")]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, env = "MCP_HTTP_PORT")]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(long, default_value = DEFAULT_MCP_ENDPOINT, env = "MCP_ENDPOINT")]
    pub mcp_endpoint: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            backend: BackendKind::Mock,
            database_url: None,
            home_database: DEFAULT_HOME_DATABASE.to_string(),
            agent: DEFAULT_AGENT.to_string(),
            log_capacity: DEFAULT_LOG_CAPACITY,
            connect_retries: DEFAULT_CONNECT_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            atomic_bulk: false,
            transport: TransportMode::Stdio,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        let has_url = self
            .database_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty());
        if self.backend != BackendKind::Mock && !has_url {
            return Err(format!(
                "The {} backend requires --database-url (or TRIAI_DATABASE_URL)",
                self.backend
            ));
        }
        if self.log_capacity == 0 {
            return Err("log_capacity must be greater than 0".to_string());
        }
        if self.connect_retries == 0 {
            return Err("connect_retries must be greater than 0".to_string());
        }
        if self.home_database.trim().is_empty() {
            return Err("home_database must not be empty".to_string());
        }
        if !self.mcp_endpoint.starts_with('/') {
            return Err(format!(
                "mcp_endpoint must start with '/': {}",
                self.mcp_endpoint
            ));
        }
        Ok(())
    }

    /// Options handed to the data link.
    pub fn link_options(&self) -> LinkOptions {
        LinkOptions {
            home_database: self.home_database.clone(),
            log_capacity: self.log_capacity,
            retries: self.connect_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            atomic_bulk: self.atomic_bulk,
        }
    }
}
