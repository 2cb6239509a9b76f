//! Error types for the TriAI MCP server.
//!
//! Every backend raises `DbError`; the tool provider is the single place where
//! an error is turned into a `{success: false, error}` envelope. Messages are
//! written for the agents that read them, so they say what to try next.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Backend unreachable after the bounded reconnect attempts.
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    /// The backend rejected a statement. `sql` is the offending text.
    #[error("Query failed: {message} | SQL: {sql}")]
    Query {
        message: String,
        sql: String,
        /// Driver error code, e.g. "42P01" (PostgreSQL) or "208" (SQL Server)
        code: Option<String>,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u32,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a query error for the given SQL text.
    pub fn query(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql: sql.into(),
            code: None,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool { name: name.into() }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Attach the statement text to a query error produced by a driver conversion.
    ///
    /// Driver errors are converted before the caller knows which SQL failed, so
    /// backends call this on the way out. Other variants are returned unchanged.
    pub fn with_sql(self, statement: &str) -> Self {
        match self {
            Self::Query { message, code, .. } => Self::Query {
                message,
                sql: statement.to_string(),
                code,
            },
            other => other,
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Query { .. } => Some("Check the SQL syntax and referenced objects"),
            Self::UnknownTool { .. } => Some("Call one of the tools listed in available_tools"),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => DbError::Query {
                message: db_err.message().to_string(),
                sql: String::new(),
                code: db_err.code().map(|c| c.to_string()),
            },
            sqlx::Error::RowNotFound => DbError::query("No rows returned", String::new()),
            sqlx::Error::PoolTimedOut => DbError::timeout("connection acquire", 30),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection is closed", "Reconnect to the database")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::query(format!("Column not found: {}", col), String::new())
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Convert SQL Server driver errors to DbError.
impl From<tiberius::error::Error> for DbError {
    fn from(err: tiberius::error::Error) -> Self {
        use tiberius::error::Error as TdsError;

        match err {
            TdsError::Server(token) => DbError::Query {
                message: token.message().to_string(),
                sql: String::new(),
                code: Some(token.code().to_string()),
            },
            TdsError::Io { kind, message } => DbError::connection(
                format!("I/O error ({:?}): {}", kind, message),
                "Check network connectivity and SQL Server status",
            ),
            TdsError::Tls(msg) => DbError::connection(
                format!("TLS error: {}", msg),
                "Add TrustServerCertificate=true for self-signed server certificates",
            ),
            TdsError::Routing { host, port } => DbError::connection(
                format!("Server requested a redirect to {}:{}", host, port),
                "Connect to the routed host directly",
            ),
            other => DbError::internal(format!("SQL Server driver error: {}", other)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Build suggestion data as JSON value.
fn suggestion_data(suggestion: Option<&str>) -> Option<serde_json::Value> {
    suggestion.map(|s| serde_json::json!({ "suggestion": s }))
}

/// Convert DbError to MCP ErrorData for protocol-level failures.
///
/// Tool calls never reach this path; they answer with an envelope. It is used
/// where the MCP layer itself cannot proceed (transport startup, bad requests).
impl From<DbError> for rmcp::ErrorData {
    fn from(err: DbError) -> Self {
        let data = suggestion_data(err.suggestion());
        match &err {
            DbError::InvalidInput { .. } | DbError::Query { .. } => {
                rmcp::ErrorData::invalid_params(err.to_string(), data)
            }
            DbError::UnknownTool { .. } => rmcp::ErrorData::resource_not_found(err.to_string(), data),
            DbError::Connection { .. } | DbError::Timeout { .. } | DbError::Internal { .. } => {
                rmcp::ErrorData::internal_error(err.to_string(), data)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_query_error_carries_sql() {
        let err = DbError::query("relation does not exist", "SELECT * FROM nope");
        assert!(err.to_string().contains("SELECT * FROM nope"));
    }

    #[test]
    fn test_with_sql_fills_driver_error() {
        let err = DbError::Query {
            message: "syntax error".into(),
            sql: String::new(),
            code: Some("42601".into()),
        }
        .with_sql("SELEC 1");
        match err {
            DbError::Query { sql, code, .. } => {
                assert_eq!(sql, "SELEC 1");
                assert_eq!(code.as_deref(), Some("42601"));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_with_sql_leaves_other_variants() {
        let err = DbError::connection("down", "retry").with_sql("SELECT 1");
        assert!(matches!(err, DbError::Connection { .. }));
    }

    #[test]
    fn test_error_retryable() {
        assert!(DbError::timeout("query", 30).is_retryable());
        assert!(DbError::connection("err", "sugg").is_retryable());
        assert!(!DbError::invalid_input("bad").is_retryable());
        assert!(!DbError::query("bad", "SELECT").is_retryable());
    }

    #[test]
    fn test_invalid_input_maps_to_invalid_params() {
        let mcp_err: rmcp::ErrorData = DbError::invalid_input("bad input").into();
        assert_eq!(mcp_err.code.0, -32602);
    }

    #[test]
    fn test_unknown_tool_maps_to_resource_not_found() {
        let mcp_err: rmcp::ErrorData = DbError::unknown_tool("nope").into();
        assert_eq!(mcp_err.code.0, -32002);
    }

    #[test]
    fn test_connection_maps_to_internal_error_with_suggestion() {
        let mcp_err: rmcp::ErrorData = DbError::connection("failed", "try reconnecting").into();
        assert_eq!(mcp_err.code.0, -32603);
        let data = mcp_err.data.unwrap();
        assert_eq!(data["suggestion"], "try reconnecting");
    }

    #[test]
    fn test_internal_maps_to_internal_error() {
        let mcp_err: rmcp::ErrorData = DbError::internal("unknown error").into();
        assert_eq!(mcp_err.code.0, -32603);
        assert!(mcp_err.data.is_none());
    }
}
