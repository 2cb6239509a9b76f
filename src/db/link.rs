//! The `DataLink` contract and the backend dispatcher.
//!
//! A data link runs SQL text against one storage engine and hands rows back as
//! JSON maps in the order the engine produced them. Links raise `DbError`; they
//! never wrap results in an envelope.

use crate::db::log::{DEFAULT_LOG_CAPACITY, LinkLog};
use crate::db::mock::MockLink;
use crate::db::postgres::PostgresLink;
use crate::db::sql;
use crate::db::sqlserver::SqlServerLink;
use crate::db::BackendKind;
use crate::error::{DbError, DbResult};
use crate::impl_link_dispatch;
use crate::models::Row;
use serde_json::Value as JsonValue;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Rows per generated INSERT statement.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Settings every link is built with. Read once at startup.
#[derive(Debug, Clone)]
pub struct LinkOptions {
    /// Database used when a call names none.
    pub home_database: String,
    pub log_capacity: usize,
    /// Connection attempts before giving up.
    pub retries: u32,
    /// Base delay; attempt `n` waits `retry_delay * 2^n`.
    pub retry_delay: Duration,
    /// Wrap multi-statement bulk writes in one transaction.
    pub atomic_bulk: bool,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            home_database: "TriAI_Main".to_string(),
            log_capacity: DEFAULT_LOG_CAPACITY,
            retries: 3,
            retry_delay: Duration::from_millis(1000),
            atomic_bulk: false,
        }
    }
}

/// Per-call knobs for `bulk_insert` and `upsert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub chunk_size: usize,
    /// Render the SQL and return it instead of running it.
    pub dry_run: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            dry_run: false,
        }
    }
}

impl WriteOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }
}

/// Uniform query surface over one storage engine.
///
/// `database: None` targets the link's home database. Network links keep one
/// connection per database behind a mutex, so a connection is only ever used
/// by one statement at a time.
pub trait DataLink: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn home_database(&self) -> &str;

    /// The link's diagnostic ring buffer.
    fn link_log(&self) -> &LinkLog;

    /// Run a statement that returns rows.
    fn query_in(
        &self,
        database: Option<&str>,
        sql: &str,
    ) -> impl Future<Output = DbResult<Vec<Row>>> + Send;

    /// Run a statement for its effect. Returns the affected row count when the
    /// engine reports one.
    fn execute_in(
        &self,
        database: Option<&str>,
        sql: &str,
    ) -> impl Future<Output = DbResult<u64>> + Send;

    fn query(&self, sql: &str) -> impl Future<Output = DbResult<Vec<Row>>> + Send {
        self.query_in(None, sql)
    }

    fn execute(&self, sql: &str) -> impl Future<Output = DbResult<u64>> + Send {
        self.execute_in(None, sql)
    }

    fn escape(&self, value: &JsonValue, quote: bool) -> String {
        sql::escape(value, quote)
    }

    /// Insert `rows` in chunks of at most `options.chunk_size`.
    ///
    /// Returns the generated SQL on a dry run, `None` otherwise (and for empty
    /// input). Without `atomic_bulk` a failing chunk leaves earlier chunks
    /// committed.
    fn bulk_insert(
        &self,
        table: &str,
        rows: &[Row],
        options: WriteOptions,
    ) -> impl Future<Output = DbResult<Option<String>>> + Send;

    /// Insert one row and return the identity the engine assigned to `id_column`.
    ///
    /// The id comes back from the insert statement itself, so concurrent
    /// inserts into the same table cannot be confused with each other.
    fn insert_returning(
        &self,
        table: &str,
        row: &Row,
        id_column: &str,
    ) -> impl Future<Output = DbResult<Option<i64>>> + Send {
        async move {
            let statement = sql::insert_returning_statement(self.kind(), table, row, id_column);
            let rows = self.query(&statement).await?;
            Ok(rows.first().and_then(|returned| {
                returned
                    .iter()
                    .find(|(column, _)| column.eq_ignore_ascii_case(id_column))
                    .and_then(|(_, value)| value.as_i64())
            }))
        }
    }

    /// Overwrite non-key columns of rows matching `key_columns`, insert the rest.
    /// Empty `key_columns` is a plain insert.
    fn upsert(
        &self,
        table: &str,
        rows: &[Row],
        key_columns: &[String],
        options: WriteOptions,
    ) -> impl Future<Output = DbResult<Option<String>>> + Send;

    fn log(&self, message: &str) {
        self.link_log().push(message);
    }

    /// Last `n` log entries, oldest first.
    fn read_log(&self, n: usize) -> Vec<String> {
        self.link_log().tail(n)
    }

    /// Probe the home database. Never raises.
    fn test_connection(&self) -> impl Future<Output = bool> + Send {
        async move {
            match self.query("SELECT 1").await {
                Ok(_) => true,
                Err(e) => {
                    self.log(&format!("Connection test failed: {}", e));
                    false
                }
            }
        }
    }
}

/// Run `connect` up to `options.retries` times with exponential backoff.
///
/// Every failure is logged to the link's ring buffer. Only retryable errors
/// (see [`DbError::is_retryable`]) are tried again; a rejected login or a bad
/// database name stops at once. Either way the failure is reported as
/// `DbError::Connection` naming the last cause.
pub(crate) async fn connect_with_retry<T, F, Fut>(
    options: &LinkOptions,
    log: &LinkLog,
    endpoint: &str,
    connect: F,
) -> DbResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let attempts = options.retries.max(1);
    let mut tried = 0;
    let mut last_error = None;

    for attempt in 0..attempts {
        tried = attempt + 1;
        match connect().await {
            Ok(conn) => {
                if attempt > 0 {
                    info!(endpoint = %endpoint, attempt = attempt + 1, "connected after retry");
                }
                log.push(&format!("Connected to {}", endpoint));
                return Ok(conn);
            }
            Err(error) => {
                log.push(&format!(
                    "Connection attempt {}/{} to {} failed: {}",
                    attempt + 1,
                    attempts,
                    endpoint,
                    error
                ));
                if !error.is_retryable() {
                    last_error = Some(error);
                    break;
                }
                if attempt + 1 < attempts {
                    let delay = options.retry_delay * 2_u32.saturating_pow(attempt);
                    warn!(
                        endpoint = %endpoint,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "connection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_error = Some(error);
            }
        }
    }

    let cause = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no attempt was made".to_string());
    Err(DbError::connection(
        format!(
            "Could not connect to {} after {} attempt(s): {}",
            endpoint, tried, cause
        ),
        "Check that the database server is running and the connection string is correct",
    ))
}

/// The active link, chosen once at startup.
#[derive(Debug)]
pub enum Backend {
    Mock(MockLink),
    Postgres(PostgresLink),
    SqlServer(SqlServerLink),
}

impl Backend {
    /// Build the link for `kind`. Network links connect lazily on first use.
    pub fn open(kind: BackendKind, url: Option<&str>, options: LinkOptions) -> DbResult<Self> {
        let require_url = || {
            url.filter(|u| !u.trim().is_empty()).ok_or_else(|| {
                DbError::invalid_input(format!("The {} backend needs a database URL", kind))
            })
        };
        let backend = match kind {
            BackendKind::Mock => Backend::Mock(MockLink::new(options)),
            BackendKind::Postgres => Backend::Postgres(PostgresLink::new(require_url()?, options)?),
            BackendKind::SqlServer => {
                Backend::SqlServer(SqlServerLink::new(require_url()?, options)?)
            }
        };
        info!(backend = %kind, "data link ready");
        Ok(backend)
    }
}

impl DataLink for Backend {
    fn kind(&self) -> BackendKind {
        impl_link_dispatch!(self, link => link.kind())
    }

    fn home_database(&self) -> &str {
        impl_link_dispatch!(self, link => link.home_database())
    }

    fn link_log(&self) -> &LinkLog {
        impl_link_dispatch!(self, link => link.link_log())
    }

    async fn query_in(&self, database: Option<&str>, sql: &str) -> DbResult<Vec<Row>> {
        impl_link_dispatch!(self, link => link.query_in(database, sql).await)
    }

    async fn execute_in(&self, database: Option<&str>, sql: &str) -> DbResult<u64> {
        impl_link_dispatch!(self, link => link.execute_in(database, sql).await)
    }

    async fn bulk_insert(
        &self,
        table: &str,
        rows: &[Row],
        options: WriteOptions,
    ) -> DbResult<Option<String>> {
        impl_link_dispatch!(self, link => link.bulk_insert(table, rows, options).await)
    }

    async fn insert_returning(
        &self,
        table: &str,
        row: &Row,
        id_column: &str,
    ) -> DbResult<Option<i64>> {
        impl_link_dispatch!(self, link => link.insert_returning(table, row, id_column).await)
    }

    async fn upsert(
        &self,
        table: &str,
        rows: &[Row],
        key_columns: &[String],
        options: WriteOptions,
    ) -> DbResult<Option<String>> {
        impl_link_dispatch!(self, link => link.upsert(table, rows, key_columns, options).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_options(retries: u32) -> LinkOptions {
        LinkOptions {
            retries,
            retry_delay: Duration::from_millis(1),
            ..LinkOptions::default()
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let log = LinkLog::new(10);
        let calls = AtomicU32::new(0);
        let result = connect_with_retry(&fast_options(3), &log, "db", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(DbError::connection("refused", "retry"))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(log.len(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_with_connection_error() {
        let log = LinkLog::new(10);
        let calls = AtomicU32::new(0);
        let result: DbResult<()> = connect_with_retry(&fast_options(2), &log, "db", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DbError::connection("refused", "retry"))
        })
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, DbError::Connection { .. }));
        assert!(err.to_string().contains("after 2 attempt(s)"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_stops_on_non_retryable_error() {
        let log = LinkLog::new(10);
        let calls = AtomicU32::new(0);
        let result: DbResult<()> = connect_with_retry(&fast_options(5), &log, "db", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DbError::query("password authentication failed", ""))
        })
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, DbError::Connection { .. }));
        assert!(err.to_string().contains("after 1 attempt(s)"));
        assert!(err.to_string().contains("password authentication failed"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_network_backend_requires_url() {
        let err = Backend::open(BackendKind::Postgres, None, LinkOptions::default()).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
        let err = Backend::open(BackendKind::SqlServer, Some("  "), LinkOptions::default()).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[test]
    fn test_mock_backend_opens_without_url() {
        let backend = Backend::open(BackendKind::Mock, None, LinkOptions::default()).unwrap();
        assert_eq!(backend.kind(), BackendKind::Mock);
        assert_eq!(backend.home_database(), "TriAI_Main");
    }

    #[test]
    fn test_write_options_defaults() {
        let opts = WriteOptions::default();
        assert_eq!(opts.chunk_size, 500);
        assert!(!opts.dry_run);
        assert!(WriteOptions::dry_run().dry_run);
    }
}
