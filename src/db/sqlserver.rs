//! SQL Server data link over `tiberius`.
//!
//! Connections are plain TCP streams wrapped with the `tokio-util` compat
//! layer. Like the PostgreSQL link, each database gets one lazily opened
//! connection behind its own async mutex.

use crate::db::link::{DataLink, LinkOptions, WriteOptions, connect_with_retry};
use crate::db::log::LinkLog;
use crate::db::types::tds_row_to_json;
use crate::db::{BackendKind, sql};
use crate::error::{DbError, DbResult};
use crate::models::Row;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tiberius::{Client, Config};
use tokio::net::TcpStream;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, warn};

/// SQL Server rejects more than 1000 row value expressions per INSERT.
const MAX_VALUES_ROWS: usize = 1000;

type TdsClient = Client<Compat<TcpStream>>;
type Slot = Arc<AsyncMutex<Option<TdsClient>>>;

pub struct SqlServerLink {
    ado: String,
    address: String,
    home_database: String,
    options: LinkOptions,
    log: LinkLog,
    slots: Mutex<HashMap<String, Slot>>,
}

impl std::fmt::Debug for SqlServerLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlServerLink")
            .field("address", &self.address)
            .field("home_database", &self.home_database)
            .finish_non_exhaustive()
    }
}

/// Value of the first `key=value` pair in an ADO string matching one of `keys`.
fn ado_value<'a>(ado: &'a str, keys: &[&str]) -> Option<&'a str> {
    ado.split(';').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        let key = key.trim();
        keys.iter()
            .any(|k| k.eq_ignore_ascii_case(key))
            .then(|| value.trim())
            .filter(|v| !v.is_empty())
    })
}

impl SqlServerLink {
    /// Validate the ADO connection string and prepare the link. No connection
    /// is opened yet.
    pub fn new(ado: &str, options: LinkOptions) -> DbResult<Self> {
        let config = Config::from_ado_string(ado).map_err(|e| {
            DbError::connection(
                format!("Invalid SQL Server connection string: {}", e),
                "Use server=tcp:host,1433;database=TriAI_Main;user=sa;password=...;TrustServerCertificate=true",
            )
        })?;
        let home_database = ado_value(ado, &["database", "initial catalog"])
            .map(str::to_string)
            .unwrap_or_else(|| options.home_database.clone());

        Ok(Self {
            ado: ado.to_string(),
            address: config.get_addr(),
            home_database,
            log: LinkLog::new(options.log_capacity),
            options,
            slots: Mutex::new(HashMap::new()),
        })
    }

    fn config_for(&self, database: &str) -> DbResult<Config> {
        let mut config = Config::from_ado_string(&self.ado)?;
        config.database(database);
        Ok(config)
    }

    /// Open a client, following one routing redirect (Azure SQL gateways).
    async fn open(mut config: Config) -> DbResult<TdsClient> {
        let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
            DbError::connection(
                format!("TCP connect to {} failed: {}", config.get_addr(), e),
                "Check the server address and that SQL Server accepts TCP connections",
            )
        })?;
        tcp.set_nodelay(true).map_err(|e| DbError::internal(e.to_string()))?;

        match Client::connect(config.clone(), tcp.compat_write()).await {
            Ok(client) => Ok(client),
            Err(tiberius::error::Error::Routing { host, port }) => {
                config.host(&host);
                config.port(port);
                let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
                    DbError::connection(
                        format!("TCP connect to routed host {}:{} failed: {}", host, port, e),
                        "Check that the routed host is reachable",
                    )
                })?;
                tcp.set_nodelay(true).map_err(|e| DbError::internal(e.to_string()))?;
                Ok(Client::connect(config, tcp.compat_write()).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn slot(&self, database: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(database.to_string()).or_default().clone()
    }

    async fn checkout(&self, database: &str) -> DbResult<OwnedMutexGuard<Option<TdsClient>>> {
        let mut guard = self.slot(database).lock_owned().await;

        if let Some(client) = guard.as_mut() {
            let probe = match client.simple_query("SELECT 1").await {
                Ok(stream) => stream.into_results().await.map(|_| ()),
                Err(e) => Err(e),
            };
            match probe {
                Ok(()) => return Ok(guard),
                Err(e) => {
                    warn!(database = %database, error = %e, "liveness probe failed, reconnecting");
                    self.log
                        .push(&format!("Connection to {} lost ({}), reconnecting", database, e));
                    *guard = None;
                }
            }
        }

        let config = self.config_for(database)?;
        let endpoint = format!("{}/{}", self.address, database);
        let client = connect_with_retry(&self.options, &self.log, &endpoint, || {
            Self::open(config.clone())
        })
        .await?;
        *guard = Some(client);
        Ok(guard)
    }

    fn discard_if_broken(guard: &mut OwnedMutexGuard<Option<TdsClient>>, err: &tiberius::error::Error) {
        if matches!(err, tiberius::error::Error::Io { .. } | tiberius::error::Error::Tls(_)) {
            **guard = None;
        }
    }

    async fn run_batch(
        &self,
        table: &str,
        statements: Vec<String>,
        options: WriteOptions,
    ) -> DbResult<Option<String>> {
        if options.dry_run {
            return Ok(Some(sql::join_statements(&statements)));
        }
        let mut guard = self.checkout(&self.home_database).await?;
        let Some(client) = guard.as_mut() else {
            return Err(DbError::internal("connection slot empty after checkout"));
        };
        let total = statements.len();

        if self.options.atomic_bulk {
            let batch = format!(
                "SET XACT_ABORT ON; BEGIN TRANSACTION; {}; COMMIT TRANSACTION;",
                statements.join("; ")
            );
            if let Err(e) = client.execute(batch.as_str(), &[]).await {
                Self::discard_if_broken(&mut guard, &e);
                let err = DbError::from(e).with_sql(&batch);
                self.log.push(&format!("Bulk write to {} rolled back: {}", table, err));
                return Err(err);
            }
        } else {
            for (idx, statement) in statements.iter().enumerate() {
                if let Err(e) = client.execute(statement.as_str(), &[]).await {
                    Self::discard_if_broken(&mut guard, &e);
                    let err = match DbError::from(e).with_sql(statement) {
                        DbError::Query { message, sql, code } => DbError::Query {
                            message: format!("chunk {}/{}: {}", idx + 1, total, message),
                            sql,
                            code,
                        },
                        other => other,
                    };
                    self.log.push(&format!(
                        "Bulk write to {} stopped, {} of {} chunks committed: {}",
                        table, idx, total, err
                    ));
                    return Err(err);
                }
            }
        }

        self.log
            .push(&format!("Bulk wrote {} chunks into {}", total, table));
        Ok(None)
    }
}

impl DataLink for SqlServerLink {
    fn kind(&self) -> BackendKind {
        BackendKind::SqlServer
    }

    fn home_database(&self) -> &str {
        &self.home_database
    }

    fn link_log(&self) -> &LinkLog {
        &self.log
    }

    async fn query_in(&self, database: Option<&str>, sql: &str) -> DbResult<Vec<Row>> {
        let database = database.unwrap_or(&self.home_database);
        debug!(database = %database, sql = %sql, "sqlserver query");
        let mut guard = self.checkout(database).await?;
        let Some(client) = guard.as_mut() else {
            return Err(DbError::internal("connection slot empty after checkout"));
        };

        let rows = match client.simple_query(sql).await {
            Ok(stream) => stream.into_first_result().await,
            Err(e) => Err(e),
        };
        match rows {
            Ok(rows) => Ok(rows.into_iter().map(tds_row_to_json).collect()),
            Err(e) => {
                Self::discard_if_broken(&mut guard, &e);
                let err = DbError::from(e).with_sql(sql);
                self.log.push(&format!("SQL GET Error: {}", err));
                Err(err)
            }
        }
    }

    async fn execute_in(&self, database: Option<&str>, sql: &str) -> DbResult<u64> {
        let database = database.unwrap_or(&self.home_database);
        debug!(database = %database, sql = %sql, "sqlserver execute");
        let mut guard = self.checkout(database).await?;
        let Some(client) = guard.as_mut() else {
            return Err(DbError::internal("connection slot empty after checkout"));
        };

        match client.execute(sql, &[]).await {
            Ok(result) => Ok(result.total()),
            Err(e) => {
                Self::discard_if_broken(&mut guard, &e);
                let err = DbError::from(e).with_sql(sql);
                self.log.push(&format!("SQL RUN Error: {}", err));
                Err(err)
            }
        }
    }

    async fn bulk_insert(
        &self,
        table: &str,
        rows: &[Row],
        options: WriteOptions,
    ) -> DbResult<Option<String>> {
        if rows.is_empty() {
            return Ok(None);
        }
        let chunk_size = options.chunk_size.min(MAX_VALUES_ROWS);
        let statements = sql::insert_statements(self.kind(), table, rows, chunk_size);
        self.run_batch(table, statements, options).await
    }

    async fn upsert(
        &self,
        table: &str,
        rows: &[Row],
        key_columns: &[String],
        options: WriteOptions,
    ) -> DbResult<Option<String>> {
        if key_columns.is_empty() {
            return self.bulk_insert(table, rows, options).await;
        }
        if rows.is_empty() {
            return Ok(None);
        }
        let statements =
            sql::upsert_statements(self.kind(), table, rows, key_columns, options.chunk_size);
        self.run_batch(table, statements, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ADO: &str =
        "server=tcp:localhost,1433;database=TriAI;user=sa;password=Secret1!;TrustServerCertificate=true";

    fn link() -> SqlServerLink {
        SqlServerLink::new(ADO, LinkOptions::default()).unwrap()
    }

    #[test]
    fn test_home_database_from_ado_string() {
        assert_eq!(link().home_database(), "TriAI");
        let bare = SqlServerLink::new("server=tcp:localhost,1433;user=sa", LinkOptions::default())
            .unwrap();
        assert_eq!(bare.home_database(), "TriAI_Main");
    }

    #[test]
    fn test_ado_value_lookup() {
        assert_eq!(
            ado_value("Server=x;Initial Catalog=Sales", &["database", "initial catalog"]),
            Some("Sales")
        );
        assert_eq!(ado_value("Server=x;Database=", &["database"]), None);
    }

    #[test]
    fn test_debug_hides_password() {
        let rendered = format!("{:?}", link());
        assert!(!rendered.contains("Secret1!"));
        assert!(rendered.contains("localhost:1433"));
    }

    #[tokio::test]
    async fn test_dry_run_sql() {
        let link = link();
        let rows: Vec<Row> = (0..3)
            .map(|i| json!({"Agent": "DataAnalyst", "Memory_ID": i, "Active": true}))
            .map(|v| v.as_object().unwrap().clone())
            .collect();
        let options = WriteOptions {
            chunk_size: 2,
            dry_run: true,
        };

        let sql = link.bulk_insert("AI_Memories", &rows, options).await.unwrap().unwrap();
        let statements: Vec<&str> = sql.split(";\n").collect();
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[1],
            "INSERT INTO [AI_Memories] ([Agent], [Memory_ID], [Active]) VALUES ('DataAnalyst', 2, 1)"
        );

        let sql = link
            .upsert("AI_Memories", &rows[..1], &["Memory_ID".to_string()], options)
            .await
            .unwrap()
            .unwrap();
        assert!(sql.starts_with("IF EXISTS (SELECT 1 FROM [AI_Memories] WHERE [Memory_ID] = 0)"));
    }

    #[tokio::test]
    async fn test_chunk_size_clamped_to_values_limit() {
        let rows: Vec<Row> = (0..1001)
            .map(|i| json!({"n": i}).as_object().unwrap().clone())
            .collect();
        let options = WriteOptions {
            chunk_size: 5000,
            dry_run: true,
        };
        let sql = link().bulk_insert("t", &rows, options).await.unwrap().unwrap();
        assert_eq!(sql.split(";\n").count(), 2);
    }
}
