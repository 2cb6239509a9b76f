//! Data access layer.
//!
//! This module provides:
//! - The `DataLink` trait and the `Backend` dispatcher
//! - Mock, PostgreSQL and SQL Server links
//! - SQL literal and statement rendering
//! - Row to JSON conversion for the network drivers
//! - The per-link diagnostic ring buffer

pub mod link;
pub mod log;
#[macro_use]
pub mod macros;
pub mod mock;
pub mod postgres;
pub mod sql;
pub mod sqlserver;
pub mod types;

pub use link::{Backend, DataLink, LinkOptions, WriteOptions};
pub use log::{DEFAULT_LOG_CAPACITY, LinkLog};
pub use macros::BackendKind;
pub use mock::MockLink;
pub use postgres::PostgresLink;
pub use sqlserver::SqlServerLink;
