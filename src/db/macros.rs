//! Backend kind and the dispatch macro for the `Backend` enum.
//!
//! The macro expands to a plain `match` over the three variants so each arm
//! calls the concrete link directly, with no boxing or dynamic dispatch.

use clap::ValueEnum;
use serde::Serialize;

/// Which storage engine a data link talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-memory seed tables, no network
    #[default]
    Mock,
    /// PostgreSQL (lower_snake_case physical names)
    Postgres,
    /// SQL Server (PascalCase physical names, TOP row limits)
    #[value(name = "sqlserver", alias = "mssql")]
    SqlServer,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Postgres => "postgres",
            Self::SqlServer => "sqlserver",
        }
    }

    /// Whether the backend limits rows with a leading `TOP n`.
    pub fn uses_top(&self) -> bool {
        matches!(self, Self::SqlServer)
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Macro for generating backend dispatch match arms.
///
/// # Example
///
/// ```ignore
/// impl_link_dispatch!(self, link => link.query_in(database, sql).await)
/// ```
#[macro_export]
macro_rules! impl_link_dispatch {
    ($backend:expr, $link:ident => $body:expr) => {
        match $backend {
            $crate::db::link::Backend::Mock($link) => $body,
            $crate::db::link::Backend::Postgres($link) => $body,
            $crate::db::link::Backend::SqlServer($link) => $body,
        }
    };
}

pub use impl_link_dispatch;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_display() {
        assert_eq!(BackendKind::Mock.to_string(), "mock");
        assert_eq!(BackendKind::Postgres.to_string(), "postgres");
        assert_eq!(BackendKind::SqlServer.to_string(), "sqlserver");
    }

    #[test]
    fn test_backend_kind_from_cli_value() {
        assert_eq!(
            BackendKind::from_str("sqlserver", true).unwrap(),
            BackendKind::SqlServer
        );
        assert_eq!(
            BackendKind::from_str("mssql", true).unwrap(),
            BackendKind::SqlServer
        );
        assert_eq!(
            BackendKind::from_str("POSTGRES", true).unwrap(),
            BackendKind::Postgres
        );
        assert!(BackendKind::from_str("oracle", true).is_err());
    }

    #[test]
    fn test_only_sqlserver_uses_top() {
        assert!(BackendKind::SqlServer.uses_top());
        assert!(!BackendKind::Postgres.uses_top());
        assert!(!BackendKind::Mock.uses_top());
    }
}
