//! Embedded DuckDB backend.
//!
//! Runs dumps into a local database file without a server. Only the
//! MySQL syntax DuckDB understands will execute: no backtick identifiers,
//! no `\'` escapes, no table options.

use super::{ConnectionSettings, Connector, DbConnection, QueryOutcome};
use crate::error::ImportError;
use ::duckdb::Connection;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Opens DuckDB databases. Host, port, and credentials in the settings
/// are ignored; `database` names the schema selected after opening.
#[derive(Debug, Clone, Default)]
pub struct DuckDbConnector {
    /// `None` opens a fresh in-memory database per connection
    path: Option<PathBuf>,
}

impl DuckDbConnector {
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
        }
    }

    pub fn in_memory() -> Self {
        Self { path: None }
    }
}

pub struct DuckDbConnection {
    conn: Connection,
}

impl DuckDbConnection {
    /// The underlying DuckDB handle, for reading back imported data.
    pub fn handle(&self) -> &Connection {
        &self.conn
    }
}

fn quote_schema(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[async_trait]
impl Connector for DuckDbConnector {
    type Connection = DuckDbConnection;

    async fn connect(&self, settings: &ConnectionSettings) -> Result<DuckDbConnection, ImportError> {
        let conn = match &self.path {
            Some(path) => Connection::open(path).map_err(|e| {
                ImportError::Connection(format!(
                    "failed to open DuckDB database {}: {}",
                    path.display(),
                    e
                ))
            })?,
            None => Connection::open_in_memory().map_err(|e| {
                ImportError::Connection(format!("failed to create in-memory DuckDB database: {e}"))
            })?,
        };

        let mut session = DuckDbConnection { conn };
        if let Some(database) = &settings.database {
            session.select_database(database).await?;
        }
        Ok(session)
    }
}

#[async_trait]
impl DbConnection for DuckDbConnection {
    async fn query(&mut self, sql: &str) -> Result<QueryOutcome, ImportError> {
        let rows = self
            .conn
            .execute(sql, [])
            .map_err(|e| ImportError::sql_execution(e.to_string(), sql))?;
        Ok(QueryOutcome {
            rows_affected: rows as u64,
        })
    }

    async fn select_database(&mut self, name: &str) -> Result<(), ImportError> {
        self.conn
            .execute_batch(&format!("USE {}", quote_schema(name)))
            .map_err(|e| ImportError::Connection(format!("cannot use database {name}: {e}")))
    }

    async fn close(self, force: bool) -> Result<(), ImportError> {
        if force {
            drop(self.conn);
            return Ok(());
        }
        self.conn
            .close()
            .map_err(|(_, e)| ImportError::Connection(e.to_string()))
    }
}
