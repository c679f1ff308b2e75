//! Database connection seam used by the import engine.
//!
//! The engine only needs four things from a driver: open a connection,
//! run a statement, switch the default database, and close. [`Connector`]
//! and [`DbConnection`] capture exactly that, so the engine stays generic
//! over the MySQL driver, the embedded DuckDB backend, and test doubles.

mod duckdb;
mod mysql;

pub use self::duckdb::{DuckDbConnection, DuckDbConnector};
pub use self::mysql::{MySqlConnector, MySqlSession};

use crate::error::ImportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3306;
pub const DEFAULT_USER: &str = "root";

/// Where and how to connect.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    /// Default database selected after connecting
    pub database: Option<String>,
    /// Unix socket path, used instead of host/port when set
    pub socket: Option<PathBuf>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            user: DEFAULT_USER.to_string(),
            password: None,
            database: None,
            socket: None,
        }
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("socket", &self.socket)
            .finish()
    }
}

/// What a successfully executed statement reports back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOutcome {
    pub rows_affected: u64,
}

/// Opens connections from settings.
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: DbConnection;

    async fn connect(&self, settings: &ConnectionSettings)
        -> Result<Self::Connection, ImportError>;
}

/// One live, stateful connection.
#[async_trait]
pub trait DbConnection: Send + Sized {
    /// Run one statement. Rejections by the server are
    /// [`ImportError::SqlExecution`]; transport failures are
    /// [`ImportError::Connection`].
    async fn query(&mut self, sql: &str) -> Result<QueryOutcome, ImportError>;

    async fn select_database(&mut self, name: &str) -> Result<(), ImportError>;

    /// Close the connection. `force` skips the graceful goodbye.
    async fn close(self, force: bool) -> Result<(), ImportError>;
}

/// Quote a MySQL identifier with backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}
