//! MySQL server connections over sqlx.
//!
//! Dump statements go through the text protocol (`raw_sql`): routine and
//! trigger definitions, `LOCK TABLES`, and most `SET` forms cannot be
//! prepared.

use super::{quote_identifier, ConnectionSettings, Connector, DbConnection, QueryOutcome};
use crate::error::ImportError;
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{Connection, Executor};

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnector;

pub struct MySqlSession {
    conn: MySqlConnection,
}

fn connect_options(settings: &ConnectionSettings) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .username(&settings.user)
        .charset("utf8mb4");
    if let Some(password) = &settings.password {
        options = options.password(password);
    }
    if let Some(database) = &settings.database {
        options = options.database(database);
    }
    if let Some(socket) = &settings.socket {
        options = options.socket(socket);
    }
    options
}

fn classify(err: sqlx::Error, sql: &str) -> ImportError {
    match err {
        sqlx::Error::Database(db) => ImportError::sql_execution(db.to_string(), sql),
        other => ImportError::Connection(other.to_string()),
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    type Connection = MySqlSession;

    async fn connect(&self, settings: &ConnectionSettings) -> Result<MySqlSession, ImportError> {
        let conn = MySqlConnection::connect_with(&connect_options(settings))
            .await
            .map_err(|e| {
                ImportError::Connection(format!(
                    "failed to connect to {}@{}:{}: {}",
                    settings.user, settings.host, settings.port, e
                ))
            })?;
        Ok(MySqlSession { conn })
    }
}

#[async_trait]
impl DbConnection for MySqlSession {
    async fn query(&mut self, sql: &str) -> Result<QueryOutcome, ImportError> {
        let result = (&mut self.conn)
            .execute(sqlx::raw_sql(sql))
            .await
            .map_err(|e| classify(e, sql))?;
        Ok(QueryOutcome {
            rows_affected: result.rows_affected(),
        })
    }

    async fn select_database(&mut self, name: &str) -> Result<(), ImportError> {
        let sql = format!("USE {}", quote_identifier(name));
        (&mut self.conn)
            .execute(sqlx::raw_sql(&sql))
            .await
            .map_err(|e| ImportError::Connection(format!("cannot use database {name}: {e}")))?;
        Ok(())
    }

    async fn close(self, force: bool) -> Result<(), ImportError> {
        let closed = if force {
            self.conn.close_hard().await
        } else {
            self.conn.close().await
        };
        closed.map_err(|e| ImportError::Connection(e.to_string()))
    }
}
