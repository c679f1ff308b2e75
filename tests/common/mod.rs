//! Shared helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use mysql_import::connection::{ConnectionSettings, Connector, DbConnection, QueryOutcome};
use mysql_import::ImportError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// What the mock connection was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect { database: Option<String> },
    Query(String),
    Use(String),
    Close { force: bool },
}

/// A connector that records every call instead of talking to a server.
#[derive(Clone, Default)]
pub struct MockConnector {
    pub log: Arc<Mutex<Vec<Event>>>,
    /// Refuse to connect
    pub fail_connect: bool,
    /// Reject any statement containing this text
    pub fail_on: Option<String>,
    /// Report an error when closing
    pub fail_close: bool,
    /// Databases `use` accepts; any name is accepted when empty
    pub databases: Vec<String>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Query(sql) => Some(sql),
                _ => None,
            })
            .collect()
    }

    pub fn connects(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Connect { .. }))
            .count()
    }
}

pub struct MockConnection {
    log: Arc<Mutex<Vec<Event>>>,
    fail_on: Option<String>,
    fail_close: bool,
    databases: Vec<String>,
}

#[async_trait]
impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn connect(&self, settings: &ConnectionSettings) -> Result<MockConnection, ImportError> {
        if self.fail_connect {
            return Err(ImportError::Connection(format!(
                "connect ECONNREFUSED {}:{}",
                settings.host, settings.port
            )));
        }
        self.log.lock().unwrap().push(Event::Connect {
            database: settings.database.clone(),
        });
        Ok(MockConnection {
            log: Arc::clone(&self.log),
            fail_on: self.fail_on.clone(),
            fail_close: self.fail_close,
            databases: self.databases.clone(),
        })
    }
}

#[async_trait]
impl DbConnection for MockConnection {
    async fn query(&mut self, sql: &str) -> Result<QueryOutcome, ImportError> {
        if let Some(needle) = &self.fail_on {
            if sql.contains(needle.as_str()) {
                return Err(ImportError::sql_execution(
                    "You have an error in your SQL syntax",
                    sql,
                ));
            }
        }
        self.log.lock().unwrap().push(Event::Query(sql.to_string()));
        Ok(QueryOutcome { rows_affected: 1 })
    }

    async fn select_database(&mut self, name: &str) -> Result<(), ImportError> {
        if !self.databases.is_empty() && !self.databases.iter().any(|d| d == name) {
            return Err(ImportError::Connection(format!("Unknown database '{name}'")));
        }
        self.log.lock().unwrap().push(Event::Use(name.to_string()));
        Ok(())
    }

    async fn close(self, force: bool) -> Result<(), ImportError> {
        if self.fail_close {
            return Err(ImportError::Connection("connection already closed".to_string()));
        }
        self.log.lock().unwrap().push(Event::Close { force });
        Ok(())
    }
}

/// Write `content` to `dir/rel`, creating parent directories.
pub fn write_dump(dir: &Path, rel: &str, content: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// `CREATE TABLE importtest` followed by 978 inserts, 6 of which carry a
/// `;` inside the description.
pub fn importtest_dump() -> String {
    let mut sql = String::from(
        "-- Dump of importtest\n\
         /* generated for tests */\n\
         CREATE TABLE importtest (\n  id INTEGER PRIMARY KEY,\n  name VARCHAR(100),\n  description TEXT\n);\n\n",
    );
    for id in 1..=978 {
        let description = if id % 163 == 0 {
            format!("row {id}; has a semicolon")
        } else if id % 97 == 0 {
            format!("it''s row {id}")
        } else {
            format!("row {id}")
        };
        sql.push_str(&format!(
            "INSERT INTO importtest (id, name, description) VALUES ({id}, 'name {id}', '{description}');\n"
        ));
    }
    sql
}
