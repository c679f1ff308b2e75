//! Import MySQL dump files into a live database.
//!
//! Dumps are streamed through a [`StatementSplitter`](splitter::StatementSplitter)
//! that understands quoting, comments, and `DELIMITER` directives, and the
//! resulting statements are executed one by one by an [`Importer`].

pub mod config;
pub mod connection;
pub mod encoding;
pub mod error;
pub mod importer;
pub mod parser;
pub mod progress;
pub mod resolver;
pub mod splitter;

pub use connection::{ConnectionSettings, DuckDbConnector, MySqlConnector};
pub use encoding::Encoding;
pub use error::ImportError;
pub use importer::{ImportProgress, ImportSummary, Importer};
pub use parser::Statement;
pub use resolver::DumpFile;
