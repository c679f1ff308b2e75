//! Sequential dump import engine.
//!
//! An [`Importer`] owns one connection and runs resolved dump files through
//! it strictly in order, one statement at a time. Later statements routinely
//! depend on schema created earlier, so nothing here runs in parallel.
//!
//! # Example
//!
//! ```ignore
//! use mysql_import::{ConnectionSettings, Importer};
//!
//! let mut importer = Importer::mysql(ConnectionSettings::default());
//! importer.use_database("app").await?;
//! importer.on_dump_completed(Some(|err: Option<&_>, dump: &_| { /* ... */ }));
//! let summary = importer.import(&["schema.sql", "data/"]).await?;
//! importer.disconnect(false).await?;
//! ```

use crate::connection::{ConnectionSettings, Connector, DbConnection, MySqlConnector};
use crate::encoding::{self, Encoding};
use crate::error::{preview, ImportError};
use crate::resolver::{self, DumpFile};
use crate::splitter::FileSplitter;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Snapshot handed to the progress callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportProgress {
    /// 1-based position of the current file in the batch
    pub file_no: usize,
    pub total_files: usize,
    pub file_path: PathBuf,
    /// Raw bytes read from disk so far, before decompression
    pub bytes_processed: u64,
    /// Size of the file on disk
    pub total_bytes: u64,
    pub statements_executed: u64,
}

/// Totals for one `import` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub files: usize,
    pub statements: u64,
    pub bytes: u64,
}

pub type ProgressCallback = Box<dyn FnMut(&ImportProgress) + Send>;
pub type DumpCompletedCallback = Box<dyn FnMut(Option<&ImportError>, &DumpFile) + Send>;

pub struct Importer<C: Connector> {
    connector: C,
    settings: ConnectionSettings,
    encoding: Encoding,
    conn: Option<C::Connection>,
    imported: Vec<DumpFile>,
    on_progress: Option<ProgressCallback>,
    on_dump_completed: Option<DumpCompletedCallback>,
}

impl Importer<MySqlConnector> {
    /// Importer targeting a MySQL server.
    pub fn mysql(settings: ConnectionSettings) -> Self {
        Self::new(MySqlConnector, settings)
    }
}

impl<C: Connector> Importer<C> {
    pub fn new(connector: C, settings: ConnectionSettings) -> Self {
        Self {
            connector,
            settings,
            encoding: Encoding::default(),
            conn: None,
            imported: Vec::new(),
            on_progress: None,
            on_dump_completed: None,
        }
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Set the text encoding used for files resolved after this call.
    pub fn set_encoding(&mut self, name: &str) -> Result<(), ImportError> {
        self.encoding = encoding::validate(name)?;
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Every dump imported successfully by this instance, in import order.
    pub fn imported(&self) -> &[DumpFile] {
        &self.imported
    }

    /// Register the progress callback. `None` removes it.
    pub fn on_progress<F>(&mut self, callback: Option<F>)
    where
        F: FnMut(&ImportProgress) + Send + 'static,
    {
        self.on_progress = callback.map(|f| Box::new(f) as ProgressCallback);
    }

    /// Register the callback fired once per attempted dump, with the error
    /// if the dump failed. `None` removes it.
    pub fn on_dump_completed<F>(&mut self, callback: Option<F>)
    where
        F: FnMut(Option<&ImportError>, &DumpFile) + Send + 'static,
    {
        self.on_dump_completed = callback.map(|f| Box::new(f) as DumpCompletedCallback);
    }

    /// Switch the default database.
    ///
    /// When connected, the switch is issued immediately and the new name is
    /// only kept if it succeeds. Otherwise it is used by the next connect.
    pub async fn use_database(&mut self, name: &str) -> Result<(), ImportError> {
        if let Some(conn) = self.conn.as_mut() {
            debug!(database = name, "switching database");
            conn.select_database(name).await?;
        }
        self.settings.database = Some(name.to_string());
        Ok(())
    }

    /// Connect if not already connected.
    pub async fn connect(&mut self) -> Result<(), ImportError> {
        if self.conn.is_some() {
            return Ok(());
        }
        debug!(
            host = %self.settings.host,
            port = self.settings.port,
            user = %self.settings.user,
            "connecting"
        );
        let conn = self.connector.connect(&self.settings).await?;
        self.conn = Some(conn);
        Ok(())
    }

    /// Close the connection, if any. `force` skips the graceful shutdown.
    pub async fn disconnect(&mut self, force: bool) -> Result<(), ImportError> {
        match self.conn.take() {
            Some(conn) => {
                debug!(force, "disconnecting");
                conn.close(force).await
            }
            None => Ok(()),
        }
    }

    /// Resolve `inputs` and import every dump they name, in order.
    ///
    /// Stops at the first failing dump. Statements already executed, in that
    /// dump or earlier ones, stay applied.
    pub async fn import<P: AsRef<Path>>(
        &mut self,
        inputs: &[P],
    ) -> Result<ImportSummary, ImportError> {
        let files = resolver::resolve(inputs, self.encoding)?;
        let total_files = files.len();
        info!(files = total_files, "starting import");

        let mut summary = ImportSummary::default();
        for (i, dump) in files.into_iter().enumerate() {
            let done = self.import_dump(dump, i + 1, total_files).await?;
            summary.files += 1;
            summary.statements += done.statements;
            summary.bytes += done.bytes;
        }
        Ok(summary)
    }

    /// Import one dump file.
    ///
    /// # Errors
    ///
    /// [`ImportError::FileSystem`] if the path is missing or not a
    /// recognized dump file, otherwise whatever executing it produced.
    pub async fn import_single_file(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<ImportSummary, ImportError> {
        let dump = DumpFile::new(path.as_ref(), self.encoding);
        let done = self.import_dump(dump, 1, 1).await?;
        Ok(ImportSummary {
            files: 1,
            statements: done.statements,
            bytes: done.bytes,
        })
    }

    async fn import_dump(
        &mut self,
        dump: DumpFile,
        file_no: usize,
        total_files: usize,
    ) -> Result<DumpTotals, ImportError> {
        let started = Instant::now();
        info!(
            path = %dump.path.display(),
            compression = %dump.compression(),
            file_no,
            total_files,
            "importing dump"
        );

        let result = self.run_dump(&dump, file_no, total_files).await;
        match &result {
            Ok(done) => info!(
                path = %dump.path.display(),
                statements = done.statements,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "dump imported"
            ),
            Err(e) => warn!(path = %dump.path.display(), error = %e, "dump failed"),
        }

        if let Some(callback) = self.on_dump_completed.as_mut() {
            callback(result.as_ref().err(), &dump);
        }
        if result.is_ok() {
            self.imported.push(dump);
        }
        result
    }

    async fn run_dump(
        &mut self,
        dump: &DumpFile,
        file_no: usize,
        total_files: usize,
    ) -> Result<DumpTotals, ImportError> {
        let metadata =
            fs::metadata(&dump.path).map_err(|e| ImportError::file_system(&dump.path, e))?;
        if !metadata.is_file() || !dump.is_recognized() {
            return Err(ImportError::not_a_dump(&dump.path));
        }

        let bytes_read = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&bytes_read);
        let statements = FileSplitter::open_with_progress(dump, move |n| {
            counter.store(n, Ordering::Relaxed);
        })?;

        self.connect().await?;
        let Some(conn) = self.conn.as_mut() else {
            return Err(ImportError::Connection("not connected".to_string()));
        };

        let mut progress = ImportProgress {
            file_no,
            total_files,
            file_path: dump.path.clone(),
            bytes_processed: 0,
            total_bytes: metadata.len(),
            statements_executed: 0,
        };

        for statement in statements {
            let statement = statement?;
            debug!(
                offset = statement.start_offset,
                sql = %preview(&statement.text),
                "executing statement"
            );
            conn.query(&statement.text).await?;

            progress.statements_executed += 1;
            progress.bytes_processed = bytes_read.load(Ordering::Relaxed);
            if let Some(callback) = self.on_progress.as_mut() {
                callback(&progress);
            }
        }

        progress.bytes_processed = bytes_read.load(Ordering::Relaxed);
        if let Some(callback) = self.on_progress.as_mut() {
            callback(&progress);
        }

        Ok(DumpTotals {
            statements: progress.statements_executed,
            bytes: progress.bytes_processed,
        })
    }
}

struct DumpTotals {
    statements: u64,
    bytes: u64,
}
