use crate::encoding::{Decoder, Encoding};
use crate::error::ImportError;
use crate::parser::{Statement, StatementParser};
use crate::progress::ProgressReader;
use crate::resolver::DumpFile;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

pub const SMALL_BUFFER_SIZE: usize = 64 * 1024;
pub const MEDIUM_BUFFER_SIZE: usize = 256 * 1024;

/// Compression format detected from file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
}

impl Compression {
    /// Detect compression format from file extension
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("gz" | "gzip") => Compression::Gzip,
            Some("bz2" | "bzip2") => Compression::Bzip2,
            Some("xz" | "lzma") => Compression::Xz,
            Some("zst" | "zstd") => Compression::Zstd,
            _ => Compression::None,
        }
    }

    /// Wrap a reader with the appropriate decompressor
    pub fn wrap_reader<'a>(
        &self,
        reader: Box<dyn Read + Send + 'a>,
    ) -> io::Result<Box<dyn Read + Send + 'a>> {
        Ok(match self {
            Compression::None => reader,
            Compression::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
            Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
            Compression::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
            Compression::Zstd => Box::new(zstd::stream::read::Decoder::new(reader)?),
        })
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Bzip2 => write!(f, "bzip2"),
            Compression::Xz => write!(f, "xz"),
            Compression::Zstd => write!(f, "zstd"),
        }
    }
}

pub fn determine_buffer_size(file_size: u64) -> usize {
    if file_size > 1024 * 1024 * 1024 {
        MEDIUM_BUFFER_SIZE
    } else {
        SMALL_BUFFER_SIZE
    }
}

/// Splitter over an opened dump file.
pub type FileSplitter = StatementSplitter<Box<dyn Read + Send>>;

/// Streams statements out of a reader in bounded chunks.
///
/// The iterator is finite and single-use: once it returns `None` (or an
/// error) it stays exhausted. Scanning the same input again needs a new
/// splitter.
pub struct StatementSplitter<R: Read> {
    reader: BufReader<R>,
    decoder: Decoder,
    parser: StatementParser,
    path: PathBuf,
    text: String,
    ready: VecDeque<Statement>,
    error: Option<ImportError>,
    done: bool,
}

impl FileSplitter {
    /// Open a dump file, decompressing by extension.
    pub fn open(dump: &DumpFile) -> Result<Self, ImportError> {
        Self::open_reader(dump, None)
    }

    /// Like [`open`](Self::open), calling `on_read` with the raw bytes read
    /// from disk so far after every chunk.
    pub fn open_with_progress<F>(dump: &DumpFile, on_read: F) -> Result<Self, ImportError>
    where
        F: Fn(u64) + Send + 'static,
    {
        Self::open_reader(dump, Some(Box::new(on_read)))
    }

    fn open_reader(
        dump: &DumpFile,
        on_read: Option<Box<dyn Fn(u64) + Send>>,
    ) -> Result<Self, ImportError> {
        let path = &dump.path;
        let file = File::open(path).map_err(|e| ImportError::file_system(path, e))?;
        let file_size = file
            .metadata()
            .map_err(|e| ImportError::file_system(path, e))?
            .len();

        let raw: Box<dyn Read + Send> = match on_read {
            Some(cb) => Box::new(ProgressReader::new(file, move |bytes| cb(bytes))),
            None => Box::new(file),
        };
        let reader = dump
            .compression()
            .wrap_reader(raw)
            .map_err(|e| ImportError::file_system(path, e))?;

        Ok(
            StatementSplitter::with_chunk_size(reader, dump.encoding, determine_buffer_size(file_size))
                .with_path(path),
        )
    }
}

impl<R: Read> StatementSplitter<R> {
    pub fn new(reader: R, encoding: Encoding) -> Self {
        Self::with_chunk_size(reader, encoding, SMALL_BUFFER_SIZE)
    }

    pub fn with_chunk_size(reader: R, encoding: Encoding, chunk_size: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(chunk_size.max(1), reader),
            decoder: encoding.decoder(),
            parser: StatementParser::new(),
            path: PathBuf::from("-"),
            text: String::new(),
            ready: VecDeque::new(),
            error: None,
            done: false,
        }
    }

    /// Name used for the input in read errors.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Delimiter currently in force, as changed by `DELIMITER` directives.
    pub fn delimiter(&self) -> &str {
        self.parser.delimiter()
    }

    /// Read and scan one chunk. Returns `false` once the input is exhausted.
    fn fill(&mut self) -> Result<bool, ImportError> {
        self.text.clear();

        let buf = match self.reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(true),
            Err(e) => return Err(ImportError::file_system(&self.path, e)),
        };

        if buf.is_empty() {
            self.decoder.finish(&mut self.text);
            self.parser.push_str(&self.text, &mut self.ready)?;
            if let Some(last) = self.parser.finish()? {
                self.ready.push_back(last);
            }
            return Ok(false);
        }

        self.decoder.decode(buf, &mut self.text);
        let len = buf.len();
        self.reader.consume(len);

        self.parser.push_str(&self.text, &mut self.ready)?;
        Ok(true)
    }
}

impl<R: Read> Iterator for StatementSplitter<R> {
    type Item = Result<Statement, ImportError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(stmt) = self.ready.pop_front() {
                return Some(Ok(stmt));
            }
            // Statements completed before a failure are still handed out first
            if let Some(err) = self.error.take() {
                return Some(Err(err));
            }
            if self.done {
                return None;
            }
            match self.fill() {
                Ok(more) => self.done = !more,
                Err(e) => {
                    self.done = true;
                    self.error = Some(e);
                }
            }
        }
    }
}
