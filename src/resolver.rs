//! Expansion of user inputs into the ordered list of dump files to import.
//!
//! Inputs may be files, directories (walked recursively), or glob patterns.
//! Order is significant: later dumps routinely depend on tables created by
//! earlier ones, so every expansion is sorted and the same inputs always
//! produce the same sequence.

use crate::encoding::Encoding;
use crate::error::ImportError;
use crate::splitter::Compression;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File extension (before any compression suffix) that marks a dump file.
pub const DUMP_EXTENSION: &str = ".sql";

/// A dump file scheduled for import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpFile {
    pub path: PathBuf,
    pub encoding: Encoding,
}

impl DumpFile {
    pub fn new(path: impl Into<PathBuf>, encoding: Encoding) -> Self {
        Self {
            path: path.into(),
            encoding,
        }
    }

    pub fn compression(&self) -> Compression {
        Compression::from_path(&self.path)
    }

    pub fn is_recognized(&self) -> bool {
        is_dump_file(&self.path)
    }
}

/// Check if a path string contains glob pattern characters.
pub fn is_glob_pattern(path: &str) -> bool {
    path.contains('*') || path.contains('?') || path.contains('[')
}

/// `true` for `*.sql` and compressed `*.sql.{gz,bz2,xz,zst}` names.
pub fn is_dump_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let name = name.to_lowercase();
    let stem = match Compression::from_path(path) {
        Compression::None => name.as_str(),
        _ => name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(""),
    };
    stem.ends_with(DUMP_EXTENSION)
}

/// Resolve every input, in order, into dump files.
///
/// # Errors
///
/// Fails with [`ImportError::FileSystem`] if any input does not exist, a glob
/// matches nothing, or a directory cannot be read. Nothing is returned on
/// failure, even for inputs that resolved fine.
pub fn resolve<P: AsRef<Path>>(
    inputs: &[P],
    encoding: Encoding,
) -> Result<Vec<DumpFile>, ImportError> {
    let mut files = Vec::new();
    for input in inputs {
        let paths = expand_input(input.as_ref())?;
        files.extend(paths.into_iter().map(|p| DumpFile::new(p, encoding)));
    }
    Ok(files)
}

fn expand_input(input: &Path) -> Result<Vec<PathBuf>, ImportError> {
    let pattern = input.to_string_lossy();
    if is_glob_pattern(&pattern) && !input.exists() {
        return expand_glob(input);
    }

    let metadata = fs::metadata(input).map_err(|e| ImportError::file_system(input, e))?;
    if metadata.is_dir() {
        expand_directory(input)
    } else {
        Ok(vec![input.to_path_buf()])
    }
}

fn expand_directory(dir: &Path) -> Result<Vec<PathBuf>, ImportError> {
    let root = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = Path::new(&root).join("**").join("*");

    let mut files = Vec::new();
    for path in glob_paths(dir, &pattern.to_string_lossy())? {
        if path.is_file() && is_dump_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn expand_glob(pattern: &Path) -> Result<Vec<PathBuf>, ImportError> {
    let pattern_str = pattern.to_string_lossy();
    let mut files: Vec<PathBuf> = glob_paths(pattern, &pattern_str)?
        .into_iter()
        .filter(|p| p.is_file())
        .collect();

    if files.is_empty() {
        return Err(ImportError::file_system(
            pattern,
            io::Error::new(io::ErrorKind::NotFound, "no files match pattern"),
        ));
    }

    files.sort();
    Ok(files)
}

fn glob_paths(origin: &Path, pattern: &str) -> Result<Vec<PathBuf>, ImportError> {
    let entries = glob::glob(pattern).map_err(|e| {
        ImportError::file_system(
            origin,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid glob pattern: {}", e),
            ),
        )
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => paths.push(path),
            Err(e) => {
                let path = e.path().to_path_buf();
                return Err(ImportError::file_system(path, e.into_error()));
            }
        }
    }
    Ok(paths)
}
