//! Byte-level progress tracking for dump reads.
//!
//! `ProgressReader` sits directly on top of the file handle, below any
//! decompressor, so the counts it reports line up with the file size on disk.

use std::io::Read;

/// A reader wrapper that tracks bytes read and calls a progress callback.
pub struct ProgressReader<R: Read> {
    reader: R,
    callback: Box<dyn Fn(u64) + Send>,
    bytes_read: u64,
}

impl<R: Read> ProgressReader<R> {
    /// Create a new ProgressReader wrapping the given reader.
    ///
    /// The callback will be called with the total bytes read so far
    /// after each successful read operation.
    pub fn new<F>(reader: R, callback: F) -> Self
    where
        F: Fn(u64) + Send + 'static,
    {
        Self {
            reader,
            callback: Box::new(callback),
            bytes_read: 0,
        }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.reader.read(buf)?;
        self.bytes_read += n as u64;
        (self.callback)(self.bytes_read);
        Ok(n)
    }
}
