//! Text encodings accepted for dump files.
//!
//! The registry is a fixed allow-list. Each encoding owns an incremental
//! [`Decoder`] so the statement splitter can feed it arbitrary byte chunks:
//! a multi-byte sequence cut in half by a read boundary is held back until
//! the rest of it arrives.

use crate::error::ImportError;
use std::fmt;
use std::str::FromStr;

const REPLACEMENT: char = '\u{FFFD}';
const BOM: char = '\u{FEFF}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Utf16Le,
    Latin1,
    Ascii,
}

impl Encoding {
    /// Every accepted spelling, for help text and error messages.
    pub const NAMES: &'static [&'static str] = &[
        "utf8", "utf-8", "utf16le", "utf-16le", "ucs2", "ucs-2", "latin1", "binary", "ascii",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf8",
            Encoding::Utf16Le => "utf16le",
            Encoding::Latin1 => "latin1",
            Encoding::Ascii => "ascii",
        }
    }

    pub fn decoder(&self) -> Decoder {
        Decoder {
            encoding: *self,
            pending: Vec::new(),
            high_surrogate: None,
            at_start: true,
        }
    }
}

/// Check a requested encoding name against the registry.
pub fn validate(name: &str) -> Result<Encoding, ImportError> {
    name.parse()
}

impl FromStr for Encoding {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Ok(Encoding::Utf16Le),
            "latin1" | "binary" => Ok(Encoding::Latin1),
            "ascii" => Ok(Encoding::Ascii),
            _ => Err(ImportError::UnsupportedEncoding(s.to_string())),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Streaming byte-to-text decoder for one input.
pub struct Decoder {
    encoding: Encoding,
    pending: Vec<u8>,
    high_surrogate: Option<u16>,
    at_start: bool,
}

impl Decoder {
    /// Decode `bytes`, appending complete characters to `out`.
    pub fn decode(&mut self, bytes: &[u8], out: &mut String) {
        let start = out.len();
        match self.encoding {
            Encoding::Utf8 => self.decode_utf8(bytes, out),
            Encoding::Utf16Le => self.decode_utf16le(bytes, out),
            Encoding::Latin1 => out.extend(bytes.iter().map(|&b| b as char)),
            Encoding::Ascii => out.extend(
                bytes
                    .iter()
                    .map(|&b| if b.is_ascii() { b as char } else { REPLACEMENT }),
            ),
        }
        self.strip_bom(out, start);
    }

    /// Flush whatever is still held back at end of input.
    pub fn finish(&mut self, out: &mut String) {
        if !self.pending.is_empty() || self.high_surrogate.is_some() {
            self.pending.clear();
            self.high_surrogate = None;
            out.push(REPLACEMENT);
        }
    }

    fn strip_bom(&mut self, out: &mut String, start: usize) {
        if !self.at_start || out.len() == start {
            return;
        }
        self.at_start = false;
        if matches!(self.encoding, Encoding::Utf8 | Encoding::Utf16Le)
            && out[start..].starts_with(BOM)
        {
            out.replace_range(start..start + BOM.len_utf8(), "");
        }
    }

    fn decode_utf8(&mut self, bytes: &[u8], out: &mut String) {
        if self.pending.is_empty() {
            self.push_utf8(bytes, out);
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(bytes);
            self.push_utf8(&joined, out);
        }
    }

    fn push_utf8(&mut self, mut data: &[u8], out: &mut String) {
        loop {
            match std::str::from_utf8(data) {
                Ok(s) => {
                    out.push_str(s);
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Ok(s) = std::str::from_utf8(&data[..valid]) {
                        out.push_str(s);
                    }
                    match e.error_len() {
                        Some(len) => {
                            out.push(REPLACEMENT);
                            data = &data[valid + len..];
                        }
                        None => {
                            // Incomplete sequence at the end of the chunk
                            self.pending.extend_from_slice(&data[valid..]);
                            return;
                        }
                    }
                }
            }
        }
    }

    fn decode_utf16le(&mut self, bytes: &[u8], out: &mut String) {
        let mut data = std::mem::take(&mut self.pending);
        data.extend_from_slice(bytes);

        let mut units = Vec::with_capacity(data.len() / 2 + 1);
        if let Some(high) = self.high_surrogate.take() {
            units.push(high);
        }
        let pairs = data.chunks_exact(2);
        self.pending = pairs.remainder().to_vec();
        units.extend(pairs.map(|p| u16::from_le_bytes([p[0], p[1]])));

        if let Some(&last) = units.last() {
            if (0xD800..0xDC00).contains(&last) {
                self.high_surrogate = units.pop();
            }
        }

        out.extend(char::decode_utf16(units).map(|r| r.unwrap_or(REPLACEMENT)));
    }
}
