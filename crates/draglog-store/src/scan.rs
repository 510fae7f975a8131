use std::fs::File;
use std::io::{BufRead, BufReader};

use crate::error::{Result, StoreError};
use crate::line::LogLine;

/// A decoded line together with where it was found.
#[derive(Clone, Debug, PartialEq)]
pub struct ScannedLine {
    /// Byte offset of the first byte of the line.
    pub offset: u64,
    pub line: LogLine,
    /// Hex BLAKE3 digest of the raw line bytes. Stable across scans and
    /// shared by every record the line touches.
    pub transaction_id: String,
}

impl ScannedLine {
    /// Decode `raw` (one line without its terminator) found at `offset`.
    pub(crate) fn parse(offset: u64, raw: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(raw).map_err(|e| StoreError::CorruptLog {
            offset,
            reason: e.to_string(),
        })?;
        let line = LogLine::decode(text).map_err(|e| StoreError::CorruptLog {
            offset,
            reason: e.to_string(),
        })?;
        Ok(Self {
            offset,
            line,
            transaction_id: blake3::hash(raw).to_hex().to_string(),
        })
    }
}

/// Lazy, front-to-back iterator over the lines of an append log.
///
/// Blank lines are skipped. The first unreadable or unparsable line is
/// yielded as an error and ends the iteration.
pub struct Scan {
    reader: Option<BufReader<File>>,
    offset: u64,
    buf: Vec<u8>,
}

impl Scan {
    pub(crate) fn new(file: Option<File>) -> Self {
        Self {
            reader: file.map(BufReader::new),
            offset: 0,
            buf: Vec::new(),
        }
    }
}

/// Strip a trailing `\n` or `\r\n`.
pub(crate) fn trim_terminator(raw: &[u8]) -> &[u8] {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    raw.strip_suffix(b"\r").unwrap_or(raw)
}

impl Iterator for Scan {
    type Item = Result<ScannedLine>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let reader = self.reader.as_mut()?;
            self.buf.clear();
            let read = match reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.reader = None;
                    return None;
                }
                Ok(n) => n,
                Err(e) => {
                    self.reader = None;
                    return Some(Err(e.into()));
                }
            };

            let start = self.offset;
            self.offset += read as u64;

            let raw = trim_terminator(&self.buf);
            if raw.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let parsed = ScannedLine::parse(start, raw);
            if parsed.is_err() {
                self.reader = None;
            }
            return Some(parsed);
        }
    }
}
