use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use draglog_types::Operation;

use crate::error::{Result, StoreError};
use crate::line::LogLine;
use crate::scan::{trim_terminator, Scan, ScannedLine};

/// Flush strategy for appends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// `fsync` after every append.
    EveryWrite,
    /// Flush to the OS and rely on its page cache.
    #[default]
    OsDefault,
}

/// Append-only, newline-delimited JSON log.
///
/// The file is opened for the duration of each call and closed on every exit
/// path. Within one process, line order equals call order. Concurrent
/// writers from several processes are not supported.
#[derive(Clone, Debug)]
pub struct AppendLog {
    path: PathBuf,
    sync_mode: SyncMode,
}

impl AppendLog {
    /// Open the log at `path`, creating its parent directory and an empty
    /// file if they do not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, SyncMode::default())
    }

    pub fn open_with(path: impl AsRef<Path>, sync_mode: SyncMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(&path)?;

        info!(path = %path.display(), "append log opened");
        Ok(Self { path, sync_mode })
    }

    /// Append `operation` stamped with the current time. Returns the line as
    /// it would be produced by a later scan.
    ///
    /// Fails with [`StoreError::Io`] if the file cannot be opened for
    /// append; nothing is retried.
    pub fn append(&self, operation: Operation) -> Result<ScannedLine> {
        self.append_line(LogLine::now(operation))
    }

    /// Append an already stamped line.
    pub fn append_line(&self, line: LogLine) -> Result<ScannedLine> {
        let encoded = line.encode()?;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        let len = file.metadata()?.len();

        // A final line may lack its terminator; close it before appending.
        let mut bytes = Vec::with_capacity(encoded.len() + 2);
        let mut offset = len;
        if len > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::Start(len - 1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                bytes.push(b'\n');
                offset += 1;
            }
        }
        bytes.extend_from_slice(encoded.as_bytes());
        bytes.push(b'\n');
        file.write_all(&bytes)?;
        file.flush()?;
        if self.sync_mode == SyncMode::EveryWrite {
            file.sync_data()?;
        }

        debug!(offset, operation = line.operation.tag(), len = encoded.len(), "log append");
        Ok(ScannedLine {
            offset,
            transaction_id: blake3::hash(encoded.as_bytes()).to_hex().to_string(),
            line,
        })
    }

    /// Iterate every line from the start of the file, oldest first.
    ///
    /// Each call re-reads the file. A missing file scans as empty.
    pub fn scan(&self) -> Result<Scan> {
        match File::open(&self.path) {
            Ok(file) => Ok(Scan::new(Some(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Scan::new(None)),
            Err(e) => Err(e.into()),
        }
    }

    /// Read every line into memory, failing on the first corrupt one.
    pub fn read_all(&self) -> Result<Vec<ScannedLine>> {
        let lines = self.scan()?.collect::<Result<Vec<_>>>()?;
        debug!(lines = lines.len(), "log scan complete");
        Ok(lines)
    }

    /// Read the single line starting at byte `offset`.
    pub fn read_at(&self, offset: u64) -> Result<ScannedLine> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        reader.seek(SeekFrom::Start(offset))?;

        let mut buf = Vec::new();
        reader.read_until(b'\n', &mut buf)?;
        let raw = trim_terminator(&buf);
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(StoreError::CorruptLog {
                offset,
                reason: "no log line at offset".into(),
            });
        }
        ScannedLine::parse(offset, raw)
    }

    /// Delete the backing file. Deleting an absent file is not an error.
    pub fn truncate(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        debug!(path = %self.path.display(), "append log truncated");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
