//! Append-only journal behind [`super::FileStore`].
//!
//! Frame layout: `[payload_len: u32 LE][crc32(payload): u32 LE][payload]`,
//! payload is a bincode-encoded [`Record`]. Replay stops at the first frame
//! that is short or fails its checksum; everything after it is cut off.

use super::StoreError;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const HEADER_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPost {
    pub id: i64,
    pub owner: String,
    pub body: String,
    pub rating: Option<u8>,
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    Insert(StoredPost),
    Delete { id: i64 },
}

/// The file operations the journal needs. A failed append is undone with
/// [`truncate`](JournalFile::truncate) back to the last durable length.
pub trait JournalFile: Write + Send {
    fn sync(&mut self) -> io::Result<()>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl JournalFile for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

pub struct RecordLog<F: JournalFile = File> {
    file: F,
    path: PathBuf,
    /// Bytes known to be durable. Everything past this offset is garbage.
    durable_len: u64,
    /// Set when a failed append could not be rolled back.
    wedged: bool,
}

impl RecordLog<File> {
    /// Opens (or creates) the log and returns every intact record in it.
    pub fn open(path: &Path) -> Result<(Self, Vec<Record>), StoreError> {
        let (records, durable_len) = if path.exists() {
            let bytes = fs::read(path)?;
            let (records, valid_len) = decode_frames(&bytes);
            if valid_len < bytes.len() {
                warn!(
                    path = %path.display(),
                    valid_len,
                    dropped = bytes.len() - valid_len,
                    "truncating torn tail of record log"
                );
                OpenOptions::new()
                    .write(true)
                    .open(path)?
                    .set_len(valid_len as u64)?;
            }
            (records, valid_len as u64)
        } else {
            (Vec::new(), 0)
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        debug!(path = %path.display(), records = records.len(), "record log opened");
        Ok((Self::over(file, path, durable_len), records))
    }

    /// Replaces the log with `records`, written to a sibling file first and
    /// then renamed over the original.
    pub fn rewrite(&mut self, records: &[Record]) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("log.compact");
        let mut written = 0u64;
        {
            let mut out = BufWriter::new(File::create(&tmp)?);
            for record in records {
                let frame = encode_frame(record)?;
                out.write_all(&frame)?;
                written += frame.len() as u64;
            }
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        self.file = OpenOptions::new().append(true).open(&self.path)?;
        self.durable_len = written;
        self.wedged = false;
        Ok(())
    }
}

impl<F: JournalFile> RecordLog<F> {
    /// Wraps an already-positioned journal file whose first `durable_len`
    /// bytes are intact frames.
    pub fn over(file: F, path: &Path, durable_len: u64) -> Self {
        Self {
            file,
            path: path.to_path_buf(),
            durable_len,
            wedged: false,
        }
    }

    /// Appends and syncs one record. Durable once this returns `Ok`; on
    /// `Err` nothing of the frame is left behind.
    pub fn append(&mut self, record: &Record) -> Result<(), StoreError> {
        if self.wedged {
            return Err(StoreError::Unavailable(
                "record log needs reopening after a failed write".to_string(),
            ));
        }

        let frame = encode_frame(record)?;
        if let Err(err) = self.write_frame(&frame) {
            warn!(path = %self.path.display(), error = %err, "append failed, rolling back");
            if let Err(rollback) = self.roll_back() {
                warn!(path = %self.path.display(), error = %rollback, "rollback failed, refusing further writes");
                self.wedged = true;
            }
            return Err(err.into());
        }

        self.durable_len += frame.len() as u64;
        Ok(())
    }

    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.file.write_all(frame)?;
        self.file.flush()?;
        self.file.sync()
    }

    fn roll_back(&mut self) -> io::Result<()> {
        self.file.truncate(self.durable_len)?;
        self.file.sync()
    }
}

pub fn encode_frame(record: &Record) -> Result<Vec<u8>, StoreError> {
    let payload = bincode::serialize(record)?;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Returns the intact records and the byte length they cover.
pub fn decode_frames(bytes: &[u8]) -> (Vec<Record>, usize) {
    let mut records = Vec::new();
    let mut offset = 0;

    while bytes.len() - offset >= HEADER_LEN {
        let header = &bytes[offset..offset + HEADER_LEN];
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        let start = offset + HEADER_LEN;
        let Some(payload) = bytes.get(start..start + len) else {
            break;
        };
        if crc32fast::hash(payload) != crc {
            break;
        }
        match bincode::deserialize::<Record>(payload) {
            Ok(record) => records.push(record),
            Err(_) => break,
        }
        offset = start + len;
    }

    (records, offset)
}
