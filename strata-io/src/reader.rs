//! `InputReader` — a polymorphic handle over any byte source the carving
//! engine can dig through: a plain file, a device, or an in-memory buffer.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::info;

use crate::error::{IoError, Result};

/// Seek origin, matching the standard library's convention: for [`Whence::End`]
/// the offset is *added* to the size (so a negative offset seeks backward
/// from end-of-file).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

/// Random-access reading, size query, position, seek, open/close over any
/// source.
///
/// Reads and seeks on a single `InputReader` are expected to be serialized by
/// the caller. An implementation that must be shared across more than one
/// task (e.g. a network- or toolkit-backed stream) should wrap itself in
/// [`SharedReader`] to advertise thread safety instead of silently racing.
pub trait InputReader: Send {
    /// Open (or reopen) the source. Idempotent if already open; reopening a
    /// previously used stream rewinds to position 0.
    fn open(&mut self) -> Result<()>;

    /// Close the source. Idempotent.
    fn close(&mut self);

    /// Total logical byte count, or -1 if unmeasurable.
    fn size(&self) -> i64;

    /// Current position.
    fn position(&self) -> u64;

    /// Seek to a new position.
    fn seek(&mut self, offset: i64, whence: Whence) -> Result<()>;

    /// Read up to `buf.len()` bytes, returning the number actually read (0 at
    /// EOF, possibly less than `buf.len()` on a short read).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// A stable identifier used for audit records (e.g. a file path).
    fn id(&self) -> &str;

    /// The last error recorded by this reader, if any.
    fn error(&self) -> Option<&IoError>;
}

/// File-backed `InputReader`.
pub struct FileReader {
    path: PathBuf,
    id: String,
    file: Option<File>,
    position: u64,
    size: i64,
    last_error: Option<IoError>,
}

impl FileReader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let id = path.to_string_lossy().into_owned();
        FileReader {
            path,
            id,
            file: None,
            position: 0,
            size: -1,
            last_error: None,
        }
    }
}

impl InputReader for FileReader {
    fn open(&mut self) -> Result<()> {
        if self.file.is_none() {
            let file = OpenOptions::new().read(true).open(&self.path)?;
            self.size = file.metadata().map(|m| m.len() as i64).unwrap_or(-1);
            self.file = Some(file);
            info!("opened input {} ({} bytes)", self.id, self.size);
        }
        self.position = 0;
        if let Some(file) = self.file.as_mut() {
            file.seek(SeekFrom::Start(0))?;
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.file.take().is_some() {
            info!("closed input {}", self.id);
        }
        self.position = 0;
    }

    fn size(&self) -> i64 {
        self.size
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<()> {
        let file = self.file.as_mut().ok_or(IoError::NotOpen)?;
        let seek_from = match whence {
            Whence::Set => SeekFrom::Start(offset.max(0) as u64),
            Whence::Cur => SeekFrom::Current(offset),
            Whence::End => SeekFrom::End(offset),
        };
        match file.seek(seek_from) {
            Ok(pos) => {
                self.position = pos;
                Ok(())
            }
            Err(e) => {
                let kind = e.kind();
                self.last_error = Some(IoError::Io(io::Error::new(kind, e.to_string())));
                Err(IoError::Io(e))
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let file = self.file.as_mut().ok_or(IoError::NotOpen)?;
        let mut total = 0;
        while total < buf.len() {
            match file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.last_error = Some(IoError::Io(io::Error::new(e.kind(), e.to_string())));
                    return Err(IoError::Io(e));
                }
            }
        }
        self.position += total as u64;
        Ok(total)
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn error(&self) -> Option<&IoError> {
        self.last_error.as_ref()
    }
}

/// In-memory `InputReader`, backed by an owned byte buffer. Useful for tests
/// and for sources that have already been staged into memory (e.g. a
/// forensic toolkit stream that was read in full upstream).
pub struct MemoryReader {
    id: String,
    data: Vec<u8>,
    position: u64,
    is_open: bool,
}

impl MemoryReader {
    pub fn new(id: impl Into<String>, data: Vec<u8>) -> Self {
        MemoryReader {
            id: id.into(),
            data,
            position: 0,
            is_open: false,
        }
    }
}

impl InputReader for MemoryReader {
    fn open(&mut self) -> Result<()> {
        self.is_open = true;
        self.position = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.is_open = false;
    }

    fn size(&self) -> i64 {
        self.data.len() as i64
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<()> {
        if !self.is_open {
            return Err(IoError::NotOpen);
        }
        let base: i64 = match whence {
            Whence::Set => 0,
            Whence::Cur => self.position as i64,
            Whence::End => self.data.len() as i64,
        };
        let target = base + offset;
        if target < 0 {
            return Err(IoError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of buffer",
            )));
        }
        self.position = target as u64;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.is_open {
            return Err(IoError::NotOpen);
        }
        let pos = self.position as usize;
        if pos >= self.data.len() {
            return Ok(0);
        }
        let n = buf.len().min(self.data.len() - pos);
        buf[..n].copy_from_slice(&self.data[pos..pos + n]);
        self.position += n as u64;
        Ok(n)
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn error(&self) -> Option<&IoError> {
        None
    }
}

/// Wraps any `InputReader` behind a mutex so it can be shared by more than
/// one task at a time, per the contract that concurrent callers require
/// the reader to advertise thread safety.
#[derive(Clone)]
pub struct SharedReader<R> {
    inner: Arc<Mutex<R>>,
}

impl<R: InputReader> SharedReader<R> {
    pub fn new(reader: R) -> Self {
        SharedReader {
            inner: Arc::new(Mutex::new(reader)),
        }
    }

    pub fn with_lock<T>(&self, f: impl FnOnce(&mut R) -> T) -> T {
        let mut guard = self.inner.lock().expect("input reader mutex poisoned");
        f(&mut guard)
    }
}
