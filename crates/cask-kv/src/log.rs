use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock};

use tracing::{debug, info, warn};

use crate::batch::{BatchEntry, WriteBatch};
use crate::error::{EngineError, Result};
use crate::traits::KvEngine;

/// Header size: 4 bytes payload length + 4 bytes CRC.
const HEADER_SIZE: u64 = 8;

/// Per-entry framing inside a payload: 4 bytes key length + 4 bytes value length.
const ENTRY_HEADER_SIZE: u64 = 8;

/// Flush/sync strategy for the log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// `fsync` after every record (safest, highest latency).
    EveryWrite,
    /// Flush to the OS page cache only (fastest, least durable).
    #[default]
    OsDefault,
}

/// Configuration for a [`LogEngine`].
#[derive(Clone, Debug, Default)]
pub struct LogConfig {
    /// Sync strategy applied after each record.
    pub sync_mode: SyncMode,
}

/// Where a live value sits in the log file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ValueLocation {
    offset: u64,
    len: u32,
}

/// Append-only, crash-recoverable key-value log.
///
/// Every `put` and every batch becomes one record:
///
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [payload]
///
/// payload:
/// [4 bytes: entry count (LE u32)]
/// per entry: [4 bytes: key len][4 bytes: value len][key][value]
/// ```
///
/// On open the file is scanned front to back to rebuild an index of key to
/// value location; values themselves stay on disk and are read on demand.
/// Because a batch is a single record, a torn batch fails its length or CRC
/// check and none of its entries are recovered.
pub struct LogEngine {
    path: PathBuf,
    /// Append handle and current end-of-log offset.
    writer: Mutex<LogWriter>,
    /// Separate handle for positioned reads.
    reader: Mutex<File>,
    index: RwLock<BTreeMap<Vec<u8>, ValueLocation>>,
    config: LogConfig,
}

struct LogWriter {
    file: File,
    offset: u64,
}

/// Summary of a recovery scan.
#[derive(Debug, Default)]
struct Recovery {
    index: BTreeMap<Vec<u8>, ValueLocation>,
    records: usize,
    skipped: usize,
    /// End of the last complete record.
    valid_len: u64,
}

impl LogEngine {
    /// Open (or create) a log file at `path` and rebuild its index.
    ///
    /// A truncated trailing record (a write torn by a crash) is cut off so
    /// that later appends start at a clean record boundary. A bad record
    /// header with intact records after it is reported as
    /// [`EngineError::Corruption`] and the file is left untouched.
    pub fn open(path: &Path, config: LogConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let file_len = file.metadata()?.len();
        let recovery = Self::recover(path, file_len)?;

        if recovery.valid_len < file_len {
            warn!(
                path = %path.display(),
                dropped = file_len - recovery.valid_len,
                "truncating torn tail of log"
            );
            file.set_len(recovery.valid_len)?;
            file.sync_all()?;
        }

        let reader = File::open(path)?;

        info!(
            path = %path.display(),
            records = recovery.records,
            skipped = recovery.skipped,
            keys = recovery.index.len(),
            "log engine opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(LogWriter {
                file,
                offset: recovery.valid_len,
            }),
            reader: Mutex::new(reader),
            index: RwLock::new(recovery.index),
            config,
        })
    }

    /// Path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of live keys.
    pub fn len(&self) -> Result<usize> {
        let index = self.index.read().map_err(|_| EngineError::LockPoisoned)?;
        Ok(index.len())
    }

    /// Returns `true` if the log holds no keys.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Current size of the log in bytes.
    pub fn size_bytes(&self) -> Result<u64> {
        Ok(self.lock_writer()?.offset)
    }

    /// Scan the log and build the key index.
    fn recover(path: &Path, file_len: u64) -> Result<Recovery> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut recovery = Recovery::default();
        let mut offset: u64 = 0;

        while offset + HEADER_SIZE <= file_len {
            let mut header = [0u8; HEADER_SIZE as usize];
            match reader.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            if length < 4 || offset + HEADER_SIZE + u64::from(length) > file_len {
                // Only a tail with nothing intact behind it may be cut off on open.
                if let Some(intact) = find_intact_record(path, offset + 1, file_len)? {
                    return Err(EngineError::Corruption {
                        offset,
                        reason: format!(
                            "invalid record length {length}; \
                             intact record follows at offset {intact}"
                        ),
                    });
                }
                warn!(offset, length, file_len, "torn record at end of log");
                break;
            }

            let mut payload = vec![0u8; length as usize];
            match reader.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    warn!(offset, "truncated record; stopping recovery");
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            let next = offset + HEADER_SIZE + u64::from(length);
            let actual_crc = crc32fast::hash(&payload);
            if actual_crc != expected_crc {
                warn!(
                    offset,
                    expected = expected_crc,
                    actual = actual_crc,
                    "CRC mismatch; skipping record"
                );
                recovery.skipped += 1;
                recovery.valid_len = next;
                offset = next;
                continue;
            }

            match parse_payload(offset + HEADER_SIZE, &payload) {
                Ok(entries) => {
                    for (key, location) in entries {
                        recovery.index.insert(key, location);
                    }
                    recovery.records += 1;
                }
                Err(e) => {
                    warn!(offset, error = %e, "unparseable record; skipping");
                    recovery.skipped += 1;
                }
            }

            recovery.valid_len = next;
            offset = next;
        }

        debug!(records = recovery.records, "log recovery complete");
        Ok(recovery)
    }

    /// Append one record holding `entries` and publish them to the index.
    fn append(&self, entries: &[BatchEntry<'_>]) -> Result<()> {
        let mut payload_len = 4u64;
        for entry in entries {
            let key_len = entry.key.len() as u64;
            let value_len = entry.value_len() as u64;
            if key_len > u64::from(u32::MAX) || value_len > u64::from(u32::MAX) {
                return Err(EngineError::TooLarge {
                    len: key_len.max(value_len),
                });
            }
            payload_len += ENTRY_HEADER_SIZE + key_len + value_len;
        }
        if payload_len > u64::from(u32::MAX) {
            return Err(EngineError::TooLarge { len: payload_len });
        }

        let count = (entries.len() as u32).to_le_bytes();
        let mut crc = crc32fast::Hasher::new();
        crc.update(&count);
        for entry in entries {
            crc.update(&(entry.key.len() as u32).to_le_bytes());
            crc.update(&(entry.value_len() as u32).to_le_bytes());
            crc.update(entry.key);
            for part in &entry.parts {
                crc.update(part);
            }
        }
        let crc = crc.finalize();

        let mut w = self.lock_writer()?;
        let record_offset = w.offset;

        let written = self.write_record(&mut w.file, payload_len as u32, crc, &count, entries);
        let locations = match written {
            Ok(()) => record_locations(record_offset, entries),
            Err(e) => {
                // Drop the partial record so the next append starts on a boundary.
                if let Err(rollback) = w.file.set_len(record_offset) {
                    warn!(
                        offset = record_offset,
                        error = %rollback,
                        "failed to roll back partial record"
                    );
                }
                return Err(e);
            }
        };

        w.offset = record_offset + HEADER_SIZE + payload_len;

        // Publish while still holding the writer lock so index order follows log order.
        let mut index = self.index.write().map_err(|_| EngineError::LockPoisoned)?;
        for entry in entries {
            if let Some(location) = locations.get(entry.key) {
                index.insert(entry.key.to_vec(), *location);
            }
        }
        drop(index);

        debug!(
            offset = record_offset,
            entries = entries.len(),
            len = payload_len,
            "log append"
        );
        Ok(())
    }

    fn write_record(
        &self,
        file: &mut File,
        payload_len: u32,
        crc: u32,
        count: &[u8; 4],
        entries: &[BatchEntry<'_>],
    ) -> Result<()> {
        let mut out = BufWriter::new(file);
        let written = (|| -> io::Result<()> {
            out.write_all(&payload_len.to_le_bytes())?;
            out.write_all(&crc.to_le_bytes())?;
            out.write_all(count)?;
            for entry in entries {
                out.write_all(&(entry.key.len() as u32).to_le_bytes())?;
                out.write_all(&(entry.value_len() as u32).to_le_bytes())?;
                out.write_all(entry.key)?;
                for part in &entry.parts {
                    out.write_all(part)?;
                }
            }
            out.flush()
        })();

        match written {
            Ok(()) => {
                let file = out.into_inner().map_err(|e| e.into_error())?;
                if self.config.sync_mode == SyncMode::EveryWrite {
                    file.sync_data()?;
                }
                Ok(())
            }
            Err(e) => {
                // Discard anything still buffered instead of flushing it on drop.
                let _ = out.into_parts();
                Err(e.into())
            }
        }
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, LogWriter>> {
        self.writer.lock().map_err(|_| EngineError::LockPoisoned)
    }

    fn read_at(&self, location: ValueLocation) -> Result<Vec<u8>> {
        let mut file = self.reader.lock().map_err(|_| EngineError::LockPoisoned)?;
        file.seek(SeekFrom::Start(location.offset))?;
        let mut value = vec![0u8; location.len as usize];
        file.read_exact(&mut value).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                EngineError::Corruption {
                    offset: location.offset,
                    reason: format!("value of {} bytes runs past end of log", location.len),
                }
            } else {
                e.into()
            }
        })?;
        Ok(value)
    }
}

impl KvEngine for LogEngine {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let location = {
            let index = self.index.read().map_err(|_| EngineError::LockPoisoned)?;
            index.get(key).copied()
        };
        match location {
            Some(location) => self.read_at(location).map(Some),
            None => Ok(None),
        }
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.append(&[BatchEntry {
            key,
            parts: vec![value],
        }])
    }

    fn write_batch(&self, batch: WriteBatch<'_>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.append(batch.entries())
    }

    fn flush(&self) -> Result<()> {
        let w = self.lock_writer()?;
        w.file.sync_all()?;
        Ok(())
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        let index = self.index.read().map_err(|_| EngineError::LockPoisoned)?;
        Ok(index.contains_key(key))
    }
}

impl Drop for LogEngine {
    fn drop(&mut self) {
        if let Ok(w) = self.writer.get_mut() {
            if let Err(e) = w.file.sync_all() {
                warn!(path = %self.path.display(), error = %e, "failed to sync log on close");
            }
        }
    }
}

impl std::fmt::Debug for LogEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogEngine")
            .field("path", &self.path)
            .field("key_count", &self.len().ok())
            .finish()
    }
}

/// Value locations for a record written at `record_offset`. Later entries for
/// the same key replace earlier ones.
fn record_locations(
    record_offset: u64,
    entries: &[BatchEntry<'_>],
) -> BTreeMap<Vec<u8>, ValueLocation> {
    let mut locations = BTreeMap::new();
    let mut cursor = record_offset + HEADER_SIZE + 4;
    for entry in entries {
        let key_len = entry.key.len() as u64;
        let value_len = entry.value_len();
        let value_offset = cursor + ENTRY_HEADER_SIZE + key_len;
        locations.insert(
            entry.key.to_vec(),
            ValueLocation {
                offset: value_offset,
                len: value_len as u32,
            },
        );
        cursor = value_offset + value_len as u64;
    }
    locations
}

/// Offset of the first well-formed record (length in range, CRC matching) that
/// starts at or after `from`, if any.
fn find_intact_record(path: &Path, from: u64, file_len: u64) -> Result<Option<u64>> {
    if from >= file_len {
        return Ok(None);
    }
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(from))?;
    let mut tail = Vec::new();
    file.take(file_len - from).read_to_end(&mut tail)?;

    let header = HEADER_SIZE as usize;
    if tail.len() < header {
        return Ok(None);
    }
    for start in 0..=tail.len() - header {
        let length = le_u32(&tail[start..]) as usize;
        let end = match (start + header).checked_add(length) {
            Some(end) if length >= 4 && end <= tail.len() => end,
            _ => continue,
        };
        if crc32fast::hash(&tail[start + header..end]) == le_u32(&tail[start + 4..]) {
            return Ok(Some(from + start as u64));
        }
    }
    Ok(None)
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Decode a payload whose first byte sits at `payload_offset` in the file.
fn parse_payload(payload_offset: u64, payload: &[u8]) -> Result<Vec<(Vec<u8>, ValueLocation)>> {
    let corrupt = |pos: usize, reason: &str| EngineError::Corruption {
        offset: payload_offset + pos as u64,
        reason: reason.to_string(),
    };
    let read_u32 = |pos: usize| -> Result<u32> {
        payload
            .get(pos..pos + 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .ok_or_else(|| corrupt(pos, "truncated length field"))
    };

    let count = read_u32(0)?;
    let mut pos = 4usize;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let key_len = read_u32(pos)? as usize;
        let value_len = read_u32(pos + 4)?;
        pos += ENTRY_HEADER_SIZE as usize;

        let key = payload
            .get(pos..pos + key_len)
            .ok_or_else(|| corrupt(pos, "key runs past end of record"))?;
        pos += key_len;

        if pos + value_len as usize > payload.len() {
            return Err(corrupt(pos, "value runs past end of record"));
        }
        entries.push((
            key.to_vec(),
            ValueLocation {
                offset: payload_offset + pos as u64,
                len: value_len,
            },
        ));
        pos += value_len as usize;
    }

    if pos != payload.len() {
        return Err(corrupt(pos, "trailing bytes after last entry"));
    }
    Ok(entries)
}
