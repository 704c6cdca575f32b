use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ReplicationError, ReplicationResult};
use crate::event::ReplicationLogEntry;

/// Flush/sync strategy for the WAL.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every append.
    EveryWrite,
    /// Flush to the OS and rely on its page cache.
    #[default]
    OsDefault,
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

struct WalWriter {
    writer: BufWriter<File>,
    offset: u64,
}

/// Append-only file of replication log entries.
///
/// On-disk format, repeated per entry:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized ReplicationLogEntry)]
/// ```
///
/// Recovery reads front-to-back and stops at the first frame that is torn,
/// fails its CRC check, or does not decode. Everything from that frame on
/// is cut off, so the recovered entries are always a prefix of what was
/// appended and later appends start on a frame boundary.
pub struct WriteAheadLog {
    path: PathBuf,
    writer: Mutex<WalWriter>,
    sync_mode: SyncMode,
}

impl WriteAheadLog {
    /// Open (or create) the WAL file at `path`.
    pub fn open(path: &Path, sync_mode: SyncMode) -> ReplicationResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let offset = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(WalWriter {
                writer: BufWriter::new(file),
                offset,
            }),
            sync_mode,
        })
    }

    /// Append one entry. Returns the byte offset it was written at.
    pub fn append(&self, entry: &ReplicationLogEntry) -> ReplicationResult<u64> {
        let payload = bincode::serialize(entry)
            .map_err(|e| ReplicationError::Serialization(e.to_string()))?;
        let length = payload.len() as u32;
        let crc = crc32fast::hash(&payload);

        let mut w = self.writer.lock().expect("WAL mutex poisoned");
        let entry_offset = w.offset;

        w.writer.write_all(&length.to_le_bytes())?;
        w.writer.write_all(&crc.to_le_bytes())?;
        w.writer.write_all(&payload)?;
        w.writer.flush()?;
        if self.sync_mode == SyncMode::EveryWrite {
            w.writer.get_ref().sync_all()?;
        }

        w.offset += (HEADER_SIZE + payload.len()) as u64;

        debug!(offset = entry_offset, len = payload.len(), sequence = entry.sequence, "WAL append");
        Ok(entry_offset)
    }

    /// Read every valid entry in file order.
    pub fn recover(&self) -> ReplicationResult<Vec<ReplicationLogEntry>> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let file_len = reader.get_ref().metadata()?.len();
        let mut entries = Vec::new();
        let mut offset: u64 = 0;

        while offset + HEADER_SIZE as u64 <= file_len {
            let mut header = [0u8; HEADER_SIZE];
            match reader.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            if length == 0 || offset + HEADER_SIZE as u64 + length as u64 > file_len {
                warn!(offset, length, file_len, "torn WAL entry; stopping recovery");
                break;
            }

            let mut payload = vec![0u8; length as usize];
            reader.read_exact(&mut payload)?;

            let actual_crc = crc32fast::hash(&payload);
            if actual_crc != expected_crc {
                warn!(
                    offset,
                    expected = expected_crc,
                    actual = actual_crc,
                    "CRC mismatch; stopping recovery"
                );
                break;
            }

            match bincode::deserialize::<ReplicationLogEntry>(&payload) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(offset, error = %e, "undecodable WAL entry; stopping recovery");
                    break;
                }
            }
            offset += HEADER_SIZE as u64 + length as u64;
        }

        if offset < file_len {
            self.truncate_tail(offset)?;
        }

        debug!(recovered = entries.len(), "WAL recovery complete");
        Ok(entries)
    }

    /// Current end-of-file offset.
    pub fn offset(&self) -> u64 {
        self.writer.lock().expect("WAL mutex poisoned").offset
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn truncate_tail(&self, valid_len: u64) -> ReplicationResult<()> {
        let mut w = self.writer.lock().expect("WAL mutex poisoned");
        w.writer.flush()?;
        w.writer.get_ref().set_len(valid_len)?;
        w.offset = valid_len;
        warn!(valid_len, path = %self.path.display(), "truncated WAL after last valid entry");
        Ok(())
    }
}

impl std::fmt::Debug for WriteAheadLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteAheadLog")
            .field("path", &self.path)
            .field("sync_mode", &self.sync_mode)
            .finish()
    }
}
