//! Versioned whole-snapshot persistence for the index and the metadata store.
//!
//! Each store is one bincode blob wrapped in an envelope carrying its schema
//! version. Backends only move bytes; file writes go through a temp file and a
//! rename so a crash never leaves a half-written snapshot in place.

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

pub const INDEX_SCHEMA_VERSION: u32 = 1;
pub const METADATA_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotKind {
    Index,
    Metadata,
}

impl SnapshotKind {
    pub fn file_name(self) -> &'static str {
        match self {
            SnapshotKind::Index => "index.bin",
            SnapshotKind::Metadata => "metadata.bin",
        }
    }

    pub fn schema_version(self) -> u32 {
        match self {
            SnapshotKind::Index => INDEX_SCHEMA_VERSION,
            SnapshotKind::Metadata => METADATA_SCHEMA_VERSION,
        }
    }
}

/// Where snapshot blobs live.
pub trait SnapshotBackend: Send + Sync {
    /// `Ok(None)` when no snapshot of this kind has been written yet.
    fn read(&self, kind: SnapshotKind) -> Result<Option<Vec<u8>>>;
    /// Replace the snapshot atomically.
    fn write(&self, kind: SnapshotKind, bytes: &[u8]) -> Result<()>;
}

/// Snapshots as files under one directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    pub root: PathBuf,
}

impl FileBackend {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn path(&self, kind: SnapshotKind) -> PathBuf {
        self.root.join(kind.file_name())
    }

    fn tmp_path(&self, kind: SnapshotKind) -> PathBuf {
        self.root.join(format!("{}.tmp", kind.file_name()))
    }
}

impl SnapshotBackend for FileBackend {
    fn read(&self, kind: SnapshotKind) -> Result<Option<Vec<u8>>> {
        let path = self.path(kind);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    fn write(&self, kind: SnapshotKind, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.root).with_context(|| format!("creating {}", self.root.display()))?;
        let tmp = self.tmp_path(kind);
        let path = self.path(kind);
        {
            let mut f = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
            f.write_all(bytes)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &path).with_context(|| format!("renaming {} to {}", tmp.display(), path.display()))?;
        Ok(())
    }
}

/// Snapshots held in process memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    blobs: Mutex<HashMap<SnapshotKind, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotBackend for MemoryBackend {
    fn read(&self, kind: SnapshotKind) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.lock().get(&kind).cloned())
    }

    fn write(&self, kind: SnapshotKind, bytes: &[u8]) -> Result<()> {
        self.blobs.lock().insert(kind, bytes.to_vec());
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    schema_version: u32,
    written_at: OffsetDateTime,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    header: Header,
    body: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    header: Header,
    body: T,
}

pub fn encode<T: Serialize>(kind: SnapshotKind, body: &T) -> Result<Vec<u8>> {
    let envelope = EnvelopeRef {
        header: Header { schema_version: kind.schema_version(), written_at: OffsetDateTime::now_utc() },
        body,
    };
    bincode::serialize(&envelope).with_context(|| format!("encoding {kind:?} snapshot"))
}

pub fn decode<T: DeserializeOwned>(kind: SnapshotKind, bytes: &[u8]) -> Result<T> {
    // bincode tolerates trailing bytes, so the header can be read on its own
    // before committing to a body layout.
    let header: Header = bincode::deserialize(bytes).with_context(|| format!("reading {kind:?} snapshot header"))?;
    if header.schema_version != kind.schema_version() {
        bail!(
            "{kind:?} snapshot has schema version {}, supported is {}",
            header.schema_version,
            kind.schema_version()
        );
    }
    let envelope: Envelope<T> = bincode::deserialize(bytes).with_context(|| format!("decoding {kind:?} snapshot"))?;
    tracing::debug!(kind = ?kind, written_at = %envelope.header.written_at, "decoded snapshot");
    Ok(envelope.body)
}

/// Size of `body` once encoded, without the envelope.
pub fn encoded_len<T: Serialize>(body: &T) -> u64 {
    bincode::serialized_size(body).unwrap_or(0)
}

/// Load a store, falling back to an empty one when the snapshot is missing or unreadable.
pub fn load_or_default<T: DeserializeOwned + Default>(backend: &dyn SnapshotBackend, kind: SnapshotKind) -> T {
    let bytes = match backend.read(kind) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            tracing::warn!(kind = ?kind, "no snapshot found, starting empty");
            return T::default();
        }
        Err(e) => {
            tracing::warn!(kind = ?kind, error = %format!("{e:#}"), "snapshot unreadable, starting empty");
            return T::default();
        }
    };
    match decode(kind, &bytes) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(kind = ?kind, error = %format!("{e:#}"), "snapshot unparsable, starting empty");
            T::default()
        }
    }
}
