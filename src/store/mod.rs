//! Append-only store of completed uploads.
//!
//! Records live in `storages/<project>/YYYY-MM.jsonl`, one JSON object per
//! line, partitioned by the month the upload was made. All operations on a
//! [`LinkStore`] hold the same mutex for their full duration, so a
//! background prune never interleaves with a foreground read. Other
//! processes are not coordinated.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const PARTITION_EXT: &str = "jsonl";
const TMP_SUFFIX: &str = ".jsonl.tmp";

/// Errors from the link store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid link record: {0}")]
    Invalid(String),

    #[error("failed to {action} {path}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt record in {path} at line {line}: {reason}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("unexpected entry in link store: {path}")]
    UnexpectedEntry { path: PathBuf },

    #[error("failed to serialize link record")]
    Serialize(#[source] serde_json::Error),

    #[error("link store lock poisoned")]
    Poisoned,
}

fn io_err<'a>(
    action: &'static str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> StoreError + 'a {
    move |source| StoreError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

/// One completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    #[serde(default)]
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub storage_link: String,
    pub storage_link_expires_at: DateTime<Utc>,
    #[serde(default)]
    pub short_link: String,
}

impl LinkRecord {
    /// New record with a fresh identifier, created now.
    pub fn new(
        storage_link: impl Into<String>,
        storage_link_expires_at: DateTime<Utc>,
        short_link: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            storage_link: storage_link.into(),
            storage_link_expires_at,
            short_link: short_link.into(),
        }
    }

    /// All string fields must be non-empty.
    pub fn validate(&self) -> Result<(), StoreError> {
        let missing = [
            ("id", &self.id),
            ("storage_link", &self.storage_link),
            ("short_link", &self.short_link),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty());

        match missing {
            Some((field, _)) => Err(StoreError::Invalid(format!("missing {field}"))),
            None => Ok(()),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.storage_link_expires_at <= now
    }

    fn partition_name(&self) -> String {
        format!("{}.{PARTITION_EXT}", self.created_at.format("%Y-%m"))
    }
}

/// Size summary of a store directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub partitions: usize,
    pub total_bytes: u64,
}

impl StoreStats {
    /// Format total_bytes as a human-readable string.
    pub fn human_size(&self) -> String {
        const KB: u64 = 1024;
        const MB: u64 = 1024 * KB;

        if self.total_bytes >= MB {
            format!("{:.1} MiB", self.total_bytes as f64 / MB as f64)
        } else if self.total_bytes >= KB {
            format!("{:.1} KiB", self.total_bytes as f64 / KB as f64)
        } else {
            format!("{} B", self.total_bytes)
        }
    }
}

/// Month-partitioned record store for one project.
#[derive(Debug)]
pub struct LinkStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl LinkStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.lock.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Validate `record` and append it to its month's partition.
    pub fn append(&self, record: &LinkRecord) -> Result<(), StoreError> {
        record.validate()?;
        let mut line = serde_json::to_string(record).map_err(StoreError::Serialize)?;
        line.push('\n');

        let _guard = self.guard()?;
        crate::paths::create_private_dir(&self.dir).map_err(io_err("create", &self.dir))?;

        let path = self.dir.join(record.partition_name());
        let mut file = open_private(&path, OpenOptions::new().create(true).append(true))
            .map_err(io_err("open", &path))?;
        file.write_all(line.as_bytes())
            .map_err(io_err("append to", &path))?;

        debug!(id = %record.id, partition = %path.display(), "link record appended");
        Ok(())
    }

    /// Every record, partitions in name order and lines in append order.
    ///
    /// The first unreadable line aborts the load. A missing store directory
    /// is an empty store.
    pub fn load_all(&self) -> Result<Vec<LinkRecord>, StoreError> {
        let _guard = self.guard()?;

        let mut records = Vec::new();
        for path in self.partitions(true)? {
            read_partition(&path, &mut records)?;
        }
        Ok(records)
    }

    /// Drop records whose link expired at or before `now`, rewriting each
    /// affected partition and deleting those left empty. Returns the number
    /// of records dropped.
    pub fn prune_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let _guard = self.guard()?;

        self.remove_leftovers()?;

        let mut dropped = 0;
        for path in self.partitions(false)? {
            let mut records = Vec::new();
            read_partition(&path, &mut records)?;

            let before = records.len();
            records.retain(|r| !r.is_expired(now));
            let removed = before - records.len();
            if removed == 0 {
                continue;
            }

            if records.is_empty() {
                fs::remove_file(&path).map_err(io_err("remove", &path))?;
            } else {
                rewrite_partition(&path, &records)?;
            }
            debug!(partition = %path.display(), removed, "pruned expired records");
            dropped += removed;
        }
        Ok(dropped)
    }

    /// Partition count and bytes on disk.
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let _guard = self.guard()?;

        let mut stats = StoreStats::default();
        for path in self.partitions(false)? {
            stats.partitions += 1;
            stats.total_bytes += fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        }
        Ok(stats)
    }

    /// Delete rewrite temp files left behind by an interrupted prune.
    fn remove_leftovers(&self) -> Result<(), StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(io_err("read", &self.dir)(e)),
        };
        for entry in entries {
            let path = entry.map_err(io_err("read", &self.dir))?.path();
            if path.is_file() && is_leftover(&path) {
                fs::remove_file(&path).map_err(io_err("remove", &path))?;
                debug!(path = %path.display(), "removed interrupted rewrite");
            }
        }
        Ok(())
    }

    /// Partition files sorted by name. With `strict`, any other directory
    /// entry is an error; otherwise it is skipped. Rewrite leftovers are
    /// always skipped.
    fn partitions(&self, strict: bool) -> Result<Vec<PathBuf>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err("read", &self.dir)(e)),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_err("read", &self.dir))?;
            let path = entry.path();
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if is_file && is_partition(&path) {
                paths.push(path);
            } else if is_file && is_leftover(&path) {
                continue;
            } else if strict {
                return Err(StoreError::UnexpectedEntry { path });
            }
        }
        paths.sort();
        Ok(paths)
    }
}

fn is_partition(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == PARTITION_EXT)
}

fn is_leftover(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(TMP_SUFFIX))
}

fn read_partition(path: &Path, out: &mut Vec<LinkRecord>) -> Result<(), StoreError> {
    let file = File::open(path).map_err(io_err("open", path))?;
    for (idx, line) in BufReader::new(file).split(b'\n').enumerate() {
        let line = line.map_err(io_err("read", path))?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let corrupt = |reason: String| StoreError::Corrupt {
            path: path.to_path_buf(),
            line: idx + 1,
            reason,
        };
        let record: LinkRecord =
            serde_json::from_slice(&line).map_err(|e| corrupt(e.to_string()))?;
        record.validate().map_err(|e| corrupt(e.to_string()))?;
        out.push(record);
    }
    Ok(())
}

fn rewrite_partition(path: &Path, records: &[LinkRecord]) -> Result<(), StoreError> {
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let write = || -> Result<(), StoreError> {
        let mut file = open_private(
            &tmp_path,
            OpenOptions::new().create(true).write(true).truncate(true),
        )
        .map_err(io_err("create", &tmp_path))?;
        for record in records {
            let line = serde_json::to_string(record).map_err(StoreError::Serialize)?;
            writeln!(file, "{line}").map_err(io_err("write", &tmp_path))?;
        }
        file.sync_all().map_err(io_err("sync", &tmp_path))?;
        fs::rename(&tmp_path, path).map_err(io_err("replace", path))
    };

    write().inspect_err(|_| {
        let _ = fs::remove_file(&tmp_path);
    })
}

fn open_private(path: &Path, options: &mut OpenOptions) -> io::Result<File> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}
