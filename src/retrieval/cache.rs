// Append-only persisted rankings.
// Entries are never rewritten in place; the only invalidation path is
// deleting the artifact.

use std::fs;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::retrieval::NeighborStore;
use crate::types::CacheKey;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Corrupt retrieval cache at {}: {source}; delete it to rebuild", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// How a flush reaches disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Truncate and rewrite the artifact in place. A crash mid-write can
    /// leave a truncated file that fails to parse on the next load.
    #[default]
    Overwrite,
    /// Write a sibling temp file, sync it, then rename over the artifact.
    #[serde(rename = "atomic")]
    AtomicRename,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushPolicy {
    /// Flush whenever the stored list count reaches a multiple of this.
    /// Zero disables periodic flushing.
    pub flush_every: usize,
    pub write_mode: WriteMode,
}

impl FlushPolicy {
    pub const DEFAULT_FLUSH_EVERY: usize = 500;
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            flush_every: Self::DEFAULT_FLUSH_EVERY,
            write_mode: WriteMode::Overwrite,
        }
    }
}

/// Ranked-neighbor lists for one (dataset, embedding model) pair, backed by
/// a single JSON array of index arrays.
#[derive(Debug)]
pub struct RetrievalCache {
    path: PathBuf,
    entries: Vec<Vec<usize>>,
    flushed_len: usize,
    policy: FlushPolicy,
}

impl RetrievalCache {
    /// Load the artifact for `key` under `storage_root`.
    ///
    /// A missing artifact is a cold start, not an error.
    pub fn open(storage_root: &Path, key: &CacheKey, policy: FlushPolicy) -> Result<Self, CacheError> {
        Self::open_path(key.artifact_path(storage_root), policy)
    }

    pub fn open_path(path: impl Into<PathBuf>, policy: FlushPolicy) -> Result<Self, CacheError> {
        let path = path.into();
        let entries = read_artifact(&path)?;
        let flushed_len = entries.len();

        Ok(Self {
            path,
            entries,
            flushed_len,
            policy,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[Vec<usize>] {
        &self.entries
    }

    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    /// True when some appended lists have not reached disk yet.
    pub fn is_dirty(&self) -> bool {
        self.entries.len() != self.flushed_len
    }

    /// Delete the artifact and forget every cached list.
    pub fn invalidate(&mut self) -> Result<(), CacheError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        }
        self.entries.clear();
        self.flushed_len = 0;
        info!(path = %self.path.display(), "Retrieval cache invalidated");
        Ok(())
    }

    fn write(&self) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        match self.policy.write_mode {
            WriteMode::Overwrite => write_json(&self.path, &self.entries, false),
            WriteMode::AtomicRename => {
                let temp = self.path.with_extension("json.tmp");
                write_json(&temp, &self.entries, true)?;
                fs::rename(&temp, &self.path).map_err(|source| CacheError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        }
    }
}

impl NeighborStore for RetrievalCache {
    fn get(&self, position: usize) -> Option<&[usize]> {
        self.entries.get(position).map(Vec::as_slice)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn append(&mut self, neighbors: Vec<usize>) -> Result<(), CacheError> {
        self.entries.push(neighbors);
        let every = self.policy.flush_every;
        if every > 0 && self.entries.len() % every == 0 {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), CacheError> {
        self.write()?;
        self.flushed_len = self.entries.len();
        debug!(
            path = %self.path.display(),
            entries = self.entries.len(),
            "Retrieval cache flushed"
        );
        Ok(())
    }
}

fn read_artifact(path: &Path) -> Result<Vec<Vec<usize>>, CacheError> {
    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "Retrieval results are not cached, starting from 0");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(CacheError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let entries: Vec<Vec<usize>> =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| CacheError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;

    debug!(path = %path.display(), entries = entries.len(), "Loaded retrieval cache");
    Ok(entries)
}

fn write_json(path: &Path, entries: &[Vec<usize>], sync: bool) -> Result<(), CacheError> {
    let io_err = |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = fs::File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, entries)?;
    writer.flush().map_err(io_err)?;
    if sync {
        writer.get_ref().sync_all().map_err(io_err)?;
    }
    Ok(())
}
