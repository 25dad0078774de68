//! Durable storage for checkpoint records.
//!
//! A store keeps one opaque record per run id and must replace it
//! atomically: a reader sees either the previous record or the new one,
//! never a partial write.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Atomically replace the record for `run_id`.
    async fn write(&self, run_id: &str, bytes: &[u8]) -> std::io::Result<()>;

    /// Read back the record for `run_id`, `None` if it was never written.
    async fn read(&self, run_id: &str) -> std::io::Result<Option<Vec<u8>>>;
}

/// One JSON file per run inside a directory.
///
/// Writes go to a temporary file in the same directory which is then
/// renamed over the target, so the record is never observed half-written.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    directory: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the record for `run_id`. Characters outside
    /// `[A-Za-z0-9_-]` are replaced so a run id can never escape the
    /// directory.
    pub fn path_for(&self, run_id: &str) -> PathBuf {
        let file_name: String = run_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.directory.join(format!("{file_name}.json"))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn write(&self, run_id: &str, bytes: &[u8]) -> std::io::Result<()> {
        let directory = self.directory.clone();
        let target = self.path_for(run_id);
        let bytes = bytes.to_vec();

        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&directory)?;
            let mut temp = NamedTempFile::new_in(&directory)?;
            temp.write_all(&bytes)?;
            temp.as_file().sync_all()?;
            temp.persist(&target).map_err(|e| e.error)?;
            Ok::<(), std::io::Error>(())
        })
        .await
        .map_err(std::io::Error::other)?
    }

    async fn read(&self, run_id: &str) -> std::io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(run_id)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// In-memory store, for tests and runs that do not need to survive the
/// process.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    records: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn write(&self, run_id: &str, bytes: &[u8]) -> std::io::Result<()> {
        self.records.lock().insert(run_id.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn read(&self, run_id: &str) -> std::io::Result<Option<Vec<u8>>> {
        Ok(self.records.lock().get(run_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_store_round_trip_and_overwrite() {
        let dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("checkpoints"));

        assert!(store.read("card-1").await.unwrap().is_none());

        store.write("card-1", b"first").await.unwrap();
        store.write("card-1", b"second").await.unwrap();
        assert_eq!(store.read("card-1").await.unwrap(), Some(b"second".to_vec()));

        // Only the record itself remains, no temp files
        let entries: Vec<_> = std::fs::read_dir(store.directory()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_run_id_cannot_escape_directory() {
        let store = FileCheckpointStore::new("/tmp/checkpoints");
        let path = store.path_for("../../etc/passwd");
        assert_eq!(path, PathBuf::from("/tmp/checkpoints/______etc_passwd.json"));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryCheckpointStore::new();
        assert!(store.is_empty());
        store.write("a", b"1").await.unwrap();
        assert_eq!(store.read("a").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.read("b").await.unwrap(), None);
        assert_eq!(store.len(), 1);
    }
}
