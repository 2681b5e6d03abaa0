//! Shared test helpers: an in-memory remote object store that records
//! every operation, plus small tree-building utilities.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use treesync_core::fingerprint::bytes_digest;
use treesync_core::remote::{RemoteEntry, RemoteEntryStream, RemoteError, RemoteObjectSource};

/// One recorded call against the mock store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOp {
    List,
    Get(String),
    Put(String),
    Delete(String),
    Rename(String, String),
}

#[derive(Debug, Clone)]
struct StoredObject {
    /// `None` for directory markers.
    content: Option<Vec<u8>>,
    last_modified: DateTime<Utc>,
    fingerprint: String,
}

/// In-memory [`RemoteObjectSource`] with an operation log and injectable
/// per-key put failures.
#[derive(Default)]
pub struct MemoryRemote {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    ops: Mutex<Vec<RemoteOp>>,
    failing_puts: Mutex<HashSet<String>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a remote object with explicit content and mtime.
    pub fn insert_object(&self, key: &str, content: &[u8], last_modified: DateTime<Utc>) {
        self.objects.lock().insert(
            key.to_string(),
            StoredObject {
                fingerprint: bytes_digest(content),
                content: Some(content.to_vec()),
                last_modified,
            },
        );
    }

    /// Seed a remote directory marker.
    pub fn insert_dir(&self, key: &str, last_modified: DateTime<Utc>) {
        assert!(key.ends_with('/'), "directory markers end with '/'");
        self.objects.lock().insert(
            key.to_string(),
            StoredObject {
                content: None,
                last_modified,
                fingerprint: String::new(),
            },
        );
    }

    /// Make every `put` against `key` fail.
    pub fn fail_puts_for(&self, key: &str) {
        self.failing_puts.lock().insert(key.to_string());
    }

    pub fn ops(&self) -> Vec<RemoteOp> {
        self.ops.lock().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.lock().clear();
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().keys().cloned().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().contains_key(key)
    }

    pub fn content(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().get(key).and_then(|o| o.content.clone())
    }

    fn record(&self, op: RemoteOp) {
        self.ops.lock().push(op);
    }
}

#[async_trait]
impl RemoteObjectSource for MemoryRemote {
    async fn list(&self, prefix: &str) -> Result<RemoteEntryStream, RemoteError> {
        self.record(RemoteOp::List);

        let entries: Vec<Result<RemoteEntry, RemoteError>> = self
            .objects
            .lock()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix) && key.as_str() != prefix)
            .map(|(key, object)| {
                Ok(RemoteEntry {
                    key: key.clone(),
                    last_modified: object.last_modified,
                    fingerprint: object.fingerprint.clone(),
                })
            })
            .collect();

        Ok(stream::iter(entries).boxed())
    }

    async fn get(&self, key: &str, dest: &Path) -> Result<(), RemoteError> {
        self.record(RemoteOp::Get(key.to_string()));

        let content = self.content(key).ok_or_else(|| {
            RemoteError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such remote object: {key}"),
            ))
        })?;
        std::fs::write(dest, content).map_err(RemoteError::Io)?;
        Ok(())
    }

    async fn put(&self, key: &str, src: &Path) -> Result<(), RemoteError> {
        self.record(RemoteOp::Put(key.to_string()));

        if self.failing_puts.lock().contains(key) {
            return Err(RemoteError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("injected put failure for {key}"),
            )));
        }

        if key.ends_with('/') {
            self.insert_dir(key, Utc::now());
            return Ok(());
        }

        let content = std::fs::read(src).map_err(RemoteError::Io)?;
        self.insert_object(key, &content, Utc::now());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RemoteError> {
        self.record(RemoteOp::Delete(key.to_string()));
        self.objects.lock().remove(key);
        Ok(())
    }

    async fn rename(&self, old_key: &str, new_key: &str) -> Result<bool, RemoteError> {
        self.record(RemoteOp::Rename(old_key.to_string(), new_key.to_string()));

        let Some(object) = self.objects.lock().remove(old_key) else {
            return Ok(false);
        };
        self.objects.lock().insert(new_key.to_string(), object);
        Ok(true)
    }
}

/// Create a file (parents included) under `root`, `/`-separated.
pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

/// Index key of a file under `root`.
pub fn file_key(root: &Path, relative: &str) -> String {
    root.join(relative).to_string_lossy().into_owned()
}

/// Index key of a directory under `root` (trailing separator form).
pub fn dir_key(root: &Path, relative: &str) -> String {
    format!(
        "{}{}",
        root.join(relative).to_string_lossy(),
        std::path::MAIN_SEPARATOR
    )
}
