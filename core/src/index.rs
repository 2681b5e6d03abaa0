//! The local directory snapshot.
//!
//! [`build_index`] walks the sync root once at startup; afterwards the
//! index is only mutated in place by the reconciler and the event
//! dispatcher. Keys are absolute path strings; directory entries carry a
//! trailing platform separator so they map onto remote directory-marker
//! keys and empty directories survive a sync.

use std::collections::{HashMap, VecDeque};
use std::io::ErrorKind;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

const TO_WALK_QUEUE_INITIAL_CAPACITY: usize = 32;
const INDEX_INITIAL_CAPACITY: usize = 256;

#[derive(Error, Debug)]
pub enum IndexerError {
	#[error("local root not found: <path='{}'>", .0.display())]
	RootNotFound(PathBuf),
	#[error("local root is not a directory: <path='{}'>", .0.display())]
	NotADirectory(PathBuf),
	#[error("I/O error at '{}': {source}", .path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

/// Snapshot metadata for one local path.
#[derive(Debug, Clone)]
pub struct LocalEntry {
	/// Absolute path; directories end with the platform separator.
	pub path: String,
	pub is_directory: bool,
	pub last_modified: DateTime<Utc>,
	pub exists: bool,
}

impl LocalEntry {
	/// Stat `path` and build its index entry, normalizing directory keys
	/// to the trailing-separator form.
	pub async fn stat(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
		let path = path.as_ref();
		let metadata = fs::metadata(path).await?;

		let mut key = path.to_string_lossy().into_owned();
		let is_directory = metadata.is_dir();
		if is_directory && !key.ends_with(MAIN_SEPARATOR) {
			key.push(MAIN_SEPARATOR);
		}

		Ok(Self {
			path: key,
			is_directory,
			last_modified: modified_or_now(&metadata),
			exists: true,
		})
	}
}

/// Mapping from local path key to entry, owned by one engine instance.
pub type LocalIndex = HashMap<String, LocalEntry>;

/// The filesystem path behind an index key (trailing separator trimmed).
pub fn fs_path(path_key: &str) -> &Path {
	Path::new(path_key.trim_end_matches(MAIN_SEPARATOR))
}

/// Walk `root` and snapshot every entry beneath it.
///
/// The traversal uses an explicit queue rather than recursion, so tree
/// depth is bounded by heap only. An unreadable root or a failure partway
/// through aborts the whole build; there are no partial indexes.
pub async fn build_index(root: impl AsRef<Path>) -> Result<LocalIndex, IndexerError> {
	let root = root.as_ref();

	let root_metadata = fs::metadata(root).await.map_err(|e| {
		if e.kind() == ErrorKind::NotFound {
			IndexerError::RootNotFound(root.to_path_buf())
		} else {
			IndexerError::Io {
				path: root.to_path_buf(),
				source: e,
			}
		}
	})?;
	if !root_metadata.is_dir() {
		return Err(IndexerError::NotADirectory(root.to_path_buf()));
	}

	let mut index = LocalIndex::with_capacity(INDEX_INITIAL_CAPACITY);
	let mut to_walk = VecDeque::with_capacity(TO_WALK_QUEUE_INITIAL_CAPACITY);
	to_walk.push_back(root.to_path_buf());

	while let Some(dir) = to_walk.pop_front() {
		let mut read_dir = fs::read_dir(&dir).await.map_err(|e| IndexerError::Io {
			path: dir.clone(),
			source: e,
		})?;

		while let Some(dir_entry) = read_dir.next_entry().await.map_err(|e| IndexerError::Io {
			path: dir.clone(),
			source: e,
		})? {
			let path = dir_entry.path();
			let metadata = dir_entry.metadata().await.map_err(|e| IndexerError::Io {
				path: path.clone(),
				source: e,
			})?;

			let mut key = path.to_string_lossy().into_owned();
			if metadata.is_dir() {
				key.push(MAIN_SEPARATOR);
				index.insert(
					key.clone(),
					LocalEntry {
						path: key,
						is_directory: true,
						last_modified: modified_or_now(&metadata),
						exists: true,
					},
				);
				to_walk.push_back(path);
			} else {
				index.insert(
					key.clone(),
					LocalEntry {
						path: key,
						is_directory: false,
						last_modified: modified_or_now(&metadata),
						exists: true,
					},
				);
			}
		}
	}

	debug!(
		entries = index.len(),
		root = %root.display(),
		"Local index built"
	);

	Ok(index)
}

pub(crate) fn modified_or_now(metadata: &std::fs::Metadata) -> DateTime<Utc> {
	metadata
		.modified()
		.map(DateTime::<Utc>::from)
		.unwrap_or_else(|_| Utc::now())
}
