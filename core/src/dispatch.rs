//! The incremental event dispatcher.
//!
//! Each filesystem event becomes the minimal remote mutation plus one
//! index update, keeping both sides converged without a full pass. Every
//! handler runs to completion before the next event is looked at, and
//! every handler is fault-isolated: a failure is logged (or surfaced via
//! [`Dispatcher::try_handle`]) and never takes down the loop.

use std::path::{Path, MAIN_SEPARATOR};

use parking_lot::Mutex;
use tracing::{error, info, warn};
use treesync_fs_events::FsEvent;

use crate::error::SyncError;
use crate::index::{fs_path, LocalEntry, LocalIndex};
use crate::mapper::PathMapper;
use crate::remote::RemoteObjectSource;

pub(crate) struct Dispatcher<'a> {
	mapper: &'a PathMapper,
	remote: &'a dyn RemoteObjectSource,
	index: &'a Mutex<LocalIndex>,
}

impl<'a> Dispatcher<'a> {
	pub(crate) fn new(
		mapper: &'a PathMapper,
		remote: &'a dyn RemoteObjectSource,
		index: &'a Mutex<LocalIndex>,
	) -> Self {
		Self {
			mapper,
			remote,
			index,
		}
	}

	/// Handle one event, swallowing failures after logging them.
	///
	/// Events for paths outside the managed root are expected from the
	/// watcher (it sees sibling junk on some platforms) and only traced.
	pub(crate) async fn handle(&self, event: &FsEvent) {
		if let Err(e) = self.try_handle(event).await {
			if e.is_outside_root() {
				warn!(?event, "Ignoring event outside the sync root");
			} else {
				error!(?event, %e, "Failed to handle filesystem event");
			}
		}
	}

	pub(crate) async fn try_handle(&self, event: &FsEvent) -> Result<(), SyncError> {
		match event {
			FsEvent::Created(path) => self.created(path).await,
			FsEvent::Deleted(path) => self.deleted(path).await,
			FsEvent::Moved { from, to } => self.moved(from, to).await,
		}
	}

	async fn created(&self, path: &Path) -> Result<(), SyncError> {
		let entry = LocalEntry::stat(path).await?;
		let key = self.mapper.to_remote(&entry.path)?;

		self.remote.put(&key, fs_path(&entry.path)).await?;

		info!(path = %path.display(), %key, "Created");
		self.index.lock().insert(entry.path.clone(), entry);
		Ok(())
	}

	async fn deleted(&self, path: &Path) -> Result<(), SyncError> {
		let path_key = path.to_string_lossy().into_owned();
		let dir_key = format!("{path_key}{MAIN_SEPARATOR}");

		// The path is already gone, so it can no longer be stat'ed; the
		// index remembers whether it was a file or a directory.
		let indexed = {
			let index = self.index.lock();
			index
				.get(&path_key)
				.or_else(|| index.get(&dir_key))
				.map(|entry| entry.path.clone())
		};

		let local_key = indexed.unwrap_or_else(|| path_key.clone());
		let key = self.mapper.to_remote(&local_key)?;
		self.remote.delete(&key).await?;

		// Only forget the entry once the remote side is gone too, so a
		// failed delete is retried by the next reconciliation pass.
		let mut index = self.index.lock();
		index.remove(&path_key);
		index.remove(&dir_key);

		info!(path = %path.display(), %key, "Deleted");
		Ok(())
	}

	async fn moved(&self, from: &Path, to: &Path) -> Result<(), SyncError> {
		let entry = LocalEntry::stat(to).await?;

		let from_key_local = if entry.is_directory {
			format!("{}{}", from.to_string_lossy(), MAIN_SEPARATOR)
		} else {
			from.to_string_lossy().into_owned()
		};
		let old_key = self.mapper.to_remote(&from_key_local)?;
		let new_key = self.mapper.to_remote(&entry.path)?;

		if !self.remote.rename(&old_key, &new_key).await? {
			// The old object was never synced; upload the new path instead.
			self.remote.put(&new_key, fs_path(&entry.path)).await?;
		}

		info!(
			from = %from.display(),
			to = %to.display(),
			"Moved"
		);

		let from_file_key = from.to_string_lossy().into_owned();
		let from_dir_key = format!("{from_file_key}{MAIN_SEPARATOR}");
		let mut index = self.index.lock();
		index.remove(&from_file_key);
		index.remove(&from_dir_key);
		index.insert(entry.path.clone(), entry);
		Ok(())
	}
}
