//! The full-tree reconciliation pass.
//!
//! One pass is a merge-join over two keyed sets: the lazy remote listing
//! on one side and the in-memory local index on the other. Objects on
//! exactly one side are propagated to the other; objects on both sides
//! with differing fingerprints keep the most recently modified variant,
//! ties favoring the local copy. The pass is not transactional — a
//! failure partway leaves earlier mutations applied — but re-running it
//! converges the remainder, and a pass over converged trees mutates
//! nothing.

use std::collections::HashSet;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::fs;
use tracing::{info, warn};

use crate::error::SyncError;
use crate::index::{fs_path, LocalEntry, LocalIndex};
use crate::mapper::{is_directory_key, PathMapper};
use crate::remote::{RemoteEntry, RemoteObjectSource};

/// One object the pass could not converge. The pass went on without it.
#[derive(Debug)]
pub struct ObjectFailure {
	/// Remote key or local path key, whichever named the object first.
	pub key: String,
	pub error: SyncError,
}

/// Outcome counts of one reconciliation pass.
#[derive(Debug, Default)]
pub struct ReconcileReport {
	pub uploaded: u64,
	pub downloaded: u64,
	pub dirs_created: u64,
	pub unchanged: u64,
	pub failures: Vec<ObjectFailure>,
}

impl ReconcileReport {
	/// Number of mutations the pass applied to either side.
	pub fn mutations(&self) -> u64 {
		self.uploaded + self.downloaded + self.dirs_created
	}

	fn bump(&mut self, outcome: Outcome) {
		match outcome {
			Outcome::Unchanged => self.unchanged += 1,
			Outcome::Uploaded => self.uploaded += 1,
			Outcome::Downloaded => self.downloaded += 1,
			Outcome::DirCreated => self.dirs_created += 1,
		}
	}

	fn fail(&mut self, key: String, error: SyncError) {
		warn!(%key, %error, "Failed to reconcile object");
		self.failures.push(ObjectFailure { key, error });
	}
}

enum Outcome {
	Unchanged,
	Uploaded,
	Downloaded,
	DirCreated,
}

pub(crate) struct Reconciler<'a> {
	mapper: &'a PathMapper,
	remote: &'a dyn RemoteObjectSource,
	index: &'a Mutex<LocalIndex>,
}

impl<'a> Reconciler<'a> {
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

	/// Run one full pass. Per-object failures are collected into the
	/// report; only a failure to open the listing ends the pass early.
	pub(crate) async fn run(&self) -> ReconcileReport {
		let mut report = ReconcileReport::default();
		let mut seen: HashSet<String> = HashSet::new();

		let mut entries = match self.remote.list(self.mapper.remote_root()).await {
			Ok(stream) => stream,
			Err(e) => {
				report.fail(self.mapper.remote_root().to_string(), e.into());
				return report;
			}
		};

		while let Some(next) = entries.next().await {
			let entry = match next {
				Ok(entry) => entry,
				Err(e) => {
					report.fail(self.mapper.remote_root().to_string(), e.into());
					continue;
				}
			};

			let local_key = match self.mapper.to_local(&entry.key) {
				Ok(local_key) => local_key,
				Err(e) => {
					report.fail(entry.key, e.into());
					continue;
				}
			};
			if local_key == self.mapper.local_root() {
				// The root pair itself is a boundary, not an entry.
				continue;
			}

			match self.apply_remote_entry(&entry, &local_key).await {
				Ok(outcome) => report.bump(outcome),
				Err(error) => report.fail(entry.key, error),
			}

			// Seen regardless of outcome, so the local-only sweep below
			// never re-pushes an object the remote side already has.
			seen.insert(local_key);
		}

		let local_only: Vec<String> = {
			let index = self.index.lock();
			index
				.keys()
				.filter(|key| !seen.contains(*key))
				.cloned()
				.collect()
		};

		for path_key in local_only {
			match self.push_local_entry(&path_key).await {
				Ok(outcome) => report.bump(outcome),
				Err(error) => report.fail(path_key, error),
			}
		}

		info!(
			uploaded = report.uploaded,
			downloaded = report.downloaded,
			dirs_created = report.dirs_created,
			unchanged = report.unchanged,
			failures = report.failures.len(),
			"Reconciliation pass complete"
		);

		report
	}

	/// Converge one remote entry against the local side.
	async fn apply_remote_entry(
		&self,
		entry: &RemoteEntry,
		local_key: &str,
	) -> Result<Outcome, SyncError> {
		let existing = self.index.lock().get(local_key).cloned();

		let Some(local) = existing else {
			return self.materialize(entry, local_key).await;
		};

		// Directory markers have no content to compare.
		if local.is_directory || is_directory_key(&entry.key) {
			return Ok(Outcome::Unchanged);
		}

		let local_fingerprint = self.remote.local_fingerprint(fs_path(local_key)).await?;
		if local_fingerprint == entry.fingerprint {
			return Ok(Outcome::Unchanged);
		}

		// Conflict: most recently modified wins, ties favor the local copy.
		if local.last_modified >= entry.last_modified {
			self.remote.put(&entry.key, fs_path(local_key)).await?;
			Ok(Outcome::Uploaded)
		} else {
			self.remote.get(&entry.key, fs_path(local_key)).await?;
			let refreshed = LocalEntry::stat(local_key).await?;
			self.index.lock().insert(refreshed.path.clone(), refreshed);
			Ok(Outcome::Downloaded)
		}
	}

	/// Bring a remote-only object into existence locally.
	async fn materialize(&self, entry: &RemoteEntry, local_key: &str) -> Result<Outcome, SyncError> {
		if is_directory_key(&entry.key) {
			fs::create_dir_all(fs_path(local_key)).await?;
			let created = LocalEntry::stat(local_key).await?;
			self.index.lock().insert(created.path.clone(), created);
			return Ok(Outcome::DirCreated);
		}

		if let Some(parent) = fs_path(local_key).parent() {
			fs::create_dir_all(parent).await?;
		}
		self.remote.get(&entry.key, fs_path(local_key)).await?;

		let downloaded = LocalEntry::stat(local_key).await?;
		self.index.lock().insert(downloaded.path.clone(), downloaded);
		Ok(Outcome::Downloaded)
	}

	/// Push a local-only entry to its mapped remote key.
	async fn push_local_entry(&self, path_key: &str) -> Result<Outcome, SyncError> {
		let key = self.mapper.to_remote(path_key)?;
		self.remote.put(&key, fs_path(path_key)).await?;
		Ok(Outcome::Uploaded)
	}
}
