//! The remote object-storage boundary.
//!
//! The engine never owns remote metadata: it observes [`RemoteEntry`]
//! descriptors while listing and issues the four mutations through
//! [`RemoteObjectSource`]. Everything behind the trait — transport,
//! retries, auth — is the store's concern.

pub mod cloud;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use thiserror::Error;

use crate::fingerprint;

#[derive(Error, Debug)]
pub enum RemoteError {
	#[error("remote storage error: {0}")]
	Backend(#[from] opendal::Error),
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

/// Descriptor of one remote object, produced transiently while listing.
#[derive(Debug, Clone)]
pub struct RemoteEntry {
	pub key: String,
	pub last_modified: DateTime<Utc>,
	/// Opaque content digest, comparable against
	/// [`RemoteObjectSource::local_fingerprint`] output.
	pub fingerprint: String,
}

pub type RemoteEntryStream = BoxStream<'static, Result<RemoteEntry, RemoteError>>;

/// Contract between the sync engine and a remote object store.
///
/// Mutation failures are per-object as far as the engine is concerned;
/// they abort the one operation, get logged or collected, and never take
/// down a reconciliation pass or the event loop.
#[async_trait]
pub trait RemoteObjectSource: Send + Sync {
	/// Lazily list every object under `prefix`.
	///
	/// The sequence may be unbounded or paginated; it is consumed entry by
	/// entry and must never require materializing the whole listing. The
	/// prefix itself is not yielded.
	async fn list(&self, prefix: &str) -> Result<RemoteEntryStream, RemoteError>;

	/// Download `key` into the file at `dest`, overwriting it.
	async fn get(&self, key: &str, dest: &Path) -> Result<(), RemoteError>;

	/// Upload the file at `src` to `key`, overwriting the remote object.
	///
	/// A key ending in `/` is a directory marker and carries no bytes.
	async fn put(&self, key: &str, src: &Path) -> Result<(), RemoteError>;

	/// Delete `key`. Deleting an absent key is not an error.
	async fn delete(&self, key: &str) -> Result<(), RemoteError>;

	/// Move `old_key` to `new_key`, returning whether the source object
	/// existed. `false` is the signal for the caller's upload fallback.
	async fn rename(&self, old_key: &str, new_key: &str) -> Result<bool, RemoteError>;

	/// Digest local file content with the scheme this source's
	/// fingerprints are comparable against.
	async fn local_fingerprint(&self, path: &Path) -> Result<String, RemoteError> {
		Ok(fingerprint::file_digest(path).await?)
	}
}
