//! `opendal`-backed object store.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{future, StreamExt, TryStreamExt};
use opendal::{layers::LoggingLayer, services::S3, ErrorKind, Operator};
use tokio::fs;
use tracing::trace;

use super::{RemoteEntry, RemoteEntryStream, RemoteError, RemoteObjectSource};
use crate::config::StorageConfig;
use crate::fingerprint;

/// User-metadata key recording the content digest on upload, so listings
/// can compare fingerprints without re-reading object bytes.
const CONTENT_DIGEST_KEY: &str = "content-digest";

/// S3-style object store speaking the [`RemoteObjectSource`] contract.
pub struct CloudStore {
	op: Operator,
}

impl CloudStore {
	pub fn new(op: Operator) -> Self {
		Self {
			op: op.layer(LoggingLayer::default()),
		}
	}

	/// Build an S3 operator from the daemon's storage config. Credentials
	/// left out of the config fall through to the environment.
	pub fn s3(config: &StorageConfig) -> Result<Self, RemoteError> {
		let mut builder = S3::default().bucket(&config.bucket);
		if let Some(region) = &config.region {
			builder = builder.region(region);
		}
		if let Some(endpoint) = &config.endpoint {
			builder = builder.endpoint(endpoint);
		}
		if let Some(access_key_id) = &config.access_key_id {
			builder = builder.access_key_id(access_key_id);
		}
		if let Some(secret_access_key) = &config.secret_access_key {
			builder = builder.secret_access_key(secret_access_key);
		}

		Ok(Self::new(Operator::new(builder)?.finish()))
	}
}

#[async_trait]
impl RemoteObjectSource for CloudStore {
	async fn list(&self, prefix: &str) -> Result<RemoteEntryStream, RemoteError> {
		let lister = self.op.lister_with(prefix).recursive(true).await?;

		let op = self.op.clone();
		let prefix = prefix.to_string();
		let stream = lister
			.map_err(RemoteError::from)
			.try_filter(move |entry| future::ready(entry.path() != prefix))
			.and_then(move |entry| {
				let op = op.clone();
				async move {
					// Listing metadata is incomplete on most services; stat
					// for the full set, user metadata included.
					let metadata = op.stat(entry.path()).await?;

					let fingerprint = metadata
						.user_metadata()
						.and_then(|user| user.get(CONTENT_DIGEST_KEY).cloned())
						.or_else(|| metadata.etag().map(|etag| etag.trim_matches('"').to_string()))
						.unwrap_or_default();

					Ok(RemoteEntry {
						key: entry.path().to_string(),
						last_modified: metadata
							.last_modified()
							.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
						fingerprint,
					})
				}
			})
			.boxed();

		Ok(stream)
	}

	async fn get(&self, key: &str, dest: &Path) -> Result<(), RemoteError> {
		let buffer = self.op.read(key).await?;

		if let Some(parent) = dest.parent() {
			fs::create_dir_all(parent).await?;
		}
		fs::write(dest, buffer.to_bytes()).await?;

		trace!(key, dest = %dest.display(), "Downloaded object");
		Ok(())
	}

	async fn put(&self, key: &str, src: &Path) -> Result<(), RemoteError> {
		if key.ends_with('/') {
			self.op.create_dir(key).await?;
			return Ok(());
		}

		let data = fs::read(src).await?;
		let digest = fingerprint::bytes_digest(&data);
		self.op
			.write_with(key, data)
			.user_metadata(HashMap::from([(
				CONTENT_DIGEST_KEY.to_string(),
				digest,
			)]))
			.await?;

		trace!(key, src = %src.display(), "Uploaded object");
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), RemoteError> {
		self.op.delete(key).await?;
		Ok(())
	}

	async fn rename(&self, old_key: &str, new_key: &str) -> Result<bool, RemoteError> {
		// Object stores have no native rename; emulate with copy + delete
		// and report an absent source as `false` for the upload fallback.
		if old_key.ends_with('/') {
			match self.op.stat(old_key).await {
				Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
				Err(e) => return Err(e.into()),
				Ok(_) => {
					self.op.create_dir(new_key).await?;
					self.op.delete(old_key).await?;
					return Ok(true);
				}
			}
		}

		match self.op.copy(old_key, new_key).await {
			Ok(()) => {
				self.op.delete(old_key).await?;
				Ok(true)
			}
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
			Err(e) => Err(e.into()),
		}
	}
}
