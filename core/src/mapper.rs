//! Local-path ⇄ remote-key translation.
//!
//! All index keys and remote keys in the engine are plain strings:
//! absolute local paths where directories carry a trailing platform
//! separator, and remote keys where directory markers carry a trailing
//! `/`. The mapper is the only place the two spellings meet.

use std::path::{Path, MAIN_SEPARATOR, MAIN_SEPARATOR_STR};

use thiserror::Error;

/// Input path/key does not fall under the configured sync root.
#[derive(Error, Debug)]
#[error("path does not fall under the configured sync root: <input='{input}'>")]
pub struct PathOutsideRoot {
	pub input: String,
}

/// The configured (local directory, remote key prefix) pair one engine
/// instance manages.
///
/// The local root is normalized to end with the platform separator and the
/// remote root to end with `/`, so prefix checks are exact and never match
/// sibling directories sharing a name prefix.
#[derive(Debug, Clone)]
pub struct SyncRoot {
	local: String,
	remote: String,
}

impl SyncRoot {
	pub fn new(local_root: impl AsRef<Path>, remote_root: impl Into<String>) -> Self {
		let mut local = local_root.as_ref().to_string_lossy().into_owned();
		if !local.ends_with(MAIN_SEPARATOR) {
			local.push(MAIN_SEPARATOR);
		}

		let mut remote = remote_root.into();
		if !remote.ends_with('/') {
			remote.push('/');
		}

		Self { local, remote }
	}
}

/// Bidirectional translation between local paths and remote keys for one
/// [`SyncRoot`].
///
/// Translation is pure and total except for the documented
/// [`PathOutsideRoot`] rejections. Restricted to inputs that obey the
/// directory-suffix convention it is a bijection; the known exception is a
/// local file with no extension-like suffix, which maps to a
/// directory-marker key.
#[derive(Debug, Clone)]
pub struct PathMapper {
	root: SyncRoot,
}

impl PathMapper {
	pub fn new(root: SyncRoot) -> Self {
		Self { root }
	}

	/// The normalized local root, trailing separator included.
	pub fn local_root(&self) -> &str {
		&self.root.local
	}

	/// The normalized remote root, trailing `/` included.
	pub fn remote_root(&self) -> &str {
		&self.root.remote
	}

	/// Translate an absolute local path into its remote key.
	pub fn to_remote(&self, local_path: &str) -> Result<String, PathOutsideRoot> {
		let rest = local_path
			.strip_prefix(&self.root.local)
			.ok_or_else(|| PathOutsideRoot {
				input: local_path.to_string(),
			})?;

		let mut key = format!("{}{}", self.root.remote, rest.replace(MAIN_SEPARATOR, "/"));

		// Keys without an extension-like suffix are directory markers.
		if !key.ends_with('/') && Path::new(rest).extension().is_none() {
			key.push('/');
		}

		Ok(key)
	}

	/// Translate a remote key into its absolute local path.
	pub fn to_local(&self, remote_key: &str) -> Result<String, PathOutsideRoot> {
		let rest = remote_key
			.strip_prefix(&self.root.remote)
			.ok_or_else(|| PathOutsideRoot {
				input: remote_key.to_string(),
			})?;

		Ok(format!(
			"{}{}",
			self.root.local,
			rest.replace('/', MAIN_SEPARATOR_STR)
		))
	}
}

/// Whether a remote key names a directory marker.
pub fn is_directory_key(key: &str) -> bool {
	key.ends_with('/')
}

/// Whether a local index key names a directory entry.
pub fn is_directory_path(path_key: &str) -> bool {
	path_key.ends_with(MAIN_SEPARATOR)
}
