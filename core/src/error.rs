use crate::index::IndexerError;
use crate::mapper::PathOutsideRoot;
use crate::remote::RemoteError;

use thiserror::Error;

/// Umbrella error for engine operations.
///
/// During reconciliation and event dispatch these are per-object: collected
/// (or logged) and never fatal to the containing pass. The one fatal case
/// is [`SyncError::Indexing`] at engine startup.
#[derive(Error, Debug)]
pub enum SyncError {
	#[error(transparent)]
	OutsideRoot(#[from] PathOutsideRoot),
	#[error(transparent)]
	Indexing(#[from] IndexerError),
	#[error("remote operation failed: {0}")]
	Remote(#[from] RemoteError),
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl SyncError {
	/// Whether this error only says the path is unmanaged (logged and
	/// skipped, never surfaced as a failure).
	pub fn is_outside_root(&self) -> bool {
		matches!(self, SyncError::OutsideRoot(_))
	}
}
