//! Content fingerprints.
//!
//! Fingerprints are opaque comparable strings; everywhere in the engine
//! "same fingerprint" means "same content, skip the transfer".

use blake3::Hasher;
use std::path::Path;
use tokio::{
	fs::File,
	io::{self, AsyncReadExt},
};

const BLOCK_LEN: usize = 1_048_576;

/// Streaming digest of a local file's content, lowercase hex.
pub async fn file_digest(path: impl AsRef<Path>) -> Result<String, io::Error> {
	let mut reader = File::open(path).await?;
	let mut hasher = Hasher::new();
	let mut buffer = vec![0; BLOCK_LEN].into_boxed_slice();
	loop {
		let read_count = reader.read(&mut buffer).await?;
		hasher.update(&buffer[..read_count]);
		if read_count != BLOCK_LEN {
			break;
		}
	}

	Ok(hasher.finalize().to_hex().to_string())
}

/// Digest of in-memory content; matches [`file_digest`] for equal bytes.
pub fn bytes_digest(bytes: &[u8]) -> String {
	blake3::hash(bytes).to_hex().to_string()
}
