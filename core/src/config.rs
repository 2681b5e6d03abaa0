//! Daemon configuration.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Main daemon configuration, stored as JSON (`treesync.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
	/// Config schema version
	pub version: u32,

	/// Local directory to mirror
	pub local_root: PathBuf,

	/// Remote key prefix to mirror into
	pub remote_root: String,

	/// Object storage connection
	pub storage: StorageConfig,

	/// Seconds between periodic full reconciliation passes; absent
	/// disables the periodic pass
	pub resync_interval_secs: Option<u64>,

	/// Logging level
	pub log_level: String,
}

/// S3-style storage connection settings. Credentials left unset fall
/// through to the environment (standard AWS variables).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
	pub bucket: String,
	pub region: Option<String>,
	pub endpoint: Option<String>,
	pub access_key_id: Option<String>,
	pub secret_access_key: Option<String>,
}

impl SyncConfig {
	pub fn target_version() -> u32 {
		1
	}

	/// Load configuration, writing an editable template when none exists.
	pub fn load_or_init(path: &Path) -> Result<Self> {
		if path.exists() {
			return Self::load_from(path);
		}

		let template = Self::template();
		template.save(path)?;
		bail!(
			"no config found; template written to '{}', fill it in and restart",
			path.display()
		)
	}

	/// Load configuration from `path`.
	pub fn load_from(path: &Path) -> Result<Self> {
		let json = fs::read_to_string(path)
			.with_context(|| format!("reading config from '{}'", path.display()))?;
		let config: SyncConfig = serde_json::from_str(&json)
			.with_context(|| format!("parsing config at '{}'", path.display()))?;

		if config.version > Self::target_version() {
			bail!(
				"config version {} is newer than this binary understands ({})",
				config.version,
				Self::target_version()
			);
		}
		if config.local_root.as_os_str().is_empty() || config.remote_root.is_empty() {
			bail!("config at '{}' is missing a sync root", path.display());
		}

		Ok(config)
	}

	/// Save configuration to `path`.
	pub fn save(&self, path: &Path) -> Result<()> {
		if let Some(parent) = path.parent() {
			if !parent.as_os_str().is_empty() {
				fs::create_dir_all(parent)?;
			}
		}

		let json = serde_json::to_string_pretty(self)?;
		fs::write(path, json)?;
		info!("Saved config to {:?}", path);
		Ok(())
	}

	fn template() -> Self {
		Self {
			version: Self::target_version(),
			local_root: PathBuf::new(),
			remote_root: String::new(),
			storage: StorageConfig::default(),
			resync_interval_secs: Some(300),
			log_level: "info".to_string(),
		}
	}
}
