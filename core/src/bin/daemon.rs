use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use treesync_core::config::SyncConfig;
use treesync_core::remote::cloud::CloudStore;
use treesync_core::{ReconcileReport, SyncEngine, SyncRoot};
use treesync_fs_events::FsWatcher;

#[derive(Parser, Debug)]
#[command(name = "treesync-daemon", about = "Treesync daemon")]
struct Args {
	/// Path to the treesync config file
	#[arg(long, default_value = "treesync.json")]
	config: PathBuf,

	/// Run the startup reconciliation pass and exit
	#[arg(long)]
	once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	let config = SyncConfig::load_or_init(&args.config)?;

	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
		)
		.init();

	let remote = Arc::new(CloudStore::s3(&config.storage)?);
	let root = SyncRoot::new(&config.local_root, config.remote_root.clone());
	let engine = SyncEngine::new(root, remote).await?;

	info!(
		local_root = %config.local_root.display(),
		remote_root = %config.remote_root,
		bucket = %config.storage.bucket,
		entries = engine.entry_count(),
		"treesync starting"
	);

	if args.once {
		let report = engine.reconcile().await;
		log_failures(&report);
		return Ok(());
	}

	// Register the watch before the startup pass so changes made while it
	// runs queue up instead of being missed; the engine drains them after.
	let (watcher, events) = FsWatcher::spawn(&config.local_root)?;
	info!(root = %watcher.root().display(), "Watching for filesystem changes");

	let resync = config.resync_interval_secs.map(Duration::from_secs);

	let ctrl_c = async {
		signal::ctrl_c()
			.await
			.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())
			.expect("failed to install signal handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = engine.run(events, resync) => {}
		() = ctrl_c => {
			info!("Received Ctrl+C, shutting down gracefully...");
		}
		() = terminate => {
			info!("Received SIGTERM, shutting down gracefully...");
		}
	}

	drop(watcher);
	Ok(())
}

fn log_failures(report: &ReconcileReport) {
	for failure in &report.failures {
		error!(key = %failure.key, error = %failure.error, "Object failed to reconcile");
	}
}
