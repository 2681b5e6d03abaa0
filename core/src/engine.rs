//! The sync engine instance.
//!
//! One engine owns one [`SyncRoot`]'s worth of state: the path mapper, the
//! in-memory local index and a handle to the remote store. The index is
//! the only shared mutable state; it sits behind a mutex that is held just
//! long enough to read or write one entry — never across a network await —
//! and all writers (the startup pass, live events, periodic passes) are
//! serviced from a single task, so one logical mutation completes before
//! the next is observed.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};
use treesync_fs_events::FsEvent;

use crate::dispatch::Dispatcher;
use crate::error::SyncError;
use crate::index::{build_index, fs_path, LocalEntry, LocalIndex};
use crate::mapper::{PathMapper, SyncRoot};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::remote::RemoteObjectSource;

pub struct SyncEngine {
	mapper: PathMapper,
	remote: Arc<dyn RemoteObjectSource>,
	index: Mutex<LocalIndex>,
}

impl SyncEngine {
	/// Index the local root and build the engine around the snapshot.
	///
	/// An unreadable root is the one fatal startup error; everything after
	/// construction degrades per object instead.
	pub async fn new(
		root: SyncRoot,
		remote: Arc<dyn RemoteObjectSource>,
	) -> Result<Self, SyncError> {
		let mapper = PathMapper::new(root);
		let index = build_index(fs_path(mapper.local_root())).await?;

		debug!(
			local_root = mapper.local_root(),
			remote_root = mapper.remote_root(),
			entries = index.len(),
			"Sync engine ready"
		);

		Ok(Self {
			mapper,
			remote,
			index: Mutex::new(index),
		})
	}

	pub fn mapper(&self) -> &PathMapper {
		&self.mapper
	}

	/// Snapshot of one index entry, by path key.
	pub fn entry(&self, path_key: &str) -> Option<LocalEntry> {
		self.index.lock().get(path_key).cloned()
	}

	pub fn entry_count(&self) -> usize {
		self.index.lock().len()
	}

	/// Run one full reconciliation pass against the remote listing.
	pub async fn reconcile(&self) -> ReconcileReport {
		Reconciler::new(&self.mapper, self.remote.as_ref(), &self.index)
			.run()
			.await
	}

	/// Handle one filesystem event, logging and swallowing failures.
	pub async fn handle_event(&self, event: &FsEvent) {
		Dispatcher::new(&self.mapper, self.remote.as_ref(), &self.index)
			.handle(event)
			.await
	}

	/// Handle one filesystem event, surfacing the failure to the caller.
	pub async fn try_handle_event(&self, event: &FsEvent) -> Result<(), SyncError> {
		Dispatcher::new(&self.mapper, self.remote.as_ref(), &self.index)
			.try_handle(event)
			.await
	}

	/// Run the engine until the event channel closes.
	///
	/// The startup reconciliation pass completes before the first live
	/// event is consumed; events arriving meanwhile wait in the channel.
	/// With `resync_interval` set, a periodic full pass is serviced from
	/// the same loop as the events, so index writers never overlap.
	pub async fn run(
		&self,
		mut events: mpsc::UnboundedReceiver<FsEvent>,
		resync_interval: Option<Duration>,
	) {
		self.reconcile().await;

		let mut resync = resync_interval.map(|period| {
			let mut tick = interval_at(Instant::now() + period, period);
			tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
			tick
		});

		loop {
			let maybe_event = match resync.as_mut() {
				Some(tick) => tokio::select! {
					maybe_event = events.recv() => maybe_event,
					_ = tick.tick() => {
						debug!("Periodic reconciliation tick");
						self.reconcile().await;
						continue;
					}
				},
				None => events.recv().await,
			};

			match maybe_event {
				Some(event) => self.handle_event(&event).await,
				None => break,
			}
		}

		info!("Event channel closed; sync engine stopping");
	}
}
