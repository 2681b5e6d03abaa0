//! The `notify`-backed watcher.

use crate::event::FsEvent;
use crate::normalize::EventNormalizer;
use crate::Result;
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, trace};

const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Owns the OS watch on a single root and feeds normalized events into an
/// unbounded channel.
///
/// Dropping the watcher unregisters the OS watch and stops the
/// normalization task; the receiver then drains whatever was already
/// emitted and closes.
pub struct FsWatcher {
    root: PathBuf,
    // Kept alive for the OS watch registration; dropping it stops delivery.
    _watcher: RecommendedWatcher,
    handle: JoinHandle<()>,
}

impl FsWatcher {
    /// Start watching `root` recursively.
    ///
    /// Raw backend events are forwarded off the notify callback thread
    /// through an unbounded channel, then normalized on a tokio task that
    /// also ticks the rename-eviction buffer.
    pub fn spawn(root: impl Into<PathBuf>) -> Result<(Self, mpsc::UnboundedReceiver<FsEvent>)> {
        let root = root.into();

        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<notify::Event>| match result {
                Ok(event) => {
                    if raw_tx.send(event).is_err() {
                        error!("Tried to send filesystem event to a closed channel");
                    }
                }
                Err(e) => error!(?e, "Filesystem watch backend error"),
            },
            Config::default(),
        )?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            let mut normalizer = EventNormalizer::new();
            let mut tick = interval(TICK_INTERVAL);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                let normalized = tokio::select! {
                    maybe_raw = raw_rx.recv() => match maybe_raw {
                        Some(raw) => normalizer.process(&raw),
                        None => break,
                    },
                    _ = tick.tick() => normalizer.tick(),
                };

                for event in normalized {
                    if events_tx.send(event).is_err() {
                        trace!("Event consumer went away; stopping normalization");
                        return;
                    }
                }
            }

            trace!("Watch channel closed; normalization task exiting");
        });

        Ok((
            Self {
                root,
                _watcher: watcher,
                handle,
            },
            events_rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for FsWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<FsEvent>) -> FsEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for filesystem event")
            .expect("event channel closed")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_and_delete_are_observed() {
        let dir = tempfile::TempDir::new().unwrap();
        let (_watcher, mut rx) = FsWatcher::spawn(dir.path()).unwrap();

        let file = dir.path().join("a.txt");
        std::fs::write(&file, "A").unwrap();

        let event = next_event(&mut rx).await;
        assert!(event.is_created());
        assert_eq!(event.path(), file);

        std::fs::remove_file(&file).unwrap();
        loop {
            let event = next_event(&mut rx).await;
            if event.is_deleted() {
                assert_eq!(event.path(), file);
                break;
            }
        }
    }
}
