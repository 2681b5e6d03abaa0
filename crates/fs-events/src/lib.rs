//! Platform-agnostic filesystem watching for treesync.
//!
//! The `notify` backends disagree about how renames are reported: inotify
//! can deliver a single event carrying both paths, FSEvents delivers two
//! halves, and a move out of the watched tree only ever produces the
//! "from" half. This crate hides all of that behind [`FsEvent`], which is
//! the only vocabulary the sync engine understands: something appeared,
//! something vanished, or something moved.

mod event;
mod normalize;
mod watcher;

pub use event::FsEvent;
pub use normalize::EventNormalizer;
pub use watcher::FsWatcher;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("watch backend error: {0}")]
    Backend(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, WatchError>;
