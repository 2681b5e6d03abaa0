//! treesync core — the engine keeping a local directory tree
//! mirror-consistent with a remote object-storage namespace.
//!
//! The moving parts, leaf first: [`mapper::PathMapper`] translates between
//! local paths and remote keys for one configured [`mapper::SyncRoot`];
//! [`index::build_index`] snapshots the local tree into the engine-owned
//! [`index::LocalIndex`]; the reconciler drives a full merge-join pass
//! against the lazy remote listing; and the dispatcher applies live
//! filesystem events as minimal remote mutations. [`engine::SyncEngine`]
//! wires them together around one index with single-writer discipline.
//!
//! Remote transfer lives behind [`remote::RemoteObjectSource`]; the
//! shipped implementation is the `opendal`-backed [`remote::cloud::CloudStore`].
//! Filesystem watching lives in the `treesync-fs-events` crate.

pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod index;
pub mod mapper;
pub mod reconcile;
pub mod remote;

mod dispatch;

pub use engine::SyncEngine;
pub use error::SyncError;
pub use index::{build_index, LocalEntry, LocalIndex};
pub use mapper::{PathMapper, PathOutsideRoot, SyncRoot};
pub use reconcile::{ObjectFailure, ReconcileReport};
pub use remote::{RemoteEntry, RemoteError, RemoteObjectSource};
pub use treesync_fs_events::FsEvent;
