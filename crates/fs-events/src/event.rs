use std::path::{Path, PathBuf};

/// A normalized filesystem change.
///
/// Consumers never see raw backend events; split renames have already been
/// paired and junk paths filtered by the time one of these is emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    /// A file or directory appeared under the watched root.
    Created(PathBuf),
    /// A file or directory was removed from the watched root.
    Deleted(PathBuf),
    /// A file or directory was renamed within the watched root.
    Moved { from: PathBuf, to: PathBuf },
}

impl FsEvent {
    /// The path this event is primarily about (the destination, for moves).
    pub fn path(&self) -> &Path {
        match self {
            FsEvent::Created(path) | FsEvent::Deleted(path) => path,
            FsEvent::Moved { to, .. } => to,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, FsEvent::Created(_))
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, FsEvent::Deleted(_))
    }

    pub fn is_moved(&self) -> bool {
        matches!(self, FsEvent::Moved { .. })
    }
}
