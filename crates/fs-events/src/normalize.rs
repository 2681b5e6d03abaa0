//! Raw `notify` event normalization.
//!
//! inotify reports renames either as one event with both paths or as a
//! From/To pair sharing a tracker id; FSEvents only ever sends halves.
//! A "from" half with no matching "to" means the entry left the watched
//! tree, so after a stabilization timeout it is evicted as a deletion.

use crate::event::FsEvent;
use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::Event;
use std::collections::VecDeque;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::trace;

/// How long a dangling rename "from" half is held before being treated as
/// a move out of the watched tree.
const RENAME_TIMEOUT_MS: u64 = 100;

/// Turns raw backend events into [`FsEvent`]s.
///
/// Data-modify notifications are deliberately dropped: in-place content
/// edits are converged by the next reconciliation pass, and the engine's
/// incremental contract is create/delete/move only.
pub struct EventNormalizer {
    pending_rename_from: VecDeque<(std::path::PathBuf, Instant)>,
    rename_timeout: Duration,
}

impl EventNormalizer {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_millis(RENAME_TIMEOUT_MS))
    }

    pub fn with_timeout(rename_timeout: Duration) -> Self {
        Self {
            pending_rename_from: VecDeque::new(),
            rename_timeout,
        }
    }

    /// Process one raw event, returning zero or more normalized events.
    pub fn process(&mut self, event: &Event) -> Vec<FsEvent> {
        if event.paths.iter().any(|path| is_junk(path)) {
            return vec![];
        }

        let Some(path) = event.paths.first().cloned() else {
            return vec![];
        };

        match event.kind {
            EventKind::Create(_) => vec![FsEvent::Created(path)],
            EventKind::Remove(_) => vec![FsEvent::Deleted(path)],
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                if event.paths.len() >= 2 {
                    vec![FsEvent::Moved {
                        from: event.paths[0].clone(),
                        to: event.paths[1].clone(),
                    }]
                } else {
                    trace!("rename event with a single path: {}", path.display());
                    vec![]
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                self.pending_rename_from.push_back((path, Instant::now()));
                vec![]
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                match self.pending_rename_from.pop_front() {
                    Some((from, _)) => vec![FsEvent::Moved { from, to: path }],
                    // A "to" with no "from" means the entry moved in from
                    // outside the watched tree.
                    None => vec![FsEvent::Created(path)],
                }
            }
            EventKind::Modify(ModifyKind::Name(_)) => {
                match self.pending_rename_from.pop_front() {
                    Some((from, _)) if from != path => vec![FsEvent::Moved { from, to: path }],
                    Some(pending) => {
                        self.pending_rename_from.push_front(pending);
                        vec![]
                    }
                    None => {
                        trace!("unpaired rename half: {}", path.display());
                        vec![]
                    }
                }
            }
            EventKind::Modify(_) => {
                trace!("ignoring modify event: {}", path.display());
                vec![]
            }
            _ => vec![],
        }
    }

    /// Evict rename halves that never found a partner.
    ///
    /// Call this periodically; each evicted path becomes a deletion, since
    /// its destination lies outside the watched tree.
    pub fn tick(&mut self) -> Vec<FsEvent> {
        let mut events = Vec::new();

        while let Some((path, seen_at)) = self.pending_rename_from.front() {
            if seen_at.elapsed() <= self.rename_timeout {
                break;
            }
            trace!("evicting dangling rename-from: {}", path.display());
            let (path, _) = self
                .pending_rename_from
                .pop_front()
                .expect("front checked above");
            events.push(FsEvent::Deleted(path));
        }

        events
    }

    /// Drop any buffered state.
    pub fn reset(&mut self) {
        self.pending_rename_from.clear();
    }
}

impl Default for EventNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn is_junk(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name == ".DS_Store")
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, RemoveKind};
    use std::path::PathBuf;

    fn create_event(path: &str) -> Event {
        Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from(path))
    }

    #[test]
    fn create_maps_to_created() {
        let mut normalizer = EventNormalizer::new();
        let events = normalizer.process(&create_event("/tree/file.txt"));
        assert_eq!(events, vec![FsEvent::Created(PathBuf::from("/tree/file.txt"))]);
    }

    #[test]
    fn remove_maps_to_deleted() {
        let mut normalizer = EventNormalizer::new();
        let event =
            Event::new(EventKind::Remove(RemoveKind::File)).add_path(PathBuf::from("/tree/gone"));
        assert_eq!(
            normalizer.process(&event),
            vec![FsEvent::Deleted(PathBuf::from("/tree/gone"))]
        );
    }

    #[test]
    fn rename_both_maps_to_moved() {
        let mut normalizer = EventNormalizer::new();
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/tree/old.txt"))
            .add_path(PathBuf::from("/tree/new.txt"));

        assert_eq!(
            normalizer.process(&event),
            vec![FsEvent::Moved {
                from: PathBuf::from("/tree/old.txt"),
                to: PathBuf::from("/tree/new.txt"),
            }]
        );
    }

    #[test]
    fn split_rename_is_paired() {
        let mut normalizer = EventNormalizer::new();

        let from = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From)))
            .add_path(PathBuf::from("/tree/a"));
        assert!(normalizer.process(&from).is_empty());

        let to = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
            .add_path(PathBuf::from("/tree/b"));
        assert_eq!(
            normalizer.process(&to),
            vec![FsEvent::Moved {
                from: PathBuf::from("/tree/a"),
                to: PathBuf::from("/tree/b"),
            }]
        );
    }

    #[test]
    fn rename_to_without_from_is_created() {
        let mut normalizer = EventNormalizer::new();
        let to = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
            .add_path(PathBuf::from("/tree/incoming"));
        assert_eq!(
            normalizer.process(&to),
            vec![FsEvent::Created(PathBuf::from("/tree/incoming"))]
        );
    }

    #[test]
    fn dangling_rename_from_evicts_as_deleted() {
        let mut normalizer = EventNormalizer::with_timeout(Duration::from_millis(0));

        let from = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From)))
            .add_path(PathBuf::from("/tree/leaving"));
        assert!(normalizer.process(&from).is_empty());

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(
            normalizer.tick(),
            vec![FsEvent::Deleted(PathBuf::from("/tree/leaving"))]
        );
        assert!(normalizer.tick().is_empty());
    }

    #[test]
    fn data_modify_is_ignored() {
        let mut normalizer = EventNormalizer::new();
        let event = Event::new(EventKind::Modify(ModifyKind::Data(
            notify::event::DataChange::Content,
        )))
        .add_path(PathBuf::from("/tree/file.txt"));
        assert!(normalizer.process(&event).is_empty());
    }

    #[test]
    fn junk_paths_are_filtered() {
        let mut normalizer = EventNormalizer::new();
        let events = normalizer.process(&create_event("/tree/.DS_Store"));
        assert!(events.is_empty());
    }
}
