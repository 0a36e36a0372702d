//! [`FileWatcher`] backed by the `notify` crate.
//!
//! Events are delivered on a tokio channel so the single-threaded event loop
//! can feed them to [`crate::sources::SnippetSources`].

use std::path::{Path, PathBuf};

use globset::GlobMatcher;
use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error};

use crate::error::{EdgeError, Result};
use crate::sources::{file_pattern, FileEvent, FileEventKind, FileWatcher, WatchHandle};

/// Watches directories and forwards matching file events.
#[derive(Debug, Clone)]
pub struct NotifyWatcher {
    events: UnboundedSender<FileEvent>,
}

impl NotifyWatcher {
    pub fn new(events: UnboundedSender<FileEvent>) -> Self {
        Self { events }
    }

    /// A watcher plus the receiving end of its events.
    pub fn channel() -> (Self, UnboundedReceiver<FileEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self::new(tx), rx)
    }
}

pub struct NotifyHandle {
    watcher: RecommendedWatcher,
    dir: PathBuf,
}

impl WatchHandle for NotifyHandle {
    fn dispose(mut self) {
        if let Err(e) = self.watcher.unwatch(&self.dir) {
            debug!("failed to unwatch {}: {}", self.dir.display(), e);
        }
    }
}

impl FileWatcher for NotifyWatcher {
    type Handle = NotifyHandle;

    fn watch(&self, dir: &Path, pattern: &str) -> Result<NotifyHandle> {
        let matcher = file_pattern(pattern)?;
        let events = self.events.clone();

        let handler = move |res: notify::Result<notify::Event>| match res {
            Ok(event) => forward(&event, &matcher, &events),
            Err(e) => error!("file watcher error: {}", e),
        };
        let mut watcher = notify::recommended_watcher(handler)
            .map_err(|e| EdgeError::Watch(format!("{}: {}", dir.display(), e)))?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| EdgeError::Watch(format!("{}: {}", dir.display(), e)))?;
        debug!(dir = %dir.display(), pattern, "watching");

        Ok(NotifyHandle {
            watcher,
            dir: dir.to_path_buf(),
        })
    }
}

fn forward(event: &notify::Event, matcher: &GlobMatcher, events: &UnboundedSender<FileEvent>) {
    for path in &event.paths {
        if !path.file_name().is_some_and(|name| matcher.is_match(name)) {
            continue;
        }
        let Some(kind) = classify_event(&event.kind, path) else {
            continue;
        };
        // The receiver is gone once the event loop stops.
        let _ = events.send(FileEvent::new(kind, path.clone()));
    }
}

/// Map a notify event onto create/change/delete.
///
/// Renames report the path on both sides, so the outcome depends on whether
/// the path still exists.
fn classify_event(kind: &EventKind, path: &Path) -> Option<FileEventKind> {
    match kind {
        EventKind::Create(_) => Some(FileEventKind::Created),
        EventKind::Remove(_) => Some(FileEventKind::Deleted),
        EventKind::Modify(ModifyKind::Name(_)) => Some(if path.exists() {
            FileEventKind::Changed
        } else {
            FileEventKind::Deleted
        }),
        EventKind::Modify(_) => Some(FileEventKind::Changed),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind, RenameMode};

    #[test]
    fn renames_depend_on_existence() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("rust.json");
        std::fs::write(&present, "{}").unwrap();
        let gone = dir.path().join("gone.json");
        let rename = EventKind::Modify(ModifyKind::Name(RenameMode::Any));

        assert_eq!(classify_event(&rename, &present), Some(FileEventKind::Changed));
        assert_eq!(classify_event(&rename, &gone), Some(FileEventKind::Deleted));
    }

    #[test]
    fn lifecycle_events_map_directly() {
        let path = Path::new("x.json");
        assert_eq!(
            classify_event(&EventKind::Create(CreateKind::File), path),
            Some(FileEventKind::Created)
        );
        assert_eq!(
            classify_event(&EventKind::Modify(ModifyKind::Data(DataChange::Content)), path),
            Some(FileEventKind::Changed)
        );
        assert_eq!(
            classify_event(&EventKind::Remove(RemoveKind::File), path),
            Some(FileEventKind::Deleted)
        );
        assert_eq!(classify_event(&EventKind::Any, path), None);
    }

    #[test]
    fn only_matching_names_are_forwarded() {
        let (tx, mut rx) = unbounded_channel();
        let matcher = file_pattern("*.code-snippets").unwrap();
        let event = notify::Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(PathBuf::from("/p/.vscode/a.code-snippets"))
            .add_path(PathBuf::from("/p/.vscode/settings.json"));

        forward(&event, &matcher, &tx);

        assert_eq!(
            rx.try_recv().unwrap(),
            FileEvent::new(FileEventKind::Deleted, "/p/.vscode/a.code-snippets")
        );
        assert!(rx.try_recv().is_err());
    }
}
