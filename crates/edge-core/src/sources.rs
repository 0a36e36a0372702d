//! Keeps the snippet library in step with the definition files on disk.
//!
//! [`SnippetSources`] performs the startup scan of the global snippets
//! directory and of every open project's `.vscode` directory, then turns file
//! lifecycle events and workspace folder changes into library updates. The
//! file watching itself is a host capability behind [`FileWatcher`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use globset::{Glob, GlobMatcher};
use tracing::{debug, info, warn};

use crate::config::{project_snippets_dir, BUNDLE_EXTENSION};
use crate::error::{EdgeError, Result};
use crate::library::SnippetLibrary;
use crate::models::{WorkspaceFolder, WorkspaceId};

/// Pattern for files in the global snippets directory.
pub const GLOBAL_PATTERN: &str = "*";

/// Pattern for project-scoped snippet files.
pub fn project_pattern() -> String {
    format!("*.{}", BUNDLE_EXTENSION)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    Created,
    Changed,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub kind: FileEventKind,
    pub path: PathBuf,
}

impl FileEvent {
    pub fn new(kind: FileEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Folders opened and closed in the host.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceChange {
    pub added: Vec<WorkspaceFolder>,
    pub removed: Vec<WorkspaceId>,
}

/// A live watch. Disposing it stops further events.
pub trait WatchHandle {
    fn dispose(self);
}

/// Host capability: report create/change/delete of files in a directory.
pub trait FileWatcher {
    type Handle: WatchHandle;

    /// Watch the files directly inside `dir` whose names match `pattern`.
    fn watch(&self, dir: &Path, pattern: &str) -> Result<Self::Handle>;
}

/// A watcher that never reports anything, for one-shot loads.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullWatcher;

impl WatchHandle for () {
    fn dispose(self) {}
}

impl FileWatcher for NullWatcher {
    type Handle = ();

    fn watch(&self, _dir: &Path, _pattern: &str) -> Result<()> {
        Ok(())
    }
}

/// Compile a file-name glob.
pub fn file_pattern(pattern: &str) -> Result<GlobMatcher> {
    Glob::new(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|e| EdgeError::InvalidConfig(format!("invalid file pattern '{}': {}", pattern, e)))
}

/// Files directly inside `dir` whose names match `pattern`, sorted by path.
///
/// A missing directory has no files.
pub async fn matching_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = file_pattern(pattern)?;
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(EdgeError::io(dir, e)),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| EdgeError::io(dir, e))? {
        let path = entry.path();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file && path.file_name().is_some_and(|name| matcher.is_match(name)) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// A watch on a snippets directory.
enum DirWatch<H> {
    /// The directory exists and is watched directly.
    Active(H),
    /// The directory does not exist yet; its parent is watched until it
    /// appears.
    Waiting { dir: PathBuf, handle: H },
}

impl<H: WatchHandle> DirWatch<H> {
    fn waits_for(&self, path: &Path) -> bool {
        matches!(self, DirWatch::Waiting { dir, .. } if dir == path)
    }

    fn dispose(self) {
        match self {
            DirWatch::Active(handle) | DirWatch::Waiting { handle, .. } => handle.dispose(),
        }
    }
}

/// Who a watched directory belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Owner {
    Global,
    Project(WorkspaceId),
}

/// Bridges file-system and workspace events to the snippet library.
pub struct SnippetSources<W: FileWatcher> {
    library: Rc<SnippetLibrary>,
    watcher: W,
    global_dir: PathBuf,
    global_watch: Option<DirWatch<W::Handle>>,
    project_watches: HashMap<WorkspaceId, DirWatch<W::Handle>>,
}

impl<W: FileWatcher> SnippetSources<W> {
    pub fn new(library: Rc<SnippetLibrary>, watcher: W, global_dir: impl Into<PathBuf>) -> Self {
        Self {
            library,
            watcher,
            global_dir: global_dir.into(),
            global_watch: None,
            project_watches: HashMap::new(),
        }
    }

    pub fn library(&self) -> &Rc<SnippetLibrary> {
        &self.library
    }

    pub fn global_dir(&self) -> &Path {
        &self.global_dir
    }

    /// Load the global snippets, start watching them, then open `folders`.
    pub async fn activate(&mut self, folders: Vec<WorkspaceFolder>) -> Result<()> {
        let files = self.load_dir(&self.global_dir.clone(), GLOBAL_PATTERN).await?;
        info!(
            dir = %self.global_dir.display(),
            files,
            "loaded global snippets"
        );

        if self.global_watch.is_none() {
            match self.start_watch(&self.global_dir, GLOBAL_PATTERN) {
                Ok(watch) => self.global_watch = Some(watch),
                Err(e) => warn!("global snippets will not reload: {}", e),
            }
        }

        self.on_workspace_folders_changed(WorkspaceChange {
            added: folders,
            removed: Vec::new(),
        })
        .await;
        Ok(())
    }

    /// A watched file or directory was created, changed or deleted.
    pub async fn on_definition_file_changed(&mut self, event: FileEvent) {
        if event.kind != FileEventKind::Deleted {
            if let Some(owner) = self.waiting_owner(&event.path) {
                self.directory_appeared(owner, &event.path).await;
                return;
            }
        }

        match event.kind {
            FileEventKind::Created | FileEventKind::Changed => {
                self.library.reload(&event.path).await;
            }
            FileEventKind::Deleted => {
                self.library.purge_file(&event.path);
            }
        }
    }

    /// Project folders were opened or closed.
    pub async fn on_workspace_folders_changed(&mut self, change: WorkspaceChange) {
        for folder in change.added {
            self.library.add_folder(folder.clone());

            let dir = project_snippets_dir(&folder.root);
            match self.load_dir(&dir, &project_pattern()).await {
                Ok(files) => debug!(workspace = %folder.id, files, "loaded project snippets"),
                Err(e) => warn!("failed to scan {}: {}", dir.display(), e),
            }

            if self.project_watches.contains_key(&folder.id) {
                continue;
            }
            match self.start_watch(&dir, &project_pattern()) {
                Ok(watch) => {
                    self.project_watches.insert(folder.id.clone(), watch);
                }
                Err(e) => warn!(workspace = %folder.id, "project snippets will not reload: {}", e),
            }
        }

        for id in change.removed {
            if let Some(watch) = self.project_watches.remove(&id) {
                watch.dispose();
            }
            self.library.remove_folder(&id);
            self.library.purge_workspace(&id);
        }
    }

    /// Workspaces whose project snippets are being watched, sorted.
    pub fn watched_workspaces(&self) -> Vec<WorkspaceId> {
        let mut ids: Vec<WorkspaceId> = self.project_watches.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Stop every watch.
    pub fn shutdown(&mut self) {
        if let Some(watch) = self.global_watch.take() {
            watch.dispose();
        }
        for (_, watch) in self.project_watches.drain() {
            watch.dispose();
        }
    }

    /// Reload every matching file in `dir`. Returns how many were read.
    async fn load_dir(&self, dir: &Path, pattern: &str) -> Result<usize> {
        let files = matching_files(dir, pattern).await?;
        for path in &files {
            self.library.reload(path).await;
        }
        Ok(files.len())
    }

    /// Watch `dir`, or its parent for `dir` to appear when it is missing.
    fn start_watch(&self, dir: &Path, pattern: &str) -> Result<DirWatch<W::Handle>> {
        if dir.is_dir() {
            return self.watcher.watch(dir, pattern).map(DirWatch::Active);
        }

        let (Some(parent), Some(name)) = (dir.parent(), dir.file_name()) else {
            return Err(EdgeError::Watch(dir.display().to_string()));
        };
        let handle = self
            .watcher
            .watch(parent, &globset::escape(&name.to_string_lossy()))?;
        debug!(dir = %dir.display(), "waiting for snippets directory");
        Ok(DirWatch::Waiting {
            dir: dir.to_path_buf(),
            handle,
        })
    }

    fn waiting_owner(&self, path: &Path) -> Option<Owner> {
        if self.global_watch.as_ref().is_some_and(|w| w.waits_for(path)) {
            return Some(Owner::Global);
        }
        self.project_watches
            .iter()
            .find(|(_, watch)| watch.waits_for(path))
            .map(|(id, _)| Owner::Project(id.clone()))
    }

    /// A missing snippets directory was created: watch it and load it.
    async fn directory_appeared(&mut self, owner: Owner, dir: &Path) {
        let is_dir = tokio::fs::metadata(dir)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return;
        }

        let pattern = match owner {
            Owner::Global => GLOBAL_PATTERN.to_string(),
            Owner::Project(_) => project_pattern(),
        };
        let watch = match self.watcher.watch(dir, &pattern) {
            Ok(handle) => DirWatch::Active(handle),
            Err(e) => {
                warn!("failed to watch {}: {}", dir.display(), e);
                return;
            }
        };

        let previous = match &owner {
            Owner::Global => self.global_watch.replace(watch),
            Owner::Project(id) => self.project_watches.insert(id.clone(), watch),
        };
        if let Some(previous) = previous {
            previous.dispose();
        }

        // Files written before the new watch started are only seen by a scan.
        match self.load_dir(dir, &pattern).await {
            Ok(files) => info!(dir = %dir.display(), files, "snippets directory appeared"),
            Err(e) => warn!("failed to scan {}: {}", dir.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;

    #[test]
    fn patterns_match_file_names() {
        let bundle = file_pattern(&project_pattern()).unwrap();
        assert!(bundle.is_match("team.code-snippets"));
        assert!(!bundle.is_match("python.json"));
        assert!(file_pattern(GLOBAL_PATTERN).unwrap().is_match("python.json"));
    }

    #[tokio::test]
    async fn matching_files_skips_directories_and_other_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.code-snippets"), "{}").unwrap();
        fs::write(dir.path().join("a.code-snippets"), "{}").unwrap();
        fs::write(dir.path().join("rust.json"), "{}").unwrap();
        fs::create_dir(dir.path().join("c.code-snippets")).unwrap();

        let files = matching_files(dir.path(), &project_pattern()).await.unwrap();
        let names: Vec<_> = files.iter().map(|p| p.file_name().unwrap().to_owned()).collect();
        assert_eq!(names, vec!["a.code-snippets", "b.code-snippets"]);

        assert!(matching_files(&dir.path().join("missing"), "*").await.unwrap().is_empty());
    }

    #[derive(Clone, Default)]
    struct RecordingWatcher {
        log: Rc<RefCell<Vec<String>>>,
    }

    struct RecordingHandle {
        dir: PathBuf,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl WatchHandle for RecordingHandle {
        fn dispose(self) {
            self.log.borrow_mut().push(format!("dispose {}", self.dir.display()));
        }
    }

    impl FileWatcher for RecordingWatcher {
        type Handle = RecordingHandle;

        fn watch(&self, dir: &Path, pattern: &str) -> Result<RecordingHandle> {
            self.log.borrow_mut().push(format!("watch {} {}", dir.display(), pattern));
            Ok(RecordingHandle {
                dir: dir.to_path_buf(),
                log: Rc::clone(&self.log),
            })
        }
    }

    #[tokio::test]
    async fn removing_a_workspace_disposes_its_watch_and_snippets() {
        let root = tempfile::tempdir().unwrap();
        let global = root.path().join("global");
        let project = root.path().join("project");
        fs::create_dir_all(&global).unwrap();
        fs::create_dir_all(project.join(".vscode")).unwrap();
        fs::write(
            global.join("rust.json"),
            r#"{ "f": { "prefix": "fn", "body": "fn $1() {}" } }"#,
        )
        .unwrap();
        fs::write(
            project.join(".vscode").join("team.code-snippets"),
            r#"{ "f": { "prefix": "fn", "body": "pub fn $1() {}", "scope": "rust" } }"#,
        )
        .unwrap();

        let library = Rc::new(SnippetLibrary::new(["rust"].into_iter().collect()));
        let watcher = RecordingWatcher::default();
        let log = Rc::clone(&watcher.log);
        let mut sources = SnippetSources::new(Rc::clone(&library), watcher, &global);

        let folder = WorkspaceFolder::from_root(&project);
        sources.activate(vec![folder.clone()]).await.unwrap();

        assert_eq!(library.lookup("rust").len(), 2);
        assert!(library.lookup("rust")[0].is_project_scoped());
        assert_eq!(sources.watched_workspaces(), vec![folder.id.clone()]);

        sources
            .on_workspace_folders_changed(WorkspaceChange {
                added: Vec::new(),
                removed: vec![folder.id.clone()],
            })
            .await;

        let remaining = library.lookup("rust");
        assert_eq!(remaining.len(), 1);
        assert!(!remaining[0].is_project_scoped());
        assert!(sources.watched_workspaces().is_empty());
        assert!(library.folders().is_empty());

        let log = log.borrow();
        assert_eq!(log.len(), 3);
        assert!(log[0].starts_with("watch ") && log[0].ends_with(" *"));
        assert!(log[1].ends_with(" *.code-snippets"));
        assert!(log[2].starts_with("dispose "));
    }

    #[tokio::test]
    async fn file_events_reload_and_purge() {
        let dir = tempfile::tempdir().unwrap();
        let library = Rc::new(SnippetLibrary::new(["python"].into_iter().collect()));
        let mut sources = SnippetSources::new(Rc::clone(&library), NullWatcher, dir.path());
        sources.activate(Vec::new()).await.unwrap();
        assert!(library.index().is_empty());

        let file = dir.path().join("python.json");
        fs::write(&file, r#"{ "p": { "prefix": "pr", "body": "print($1)" } }"#).unwrap();
        sources
            .on_definition_file_changed(FileEvent::new(FileEventKind::Created, &file))
            .await;
        assert_eq!(library.lookup("python").len(), 1);

        sources
            .on_definition_file_changed(FileEvent::new(FileEventKind::Deleted, &file))
            .await;
        assert!(library.index().is_empty());
    }

    #[tokio::test]
    async fn missing_project_directory_is_loaded_once_created() {
        let root = tempfile::tempdir().unwrap();
        let global = root.path().join("global");
        let project = root.path().join("project");
        fs::create_dir_all(&global).unwrap();
        fs::create_dir_all(&project).unwrap();

        let library = Rc::new(SnippetLibrary::new(["rust"].into_iter().collect()));
        let watcher = RecordingWatcher::default();
        let log = Rc::clone(&watcher.log);
        let mut sources = SnippetSources::new(Rc::clone(&library), watcher, &global);

        let folder = WorkspaceFolder::from_root(&project);
        sources.activate(vec![folder.clone()]).await.unwrap();
        assert!(library.index().is_empty());
        assert_eq!(sources.watched_workspaces(), vec![folder.id.clone()]);
        assert_eq!(log.borrow()[1], format!("watch {} .vscode", project.display()));

        let snippets_dir = project.join(".vscode");
        fs::create_dir(&snippets_dir).unwrap();
        fs::write(
            snippets_dir.join("team.code-snippets"),
            r#"{ "f": { "prefix": "fn", "body": "pub fn $1() {}", "scope": "rust" } }"#,
        )
        .unwrap();
        sources
            .on_definition_file_changed(FileEvent::new(FileEventKind::Created, &snippets_dir))
            .await;

        let found = library.lookup("rust");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].source_workspace.as_ref(), Some(&folder.id));
        assert_eq!(
            log.borrow()[2..].to_vec(),
            vec![
                format!("watch {} *.code-snippets", snippets_dir.display()),
                format!("dispose {}", project.display()),
            ]
        );

        // Later events on the directory itself are ordinary file events again.
        sources
            .on_definition_file_changed(FileEvent::new(FileEventKind::Changed, &snippets_dir))
            .await;
        assert_eq!(log.borrow().len(), 4);
    }

    #[tokio::test]
    async fn missing_global_directory_is_loaded_once_created() {
        let root = tempfile::tempdir().unwrap();
        let global = root.path().join("snippets");

        let library = Rc::new(SnippetLibrary::new(["python"].into_iter().collect()));
        let watcher = RecordingWatcher::default();
        let log = Rc::clone(&watcher.log);
        let mut sources = SnippetSources::new(Rc::clone(&library), watcher, &global);
        sources.activate(Vec::new()).await.unwrap();
        assert_eq!(*log.borrow(), vec![format!("watch {} snippets", root.path().display())]);

        // A stray event for a name that is not a directory changes nothing.
        fs::write(&global, "").unwrap();
        sources
            .on_definition_file_changed(FileEvent::new(FileEventKind::Created, &global))
            .await;
        assert_eq!(log.borrow().len(), 1);
        fs::remove_file(&global).unwrap();

        fs::create_dir(&global).unwrap();
        fs::write(global.join("python.json"), r#"{ "p": { "prefix": "pr", "body": "print($1)" } }"#)
            .unwrap();
        sources
            .on_definition_file_changed(FileEvent::new(FileEventKind::Created, &global))
            .await;

        assert_eq!(library.lookup("python").len(), 1);
        assert_eq!(
            log.borrow()[1..].to_vec(),
            vec![
                format!("watch {} *", global.display()),
                format!("dispose {}", root.path().display()),
            ]
        );

        sources.shutdown();
        assert_eq!(log.borrow()[3], format!("dispose {}", global.display()));
    }
}
