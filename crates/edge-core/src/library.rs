use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::index::SnippetIndex;
use crate::models::{KnownLanguages, Snippet, WorkspaceFolder, WorkspaceId};
use crate::parser::parse_file;
use crate::workspace::WorkspaceFolders;

/// The snippet index together with what is needed to fill it.
///
/// Meant to be shared through `Rc` on a single-threaded executor. Borrows of
/// the inner cells never outlive a method call, so lookups may run while a
/// reload is suspended on its file read.
///
/// Every reload or purge of a path bumps that path's generation. A reload
/// only installs its records if no newer reload or purge of the same path
/// started while it was reading, and only while the owning workspace is
/// still open.
#[derive(Debug, Default)]
pub struct SnippetLibrary {
    index: RefCell<SnippetIndex>,
    folders: RefCell<WorkspaceFolders>,
    generations: RefCell<HashMap<PathBuf, u64>>,
    known: KnownLanguages,
}

impl SnippetLibrary {
    pub fn new(known: KnownLanguages) -> Self {
        Self {
            index: RefCell::new(SnippetIndex::new()),
            folders: RefCell::new(WorkspaceFolders::default()),
            generations: RefCell::new(HashMap::new()),
            known,
        }
    }

    pub fn known_languages(&self) -> &KnownLanguages {
        &self.known
    }

    /// Re-parse `path` and swap its snippets into the index in one step.
    ///
    /// Returns how many snippets were installed; a superseded reload
    /// installs none.
    pub async fn reload(&self, path: &Path) -> usize {
        let generation = self.next_generation(path);
        let workspace = self.workspace_for(path);
        let snippets = parse_file(path, &self.known, workspace.as_ref()).await;
        self.install(path, generation, workspace.as_ref(), snippets)
    }

    fn next_generation(&self, path: &Path) -> u64 {
        let mut generations = self.generations.borrow_mut();
        let generation = generations.entry(path.to_path_buf()).or_insert(0);
        *generation += 1;
        *generation
    }

    fn install(
        &self,
        path: &Path,
        generation: u64,
        workspace: Option<&WorkspaceId>,
        snippets: Vec<Snippet>,
    ) -> usize {
        let current = self.generations.borrow().get(path).copied();
        if current != Some(generation) {
            debug!(file = %path.display(), "dropping superseded reload");
            return 0;
        }
        if let Some(workspace) = workspace {
            if self.folders.borrow().get(workspace).is_none() {
                debug!(
                    file = %path.display(),
                    workspace = %workspace,
                    "workspace closed during reload"
                );
                return 0;
            }
        }

        let count = snippets.len();
        self.index.borrow_mut().replace_file(path, snippets);
        debug!(file = %path.display(), snippets = count, "reloaded snippet file");
        count
    }

    pub fn purge_file(&self, path: &Path) -> usize {
        self.next_generation(path);
        let removed = self.index.borrow_mut().purge_by_file(path);
        debug!(file = %path.display(), removed, "purged snippet file");
        removed
    }

    pub fn purge_workspace(&self, workspace: &WorkspaceId) -> usize {
        let removed = self.index.borrow_mut().purge_by_workspace(workspace);
        debug!(workspace = %workspace, removed, "purged workspace snippets");
        removed
    }

    /// Owned copy of the candidates for `language`, in precedence order.
    pub fn lookup(&self, language: &str) -> Vec<Snippet> {
        self.index.borrow().lookup(language).cloned().collect()
    }

    /// Read-only view of the index.
    pub fn index(&self) -> Ref<'_, SnippetIndex> {
        self.index.borrow()
    }

    pub fn add_folder(&self, folder: WorkspaceFolder) -> bool {
        self.folders.borrow_mut().add(folder)
    }

    pub fn remove_folder(&self, workspace: &WorkspaceId) -> Option<WorkspaceFolder> {
        self.folders.borrow_mut().remove(workspace)
    }

    pub fn folders(&self) -> Vec<WorkspaceFolder> {
        self.folders.borrow().iter().cloned().collect()
    }

    /// The workspace owning `path`, if it lives inside an open folder.
    pub fn workspace_for(&self, path: &Path) -> Option<WorkspaceId> {
        self.folders
            .borrow()
            .folder_for(path)
            .map(|folder| folder.id.clone())
    }
}
