use std::path::Path;

use crate::models::{WorkspaceFolder, WorkspaceId};

/// The project folders currently open in the host.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceFolders {
    folders: Vec<WorkspaceFolder>,
}

impl WorkspaceFolders {
    pub fn new(folders: impl IntoIterator<Item = WorkspaceFolder>) -> Self {
        let mut this = Self::default();
        for folder in folders {
            this.add(folder);
        }
        this
    }

    /// Register a folder. Returns false when a folder with the same id is already open.
    pub fn add(&mut self, folder: WorkspaceFolder) -> bool {
        if self.get(&folder.id).is_some() {
            return false;
        }
        self.folders.push(folder);
        true
    }

    pub fn remove(&mut self, id: &WorkspaceId) -> Option<WorkspaceFolder> {
        let index = self.folders.iter().position(|folder| &folder.id == id)?;
        Some(self.folders.remove(index))
    }

    pub fn get(&self, id: &WorkspaceId) -> Option<&WorkspaceFolder> {
        self.folders.iter().find(|folder| &folder.id == id)
    }

    /// The folder owning `path`; the deepest root wins for nested folders.
    pub fn folder_for(&self, path: &Path) -> Option<&WorkspaceFolder> {
        self.folders
            .iter()
            .filter(|folder| folder.contains(path))
            .max_by_key(|folder| folder.root.components().count())
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkspaceFolder> {
        self.folders.iter()
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}
