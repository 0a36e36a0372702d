use std::collections::HashMap;
use std::path::Path;

use crate::models::{Snippet, WorkspaceId, ANY_LANGUAGE};

/// Snippets grouped by language scope.
///
/// Every bucket keeps project-scoped snippets ahead of global ones; within a
/// scope tier snippets stay in the order they were added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnippetIndex {
    buckets: HashMap<String, Vec<Snippet>>,
}

impl SnippetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything attributed to `path` with `snippets`.
    pub fn replace_file(&mut self, path: &Path, snippets: Vec<Snippet>) {
        self.purge_by_file(path);

        for snippet in snippets {
            self.buckets
                .entry(snippet.language.clone())
                .or_default()
                .push(snippet);
        }

        // Stable sort: ties keep insertion order.
        for bucket in self.buckets.values_mut() {
            bucket.sort_by_key(|snippet| !snippet.is_project_scoped());
        }
    }

    /// Remove every snippet defined in `path`. Returns how many were removed.
    pub fn purge_by_file(&mut self, path: &Path) -> usize {
        self.purge(|snippet| snippet.source_file == path)
    }

    /// Remove every snippet owned by `workspace`. Returns how many were removed.
    pub fn purge_by_workspace(&mut self, workspace: &WorkspaceId) -> usize {
        self.purge(|snippet| snippet.source_workspace.as_ref() == Some(workspace))
    }

    fn purge(&mut self, doomed: impl Fn(&Snippet) -> bool) -> usize {
        let mut removed = 0;
        for bucket in self.buckets.values_mut() {
            let before = bucket.len();
            bucket.retain(|snippet| !doomed(snippet));
            removed += before - bucket.len();
        }
        self.buckets.retain(|_, bucket| !bucket.is_empty());
        removed
    }

    /// Snippets for `language` followed by the ones for every language.
    pub fn lookup<'a>(&'a self, language: &str) -> impl Iterator<Item = &'a Snippet> + 'a {
        let exact = if language == ANY_LANGUAGE {
            &[][..]
        } else {
            self.bucket(language)
        };
        exact.iter().chain(self.bucket(ANY_LANGUAGE))
    }

    pub fn bucket(&self, language: &str) -> &[Snippet] {
        self.buckets.get(language).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Languages with at least one snippet, sorted.
    pub fn languages(&self) -> Vec<&str> {
        let mut languages: Vec<&str> = self.buckets.keys().map(String::as_str).collect();
        languages.sort_unstable();
        languages
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn global(language: &str, prefix: &str, file: &str) -> Snippet {
        Snippet::new(language, prefix, format!("{prefix} from {file}"), file, None).unwrap()
    }

    fn local(language: &str, prefix: &str, file: &str, workspace: &str) -> Snippet {
        Snippet::new(
            language,
            prefix,
            format!("{prefix} from {file}"),
            file,
            Some(WorkspaceId::new(workspace)),
        )
        .unwrap()
    }

    fn bodies<'a>(snippets: impl Iterator<Item = &'a Snippet>) -> Vec<&'a str> {
        snippets.map(|snippet| snippet.body.as_str()).collect()
    }

    #[test]
    fn replacing_a_file_twice_is_idempotent() {
        let mut index = SnippetIndex::new();
        let file = Path::new("/g/rust.json");
        let snippets = vec![
            global("rust", "fn", "/g/rust.json"),
            global("rust", "st", "/g/rust.json"),
        ];

        index.replace_file(file, snippets.clone());
        let first = index.clone();
        index.replace_file(file, snippets);

        assert_eq!(index, first);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn project_snippets_sort_before_global_ones() {
        let mut index = SnippetIndex::new();
        index.replace_file(Path::new("/g/rust.json"), vec![global("rust", "fn", "/g/rust.json")]);
        index.replace_file(
            Path::new("/w/.vscode/a.code-snippets"),
            vec![
                local("rust", "fn", "/w/.vscode/a.code-snippets", "/w"),
                local("rust", "im", "/w/.vscode/a.code-snippets", "/w"),
            ],
        );
        index.replace_file(
            Path::new("/g/more.code-snippets"),
            vec![global("rust", "ma", "/g/more.code-snippets")],
        );

        assert_eq!(
            bodies(index.lookup("rust")),
            vec![
                "fn from /w/.vscode/a.code-snippets",
                "im from /w/.vscode/a.code-snippets",
                "fn from /g/rust.json",
                "ma from /g/more.code-snippets",
            ]
        );
    }

    #[test]
    fn wildcard_snippets_follow_exact_language() {
        let mut index = SnippetIndex::new();
        index.replace_file(
            Path::new("/g/all.code-snippets"),
            vec![global("*", "todo", "/g/all.code-snippets")],
        );
        index.replace_file(
            Path::new("/g/python.json"),
            vec![global("python", "pr", "/g/python.json")],
        );

        assert_eq!(
            bodies(index.lookup("python")),
            vec!["pr from /g/python.json", "todo from /g/all.code-snippets"]
        );
        assert_eq!(bodies(index.lookup("rust")), vec!["todo from /g/all.code-snippets"]);
        assert_eq!(bodies(index.lookup("*")), vec!["todo from /g/all.code-snippets"]);
    }

    #[test]
    fn purge_by_file_leaves_other_files_alone() {
        let mut index = SnippetIndex::new();
        for file in ["/g/a.code-snippets", "/g/b.code-snippets"] {
            index.replace_file(Path::new(file), vec![global("rust", "fn", file)]);
        }

        assert_eq!(index.purge_by_file(Path::new("/g/a.code-snippets")), 1);
        assert_eq!(bodies(index.lookup("rust")), vec!["fn from /g/b.code-snippets"]);
        assert_eq!(index.purge_by_file(Path::new("/g/a.code-snippets")), 0);
    }

    #[test]
    fn purge_by_workspace_drops_empty_buckets() {
        let mut index = SnippetIndex::new();
        index.replace_file(
            Path::new("/w/.vscode/a.code-snippets"),
            vec![local("go", "er", "/w/.vscode/a.code-snippets", "/w")],
        );
        index.replace_file(Path::new("/g/rust.json"), vec![global("rust", "fn", "/g/rust.json")]);

        assert_eq!(index.purge_by_workspace(&WorkspaceId::new("/w")), 1);
        assert_eq!(index.languages(), vec!["rust"]);
    }

    #[test]
    fn reparse_with_fewer_snippets_removes_stale_entries() {
        let mut index = SnippetIndex::new();
        let file = Path::new("/g/x.code-snippets");
        index.replace_file(
            file,
            vec![
                global("rust", "a", "/g/x.code-snippets"),
                global("go", "b", "/g/x.code-snippets"),
            ],
        );
        index.replace_file(file, vec![global("rust", "a", "/g/x.code-snippets")]);

        assert_eq!(index.len(), 1);
        assert_eq!(index.languages(), vec!["rust"]);
    }
}
