use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Language scope matching every document.
pub const ANY_LANGUAGE: &str = "*";

/// Identifier of an open project folder.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An open project folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceFolder {
    pub id: WorkspaceId,
    pub root: PathBuf,
}

impl WorkspaceFolder {
    pub fn new(id: WorkspaceId, root: impl Into<PathBuf>) -> Self {
        Self {
            id,
            root: root.into(),
        }
    }

    /// Build a folder whose identifier is its root path.
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let id = WorkspaceId::new(root.to_string_lossy());
        Self { id, root }
    }

    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }
}

/// Language identifiers the host knows about.
#[derive(Debug, Clone, Default)]
pub struct KnownLanguages(HashSet<String>);

impl KnownLanguages {
    pub fn contains(&self, language: &str) -> bool {
        self.0.contains(language)
    }

    /// True for `"*"` and for every known identifier.
    pub fn accepts(&self, language: &str) -> bool {
        language == ANY_LANGUAGE || self.contains(language)
    }

    pub fn insert(&mut self, language: impl Into<String>) {
        self.0.insert(language.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for KnownLanguages {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// A single expansion rule.
#[derive(Debug, Clone)]
pub struct Snippet {
    pub language: String,
    pub prefix: String,
    pub trigger: Regex,
    pub body: String,
    pub source_file: PathBuf,
    pub source_workspace: Option<WorkspaceId>,
}

impl Snippet {
    pub fn new(
        language: impl Into<String>,
        prefix: impl Into<String>,
        body: impl Into<String>,
        source_file: impl Into<PathBuf>,
        source_workspace: Option<WorkspaceId>,
    ) -> Result<Self> {
        let prefix = prefix.into();
        let trigger = trigger_pattern(&prefix)?;
        Ok(Self {
            language: language.into(),
            prefix,
            trigger,
            body: body.into(),
            source_file: source_file.into(),
            source_workspace,
        })
    }

    /// Project-scoped snippets only apply inside their own workspace.
    pub fn is_project_scoped(&self) -> bool {
        self.source_workspace.is_some()
    }

    pub fn matches(&self, word: &str) -> bool {
        self.trigger.is_match(word)
    }

    pub fn is_visible_in(&self, workspace: Option<&WorkspaceId>) -> bool {
        match &self.source_workspace {
            None => true,
            Some(owner) => Some(owner) == workspace,
        }
    }
}

impl PartialEq for Snippet {
    fn eq(&self, other: &Self) -> bool {
        self.language == other.language
            && self.prefix == other.prefix
            && self.trigger.as_str() == other.trigger.as_str()
            && self.body == other.body
            && self.source_file == other.source_file
            && self.source_workspace == other.source_workspace
    }
}

impl Eq for Snippet {}

/// Compile the end-anchored trigger for a literal prefix.
///
/// The prefix must sit at the end of the word and be preceded by the start of
/// the text or a character outside `[A-Za-z0-9_]`.
pub fn trigger_pattern(prefix: &str) -> Result<Regex> {
    let pattern = format!("(?:^|[^A-Za-z0-9_]){}$", regex::escape(prefix));
    Ok(Regex::new(&pattern)?)
}

/// Zero-based line and character (Unicode scalar) offset in a document.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub character: usize,
}

impl Position {
    pub fn new(line: usize, character: usize) -> Self {
        Self { line, character }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.character)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    pub fn empty(at: Position) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A cursor with an optional selection; `active` is where the caret sits.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub anchor: Position,
    pub active: Position,
}

impl Selection {
    pub fn new(anchor: Position, active: Position) -> Self {
        Self { anchor, active }
    }

    pub fn cursor(at: Position) -> Self {
        Self {
            anchor: at,
            active: at,
        }
    }

    pub fn range(&self) -> Range {
        Range::new(self.anchor, self.active)
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.active
    }
}
