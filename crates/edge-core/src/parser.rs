//! Snippet definition files.
//!
//! Two kinds of file are understood:
//!
//! - `<language>.json`: every entry applies to the language named by the file.
//! - `*.code-snippets`: every entry names its own languages through `scope`,
//!   a comma-separated list that defaults to `"*"`.
//!
//! Both are relaxed JSON (comments and trailing commas are allowed) shaped as
//! `{ "<name>": { "prefix": string|string[], "body": string|string[], "scope"?: string } }`.

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{BUNDLE_EXTENSION, LANGUAGE_EXTENSION};
use crate::error::{EdgeError, Result};
use crate::models::{KnownLanguages, Snippet, WorkspaceId, ANY_LANGUAGE};

/// What a file in a snippets directory contributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// A single-language file; the language comes from the file name.
    Language(String),
    /// A multi-scope bundle whose entries carry their own `scope`.
    Bundle,
    Ignored,
}

/// Decide how a path should be parsed without touching the file system.
pub fn classify(path: &Path, known: &KnownLanguages) -> SourceKind {
    let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
        return SourceKind::Ignored;
    };

    if extension == BUNDLE_EXTENSION {
        return SourceKind::Bundle;
    }

    if extension != LANGUAGE_EXTENSION {
        return SourceKind::Ignored;
    }

    match path.file_stem().and_then(|stem| stem.to_str()) {
        Some(stem) => {
            let language = stem.to_lowercase();
            if known.contains(&language) {
                SourceKind::Language(language)
            } else {
                SourceKind::Ignored
            }
        }
        None => SourceKind::Ignored,
    }
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

#[derive(Deserialize, Debug)]
struct RawDefinition {
    prefix: Option<OneOrMany>,
    body: Option<OneOrMany>,
    scope: Option<String>,
}

/// Split a `scope` value into language identifiers.
fn scope_languages(scope: Option<&str>) -> Vec<String> {
    let scope = match scope {
        Some(scope) if !scope.is_empty() => scope,
        _ => ANY_LANGUAGE,
    };

    scope
        .split(',')
        .map(str::trim)
        .filter(|language| !language.is_empty())
        .map(str::to_string)
        .collect()
}

/// Turn the text of a definition file into snippets.
///
/// Records come out in definition order, then prefix order, then scope order.
pub fn parse_definitions(
    text: &str,
    kind: &SourceKind,
    source_file: &Path,
    workspace: Option<&WorkspaceId>,
    known: &KnownLanguages,
) -> Result<Vec<Snippet>> {
    if *kind == SourceKind::Ignored {
        return Ok(Vec::new());
    }

    let definitions: IndexMap<String, RawDefinition> =
        json5::from_str(text).map_err(|e| EdgeError::Parse {
            path: source_file.to_path_buf(),
            message: e.to_string(),
        })?;

    let mut snippets = Vec::new();
    for (name, definition) in definitions {
        let (Some(prefix), Some(body)) = (definition.prefix, definition.body) else {
            debug!(
                name = %name,
                file = %source_file.display(),
                "skipping definition without prefix or body"
            );
            continue;
        };

        let body = body.into_vec().join("\n");
        let languages = match kind {
            SourceKind::Language(language) => vec![language.clone()],
            _ => scope_languages(definition.scope.as_deref()),
        };

        for prefix in prefix.into_vec() {
            for language in languages.iter().filter(|language| known.accepts(language)) {
                snippets.push(Snippet::new(
                    language.as_str(),
                    prefix.as_str(),
                    body.as_str(),
                    source_file,
                    workspace.cloned(),
                )?);
            }
        }
    }

    Ok(snippets)
}

/// Read and parse one definition file.
///
/// Never fails: an unreadable or malformed file is logged and contributes
/// no snippets.
pub async fn parse_file(
    path: &Path,
    known: &KnownLanguages,
    workspace: Option<&WorkspaceId>,
) -> Vec<Snippet> {
    let kind = classify(path, known);
    if kind == SourceKind::Ignored {
        debug!(file = %path.display(), "ignoring non-snippet file");
        return Vec::new();
    }

    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) => {
            warn!("{}", EdgeError::io(path, e));
            return Vec::new();
        }
    };

    match parse_definitions(&text, &kind, path, workspace, known) {
        Ok(snippets) => snippets,
        Err(e) => {
            warn!("{}", e);
            Vec::new()
        }
    }
}
