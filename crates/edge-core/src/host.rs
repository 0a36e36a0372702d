//! Capabilities the engine consumes from the host editor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{SNIPPET_SUGGESTIONS_KEY, SNIPPET_SUGGESTIONS_NONE};
use crate::error::Result;
use crate::models::{Position, Range, Selection, WorkspaceId};

/// One atomic edit inside a change notification.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TextChange {
    /// The replaced range, in coordinates before the edit. Empty for pure insertions.
    pub range: Range,
    pub text: String,
}

impl TextChange {
    pub fn insert(at: Position, text: impl Into<String>) -> Self {
        Self {
            range: Range::empty(at),
            text: text.into(),
        }
    }
}

/// A batch of edits delivered by the host after they were applied.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeEvent {
    pub changes: Vec<TextChange>,
}

/// The document and cursors of the active editor.
///
/// Selections are reported as they are after the notified change was
/// applied, so right after typing a space the caret sits behind it.
#[async_trait(?Send)]
pub trait Editor {
    fn language_id(&self) -> String;

    /// The project folder owning the document, if any.
    fn workspace(&self) -> Option<WorkspaceId>;

    fn selections(&self) -> Vec<Selection>;

    /// Range of the word touching `position`, following the host's word rules.
    fn word_range_at(&self, position: Position) -> Option<Range>;

    fn text_in(&self, range: Range) -> String;

    fn line_text(&self, line: usize) -> String;

    /// Replace every range with `body`, interpreted as snippet syntax, in one
    /// atomic edit.
    async fn insert_snippet(&self, body: &str, ranges: &[Range]) -> Result<()>;
}

/// Host key/value settings.
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Turn off the editor's own snippet suggestions so they do not compete with
/// expansion. Returns whether the setting changed.
pub fn disable_builtin_suggestions(store: &mut impl SettingsStore) -> Result<bool> {
    if store.get(SNIPPET_SUGGESTIONS_KEY).as_deref() == Some(SNIPPET_SUGGESTIONS_NONE) {
        return Ok(false);
    }

    store.set(SNIPPET_SUGGESTIONS_KEY, SNIPPET_SUGGESTIONS_NONE)?;
    info!("disabled built-in snippet suggestions");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn suggestions_are_disabled_once() {
        let mut settings = Settings::default();
        assert!(disable_builtin_suggestions(&mut settings).unwrap());
        assert_eq!(
            settings.get(SNIPPET_SUGGESTIONS_KEY).as_deref(),
            Some(SNIPPET_SUGGESTIONS_NONE)
        );
        assert!(!disable_builtin_suggestions(&mut settings).unwrap());
    }
}
