use std::cell::Cell;
#[cfg(feature = "selection-placeholder")]
use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, warn};

#[cfg(feature = "selection-placeholder")]
use crate::body::{dedent_selection, indentation, substitute_selection};
use crate::config::DELIMITER;
use crate::host::{ChangeEvent, Editor, TextChange};
use crate::library::SnippetLibrary;
use crate::matcher::find_snippet;
use crate::models::{Position, Range, Selection, Snippet, WorkspaceId};

/// Whether the coordinator is listening to edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    /// One of our own replacements is being applied; edits are ignored.
    Suppressed,
}

/// What a change notification led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionOutcome {
    /// Arrived while our own edit was in flight.
    Suppressed,
    /// No change in the batch was a lone delimiter keystroke.
    Ignored,
    /// No cursor had a word right before the delimiter.
    NoCandidates,
    NoMatch,
    Expanded { cursors: usize },
    /// The host rejected the replacement.
    Failed,
}

/// A word right before a freshly typed delimiter.
#[derive(Debug, Clone)]
struct Candidate {
    /// Index of the cursor in the host's selection list.
    index: usize,
    word: String,
    /// The word plus the delimiter.
    span: Range,
}

/// Holds the suppression flag up for as long as it lives.
struct SuppressionGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> SuppressionGuard<'a> {
    fn engage(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self { flag }
    }
}

impl Drop for SuppressionGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

fn is_trigger_keystroke(change: &TextChange) -> bool {
    let mut chars = change.text.chars();
    change.range.is_empty() && chars.next() == Some(DELIMITER) && chars.next().is_none()
}

/// Reacts to buffer edits and expands triggers typed before a space.
///
/// One coordinator serves one editor session on a single-threaded executor.
/// Its suppression flag is raised for the whole duration of every
/// replacement it issues and dropped on every exit path, so notifications
/// caused by its own writes never trigger a nested expansion.
pub struct ExpansionCoordinator {
    library: Rc<SnippetLibrary>,
    suppressed: Cell<bool>,
    #[cfg(feature = "selection-placeholder")]
    last_selected: RefCell<Vec<Option<String>>>,
}

impl ExpansionCoordinator {
    pub fn new(library: Rc<SnippetLibrary>) -> Self {
        Self {
            library,
            suppressed: Cell::new(false),
            #[cfg(feature = "selection-placeholder")]
            last_selected: RefCell::new(Vec::new()),
        }
    }

    pub fn library(&self) -> &Rc<SnippetLibrary> {
        &self.library
    }

    pub fn state(&self) -> CoordinatorState {
        if self.suppressed.get() {
            CoordinatorState::Suppressed
        } else {
            CoordinatorState::Idle
        }
    }

    /// Remember the non-empty selections so a later expansion can
    /// interpolate them. Empty selections leave earlier captures alone.
    pub fn on_selection_changed<E: Editor + ?Sized>(&self, editor: &E, selections: &[Selection]) {
        if self.suppressed.get() {
            return;
        }

        #[cfg(feature = "selection-placeholder")]
        {
            let mut captured = self.last_selected.borrow_mut();
            for (index, selection) in selections.iter().enumerate() {
                if selection.is_empty() {
                    continue;
                }

                let range = selection.range();
                let line = editor.line_text(range.start.line);
                let text = dedent_selection(&editor.text_in(range), indentation(&line));
                if text.is_empty() {
                    continue;
                }

                if captured.len() <= index {
                    captured.resize(index + 1, None);
                }
                captured[index] = Some(text);
            }
        }

        #[cfg(not(feature = "selection-placeholder"))]
        let _ = (editor, selections);
    }

    /// The captured selection for every cursor index.
    #[cfg(feature = "selection-placeholder")]
    pub fn last_selected_text(&self) -> Vec<Option<String>> {
        self.last_selected.borrow().clone()
    }

    fn captured(&self, index: usize) -> Option<String> {
        #[cfg(feature = "selection-placeholder")]
        {
            self.last_selected.borrow().get(index).cloned().flatten()
        }

        #[cfg(not(feature = "selection-placeholder"))]
        {
            let _ = index;
            None
        }
    }

    fn clear_captured(&self) {
        #[cfg(feature = "selection-placeholder")]
        self.last_selected.borrow_mut().clear();
    }

    fn body_for(&self, snippet: &Snippet, index: usize) -> String {
        #[cfg(feature = "selection-placeholder")]
        {
            if let Some(text) = self.captured(index) {
                return substitute_selection(&snippet.body, &text);
            }
        }

        #[cfg(not(feature = "selection-placeholder"))]
        let _ = index;

        snippet.body.clone()
    }

    /// Handle a change notification from the host.
    pub async fn on_buffer_edited<E: Editor + ?Sized>(
        &self,
        editor: &E,
        event: &ChangeEvent,
    ) -> ExpansionOutcome {
        if self.suppressed.get() {
            return ExpansionOutcome::Suppressed;
        }

        // One cycle per notification keeps a single undo step per keystroke.
        if !event.changes.iter().any(is_trigger_keystroke) {
            return ExpansionOutcome::Ignored;
        }

        let candidates = self.candidates(editor);
        if candidates.is_empty() {
            return ExpansionOutcome::NoCandidates;
        }

        let snippets = self.library.lookup(&editor.language_id());
        if snippets.is_empty() {
            return ExpansionOutcome::NoMatch;
        }

        let workspace = editor.workspace();
        let first = &candidates[0];
        let first_captured = self.captured(first.index);
        let uniform = candidates
            .iter()
            .all(|c| c.word == first.word && self.captured(c.index) == first_captured);

        let outcome = if uniform {
            self.expand_together(editor, &snippets, workspace.as_ref(), &candidates)
                .await
        } else {
            self.expand_each(editor, &snippets, workspace.as_ref(), candidates)
                .await
        };

        if matches!(outcome, ExpansionOutcome::Expanded { .. } | ExpansionOutcome::Failed) {
            self.clear_captured();
        }
        outcome
    }

    fn candidates<E: Editor + ?Sized>(&self, editor: &E) -> Vec<Candidate> {
        editor
            .selections()
            .iter()
            .enumerate()
            .filter_map(|(index, selection)| {
                if !selection.is_empty() || selection.active.character == 0 {
                    return None;
                }

                let caret = selection.active;
                let delimiter = Position::new(caret.line, caret.character - 1);
                let typed = editor.text_in(Range::new(delimiter, caret));
                let mut chars = typed.chars();
                if chars.next() != Some(DELIMITER) || chars.next().is_some() {
                    return None;
                }

                let word_range = editor.word_range_at(delimiter)?;
                if word_range.end != delimiter {
                    return None;
                }

                let word = editor.text_in(word_range);
                if word.is_empty() {
                    return None;
                }

                Some(Candidate {
                    index,
                    word,
                    span: Range::new(word_range.start, caret),
                })
            })
            .collect()
    }

    /// Every cursor typed the same trigger: one replacement call for all spans.
    async fn expand_together<E: Editor + ?Sized>(
        &self,
        editor: &E,
        snippets: &[Snippet],
        workspace: Option<&WorkspaceId>,
        candidates: &[Candidate],
    ) -> ExpansionOutcome {
        let first = &candidates[0];
        let Some(snippet) = find_snippet(snippets, &first.word, workspace) else {
            return ExpansionOutcome::NoMatch;
        };

        let body = self.body_for(snippet, first.index);
        let spans: Vec<Range> = candidates.iter().map(|c| c.span).collect();
        debug!(word = %first.word, cursors = spans.len(), "expanding snippet");

        let _guard = SuppressionGuard::engage(&self.suppressed);
        match editor.insert_snippet(&body, &spans).await {
            Ok(()) => ExpansionOutcome::Expanded {
                cursors: spans.len(),
            },
            Err(e) => {
                warn!("failed to expand '{}': {}", first.word, e);
                ExpansionOutcome::Failed
            }
        }
    }

    /// Cursors typed different triggers: replace them one by one, bottom-most
    /// first so pending spans keep their offsets.
    async fn expand_each<E: Editor + ?Sized>(
        &self,
        editor: &E,
        snippets: &[Snippet],
        workspace: Option<&WorkspaceId>,
        mut candidates: Vec<Candidate>,
    ) -> ExpansionOutcome {
        candidates.sort_by(|a, b| b.span.start.cmp(&a.span.start));

        let plan: Vec<(Range, String, &str)> = candidates
            .iter()
            .filter_map(|c| {
                let snippet = find_snippet(snippets, &c.word, workspace)?;
                Some((c.span, self.body_for(snippet, c.index), c.word.as_str()))
            })
            .collect();

        if plan.is_empty() {
            return ExpansionOutcome::NoMatch;
        }

        let _guard = SuppressionGuard::engage(&self.suppressed);
        for (span, body, word) in &plan {
            debug!(word = %word, at = %span.start, "expanding snippet");
            if let Err(e) = editor.insert_snippet(body, &[*span]).await {
                warn!("failed to expand '{}': {}", word, e);
                return ExpansionOutcome::Failed;
            }
        }

        ExpansionOutcome::Expanded {
            cursors: plan.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_a_lone_delimiter_insert_triggers() {
        let at = Position::new(0, 2);
        assert!(is_trigger_keystroke(&TextChange::insert(at, " ")));
        assert!(!is_trigger_keystroke(&TextChange::insert(at, "  ")));
        assert!(!is_trigger_keystroke(&TextChange::insert(at, "\n")));
        assert!(!is_trigger_keystroke(&TextChange {
            range: Range::new(at, Position::new(0, 4)),
            text: " ".to_string(),
        }));
    }

    #[test]
    fn guard_resets_flag_when_dropped() {
        let flag = Cell::new(false);
        {
            let _guard = SuppressionGuard::engage(&flag);
            assert!(flag.get());
        }
        assert!(!flag.get());
    }
}
