//! An in-memory document implementing [`Editor`].
//!
//! Backs the command-line `expand` command and the expansion tests. Snippet
//! bodies are rendered with [`crate::body::render`], and each inserted
//! snippet leaves a caret at its first tab stop.

use std::cell::{Cell, RefCell};

use async_trait::async_trait;
use ropey::Rope;
use unicode_segmentation::UnicodeSegmentation;

use crate::body::render;
use crate::error::{EdgeError, Result};
use crate::host::{ChangeEvent, Editor, TextChange};
use crate::models::{Position, Range, Selection, WorkspaceId};

#[derive(Debug)]
struct BufferState {
    rope: Rope,
    selections: Vec<Selection>,
}

impl BufferState {
    fn offset(&self, position: Position) -> usize {
        let last_line = self.rope.len_lines().saturating_sub(1);
        let line = position.line.min(last_line);
        let start = self.rope.line_to_char(line);
        start + position.character.min(line_len(&self.rope, line))
    }

    fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.rope.len_chars());
        let line = self.rope.char_to_line(offset);
        Position::new(line, offset - self.rope.line_to_char(line))
    }

    /// Replace each range with `text`, returning the caret offset for each
    /// replacement in the final document. Ranges must not overlap.
    fn replace_all(&mut self, ranges: &[Range], text: &str, caret: usize) -> Result<Vec<Position>> {
        let mut spans: Vec<(usize, usize)> = ranges
            .iter()
            .map(|range| (self.offset(range.start), self.offset(range.end)))
            .collect();
        spans.sort_unstable();

        if spans.windows(2).any(|pair| pair[0].1 > pair[1].0) {
            return Err(EdgeError::Mutation("overlapping ranges".to_string()));
        }

        let inserted = text.chars().count();
        let mut delta: isize = 0;
        let mut carets = Vec::with_capacity(spans.len());
        for (start, end) in spans {
            let start = (start as isize + delta) as usize;
            let end = (end as isize + delta) as usize;
            self.rope.remove(start..end);
            self.rope.insert(start, text);
            carets.push(start + caret);
            delta += inserted as isize - (end - start) as isize;
        }

        Ok(carets.into_iter().map(|offset| self.position(offset)).collect())
    }
}

fn line_len(rope: &Rope, line: usize) -> usize {
    let slice = rope.line(line);
    let mut len = slice.len_chars();
    while len > 0 && matches!(slice.char(len - 1), '\n' | '\r') {
        len -= 1;
    }
    len
}

fn is_word_grapheme(grapheme: &str) -> bool {
    grapheme
        .chars()
        .next()
        .is_some_and(|c| c.is_alphanumeric() || c == '_')
}

/// Character ranges of the runs of word graphemes (letters, digits, `_`) in
/// a line. Any other character, punctuation included, ends a word.
fn word_runs(line: &str) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut current = None;
    let mut column = 0;

    for grapheme in line.graphemes(true) {
        let start = column;
        column += grapheme.chars().count();
        if is_word_grapheme(grapheme) {
            current.get_or_insert(start);
        } else if let Some(begin) = current.take() {
            runs.push((begin, start));
        }
    }
    if let Some(begin) = current {
        runs.push((begin, column));
    }
    runs
}

#[derive(Debug)]
pub struct MemoryBuffer {
    language: String,
    workspace: Option<WorkspaceId>,
    read_only: Cell<bool>,
    insertions: Cell<usize>,
    state: RefCell<BufferState>,
}

impl MemoryBuffer {
    /// A document with a single caret at the end of `text`.
    pub fn new(text: &str, language: impl Into<String>) -> Self {
        let rope = Rope::from_str(text);
        let mut state = BufferState {
            rope,
            selections: Vec::new(),
        };
        let end = state.position(state.rope.len_chars());
        state.selections.push(Selection::cursor(end));

        Self {
            language: language.into(),
            workspace: None,
            read_only: Cell::new(false),
            insertions: Cell::new(0),
            state: RefCell::new(state),
        }
    }

    pub fn with_workspace(mut self, workspace: WorkspaceId) -> Self {
        self.workspace = Some(workspace);
        self
    }

    pub fn text(&self) -> String {
        self.state.borrow().rope.to_string()
    }

    /// Place one caret per position, in the given order.
    pub fn set_cursors(&self, positions: impl IntoIterator<Item = Position>) {
        self.set_selections(positions.into_iter().map(Selection::cursor).collect());
    }

    pub fn set_selections(&self, selections: Vec<Selection>) {
        self.state.borrow_mut().selections = selections;
    }

    /// Refuse snippet insertions, the way a host refuses to edit a read-only document.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.set(read_only);
    }

    /// How many `insert_snippet` calls succeeded.
    pub fn insertions(&self) -> usize {
        self.insertions.get()
    }

    /// Simulate typing `text` at every cursor, replacing any selection.
    ///
    /// Returns the change notification a host would deliver, with ranges in
    /// pre-edit coordinates; carets end up after the typed text.
    pub fn type_text(&self, text: &str) -> ChangeEvent {
        let mut state = self.state.borrow_mut();
        let ranges: Vec<Range> = state.selections.iter().map(Selection::range).collect();

        let mut order: Vec<usize> = (0..ranges.len()).collect();
        order.sort_by_key(|&i| ranges[i].start);
        let sorted: Vec<Range> = order.iter().map(|&i| ranges[i]).collect();

        let caret = text.chars().count();
        // Selections from a single caret set never overlap, so this cannot fail.
        let carets = state.replace_all(&sorted, text, caret).unwrap_or_default();

        let mut selections = state.selections.clone();
        for (&i, caret) in order.iter().zip(carets) {
            selections[i] = Selection::cursor(caret);
        }
        state.selections = selections;

        ChangeEvent {
            changes: ranges
                .into_iter()
                .map(|range| TextChange {
                    range,
                    text: text.to_string(),
                })
                .collect(),
        }
    }
}

#[async_trait(?Send)]
impl Editor for MemoryBuffer {
    fn language_id(&self) -> String {
        self.language.clone()
    }

    fn workspace(&self) -> Option<WorkspaceId> {
        self.workspace.clone()
    }

    fn selections(&self) -> Vec<Selection> {
        self.state.borrow().selections.clone()
    }

    fn word_range_at(&self, position: Position) -> Option<Range> {
        let line = self.line_text(position.line);
        let runs = word_runs(&line);
        let at = position.character;

        let containing = runs.iter().find(|&&(start, end)| start <= at && at < end);
        let touching = containing.or_else(|| runs.iter().find(|&&(_, end)| end == at));

        touching.map(|&(start, end)| {
            Range::new(
                Position::new(position.line, start),
                Position::new(position.line, end),
            )
        })
    }

    fn text_in(&self, range: Range) -> String {
        let state = self.state.borrow();
        let start = state.offset(range.start);
        let end = state.offset(range.end);
        state.rope.slice(start..end).to_string()
    }

    fn line_text(&self, line: usize) -> String {
        let state = self.state.borrow();
        if line >= state.rope.len_lines() {
            return String::new();
        }
        let len = line_len(&state.rope, line);
        state.rope.line(line).slice(..len).to_string()
    }

    async fn insert_snippet(&self, body: &str, ranges: &[Range]) -> Result<()> {
        if self.read_only.get() {
            return Err(EdgeError::Mutation("document is read-only".to_string()));
        }

        let rendered = render(body);
        let carets = self
            .state
            .borrow_mut()
            .replace_all(ranges, &rendered.text, rendered.cursor)?;

        self.set_cursors(carets);
        self.insertions.set(self.insertions.get() + 1);
        Ok(())
    }
}
