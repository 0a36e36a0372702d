//! Snippet bodies: selected-text substitution and tab-stop rendering.
//!
//! Rendering understands the subset of snippet syntax needed to produce the
//! final text and caret position: `$1`, `${1}`, `${1:default}`, `${1|a,b|}`,
//! variables (`$NAME`, `${NAME:default}`) and the `\$`, `\}`, `\\` escapes.
//! Variables render their default, or nothing.

use std::sync::OnceLock;

use regex::{NoExpand, Regex};

/// Matches `${TM_SELECTED_TEXT}` and a bare `$TM_SELECTED_TEXT` that is not
/// the start of a longer variable name.
const SELECTED_TEXT_PATTERN: &str = r"\$\{TM_SELECTED_TEXT\}|\$TM_SELECTED_TEXT\b";

/// Escape text so that it renders literally inside a snippet body.
pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '$' | '}') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Leading whitespace of a line.
pub fn indentation(line: &str) -> &str {
    let end = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..end]
}

/// Normalise a selection before it is stored.
///
/// `line_indent` is the indentation of the line the selection starts on; it is
/// removed from every line that carries it, then the result is trimmed.
pub fn dedent_selection(text: &str, line_indent: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let dedented: Vec<&str> = text
        .split('\n')
        .map(|line| {
            if line_indent.is_empty() {
                line
            } else {
                line.strip_prefix(line_indent).unwrap_or(line)
            }
        })
        .collect();
    dedented.join("\n").trim().to_string()
}

/// Replace the selected-text placeholders in `body` with `text`.
///
/// Lines of `text` after the first are indented like the body line holding
/// the placeholder.
pub fn substitute_selection(body: &str, text: &str) -> String {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let placeholder = PLACEHOLDER
        .get_or_init(|| Regex::new(SELECTED_TEXT_PATTERN).expect("placeholder pattern is valid"));
    let escaped = escape_text(text);

    body.split('\n')
        .map(|line| {
            let replacement = escaped.replace('\n', &format!("\n{}", indentation(line)));
            placeholder
                .replace_all(line, NoExpand(&replacement))
                .into_owned()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Final text of a snippet and where the caret lands, in characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSnippet {
    pub text: String,
    pub cursor: usize,
}

/// Render tab stops and variables to plain text.
pub fn render(body: &str) -> RenderedSnippet {
    let chars: Vec<char> = body.chars().collect();
    let mut renderer = Renderer {
        chars: &chars,
        pos: 0,
        text: String::new(),
        len: 0,
        stops: Vec::new(),
    };
    renderer.render_until(false);

    let cursor = renderer
        .stops
        .iter()
        .filter(|(index, _)| *index > 0)
        .min_by_key(|(index, _)| *index)
        .or_else(|| renderer.stops.iter().find(|(index, _)| *index == 0))
        .map(|(_, offset)| *offset)
        .unwrap_or(renderer.len);

    RenderedSnippet {
        text: renderer.text,
        cursor,
    }
}

struct Renderer<'a> {
    chars: &'a [char],
    pos: usize,
    text: String,
    // Rendered length in characters.
    len: usize,
    stops: Vec<(u32, usize)>,
}

impl Renderer<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn push(&mut self, c: char) {
        self.text.push(c);
        self.len += 1;
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn render_until(&mut self, inside_braces: bool) {
        while let Some(c) = self.peek() {
            match c {
                '}' if inside_braces => return,
                '\\' => {
                    self.pos += 1;
                    match self.peek() {
                        Some(next @ ('$' | '}' | '\\')) => {
                            self.pos += 1;
                            self.push(next);
                        }
                        _ => self.push('\\'),
                    }
                }
                '$' => {
                    self.pos += 1;
                    self.dollar();
                }
                _ => {
                    self.pos += 1;
                    self.push(c);
                }
            }
        }
    }

    fn read_number(&mut self) -> Option<u32> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect::<String>().parse().ok()
    }

    fn read_name(&mut self) -> bool {
        let start = self.pos;
        if !self.peek().is_some_and(|c| c.is_ascii_alphabetic() || c == '_') {
            return false;
        }
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        self.pos > start
    }

    // Called with `pos` just past a `$`.
    fn dollar(&mut self) {
        match self.peek() {
            Some(c) if c.is_ascii_digit() => {
                if let Some(index) = self.read_number() {
                    self.stops.push((index, self.len));
                }
            }
            Some('{') => {
                let restart = self.pos;
                self.pos += 1;
                if !self.braced() {
                    // Not snippet syntax after all; keep it literally.
                    self.pos = restart;
                    self.push('$');
                }
            }
            Some(_) if self.read_name() => {}
            _ => self.push('$'),
        }
    }

    // Called with `pos` just past `${`.
    fn braced(&mut self) -> bool {
        if self.peek().is_some_and(|c| c.is_ascii_digit()) {
            let Some(index) = self.read_number() else {
                return false;
            };
            self.stops.push((index, self.len));
            if self.eat('}') {
                return true;
            }
            if self.eat(':') {
                self.render_until(true);
                self.eat('}');
                return true;
            }
            if self.eat('|') {
                let start = self.pos;
                while self.peek().is_some_and(|c| c != '|') {
                    self.pos += 1;
                }
                let options: String = self.chars[start..self.pos].iter().collect();
                self.eat('|');
                self.eat('}');
                for c in options.split(',').next().unwrap_or_default().chars() {
                    self.push(c);
                }
                return true;
            }
            self.stops.pop();
            return false;
        }

        if self.read_name() {
            if self.eat('}') {
                return true;
            }
            if self.eat(':') {
                self.render_until(true);
                self.eat('}');
                return true;
            }
        }
        false
    }
}
