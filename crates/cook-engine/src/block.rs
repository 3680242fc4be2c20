//! Block-level scanning.
//!
//! The source is split into lines; block rules are tried in ruler order on
//! the first non-blank line and consume as many lines as they need. The
//! `paragraph` rule is last and takes whatever nothing else claimed.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

use crate::bbcode;
use crate::engine::Engine;
use crate::token::{Nesting, Token, TokenKind};

/// Block rule: `(state, start_line, end_line, silent) -> matched`.
///
/// In silent mode the rule only reports whether it would match; it must not
/// push tokens or move `state.line`. Otherwise it pushes its tokens and sets
/// `state.line` to the first line it did not consume.
pub type BlockRuleFn = Box<dyn Fn(&mut BlockState<'_>, usize, usize, bool) -> bool + Send + Sync>;

/// Nesting limit for rules that tokenize their own content.
const MAX_DEPTH: usize = 20;

const HEADING_TAGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];

fn html_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:<!--|</?(?:address|article|aside|audio|blockquote|details|dialog|div|dl|dd|dt|fieldset|figcaption|figure|footer|form|h[1-6]|header|hr|iframe|li|main|nav|ol|p|pre|script|section|style|summary|table|tbody|td|tfoot|th|thead|tr|ul|video)(?:[\s/>]|$))",
        )
        .expect("valid regex")
    })
}

/// Line-oriented scanning state.
pub struct BlockState<'a> {
    src: &'a str,
    lines: Vec<Range<usize>>,
    /// Next line to scan; rules advance it past what they consume.
    pub line: usize,
    /// Tokens produced so far.
    pub tokens: Vec<Token>,
    engine: &'a Engine,
    depth: usize,
    /// Bracket tag line pairs per tag name, opener line to closing line.
    bbcode_lines: HashMap<String, HashMap<usize, usize>>,
}

impl<'a> BlockState<'a> {
    pub(crate) fn new(src: &'a str, engine: &'a Engine) -> Self {
        let mut lines = Vec::new();
        let mut start = 0;
        for (idx, byte) in src.bytes().enumerate() {
            if byte == b'\n' {
                lines.push(start..idx);
                start = idx + 1;
            }
        }
        if start < src.len() {
            lines.push(start..src.len());
        }

        Self {
            src,
            lines,
            line: 0,
            tokens: Vec::new(),
            engine,
            depth: 0,
            bbcode_lines: HashMap::new(),
        }
    }

    /// The engine whose rules are being applied.
    #[must_use]
    pub fn engine(&self) -> &'a Engine {
        self.engine
    }

    /// Number of source lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Text of a line without its line break. Out-of-range lines are empty.
    #[must_use]
    pub fn line_text(&self, line: usize) -> &'a str {
        self.lines
            .get(line)
            .map_or("", |range| &self.src[range.clone()])
    }

    /// Leading indentation width; a tab counts as four columns.
    #[must_use]
    pub fn indent(&self, line: usize) -> usize {
        self.line_text(line)
            .chars()
            .map_while(|c| match c {
                ' ' => Some(1),
                '\t' => Some(4),
                _ => None,
            })
            .sum()
    }

    /// Check whether a line is empty or whitespace only.
    #[must_use]
    pub fn is_blank(&self, line: usize) -> bool {
        self.line_text(line).trim().is_empty()
    }

    /// Source text of lines `[start, end)` joined by their line breaks.
    #[must_use]
    pub fn lines_text(&self, start: usize, end: usize) -> String {
        let end = end.min(self.lines.len());
        if start >= end {
            return String::new();
        }
        self.src[self.lines[start].start..self.lines[end - 1].end].to_owned()
    }

    /// Append a token.
    pub fn push(&mut self, token: Token) {
        self.tokens.push(token);
    }

    /// Scan lines `[start, end)` with the full block ruler, appending tokens.
    ///
    /// Used by container rules for their content. Returns `false` without
    /// scanning when nesting is too deep; the caller should then not match.
    pub fn tokenize_range(&mut self, start: usize, end: usize) -> bool {
        if self.depth >= MAX_DEPTH {
            return false;
        }
        let saved = self.line;
        self.depth += 1;
        tokenize(self, start, end);
        self.depth -= 1;
        self.line = saved;
        true
    }

    /// Check whether nesting depth allows another container level.
    #[must_use]
    pub fn can_nest(&self) -> bool {
        self.depth < MAX_DEPTH
    }

    /// Line closing the bracket tag opened on `open_line`, if any.
    pub(crate) fn bbcode_close_line(&mut self, name: &str, open_line: usize) -> Option<usize> {
        if !self.bbcode_lines.contains_key(name) {
            let pairs = bbcode::match_line_pairs(self, name);
            self.bbcode_lines.insert(name.to_owned(), pairs);
        }
        self.bbcode_lines.get(name)?.get(&open_line).copied()
    }

    /// Check whether any rule other than `paragraph` would start at `line`.
    pub fn interrupts_paragraph(&mut self, line: usize, end: usize) -> bool {
        let engine = self.engine;
        engine
            .block_rules()
            .rules()
            .iter()
            .filter(|rule| rule.name() != "paragraph")
            .any(|rule| (rule.handler())(self, line, end, true))
    }
}

/// Scan lines `[start, end)` into tokens.
pub(crate) fn tokenize(state: &mut BlockState<'_>, start: usize, end: usize) {
    let engine = state.engine;
    let mut line = start;

    while line < end {
        if state.is_blank(line) {
            line += 1;
            continue;
        }

        state.line = line;
        let matched = engine
            .block_rules()
            .rules()
            .iter()
            .any(|rule| (rule.handler())(state, line, end, false));

        line = if matched && state.line > line {
            state.line
        } else {
            line + 1
        };
    }
}

/// Detect a code fence opener: marker character and run length.
fn detect_fence(trimmed: &str) -> Option<(char, usize)> {
    let first = trimmed.chars().next()?;
    if first != '`' && first != '~' {
        return None;
    }
    let count = trimmed.chars().take_while(|&c| c == first).count();
    (count >= 3).then_some((first, count))
}

/// Check whether a line closes a fence opened with `marker` × `min_len`.
fn is_fence_close(trimmed: &str, marker: char, min_len: usize) -> bool {
    let count = trimmed.chars().take_while(|&c| c == marker).count();
    count >= min_len && trimmed[count..].trim().is_empty()
}

/// Fenced code: ```` ```lang ```` … ```` ``` ````. Unterminated fences run to the end.
pub(crate) fn fence(state: &mut BlockState<'_>, start: usize, end: usize, silent: bool) -> bool {
    if state.indent(start) >= 4 {
        return false;
    }
    let opener = state.line_text(start).trim_start();
    let Some((marker, len)) = detect_fence(opener) else {
        return false;
    };
    let info = opener[len..].trim();
    if marker == '`' && info.contains('`') {
        return false;
    }
    if silent {
        return true;
    }

    let closing = (start + 1..end).find(|&line| {
        state.indent(line) < 4 && is_fence_close(state.line_text(line).trim_start(), marker, len)
    });
    let (content_end, next) = closing.map_or((end, end), |line| (line, line + 1));

    let mut content = state.lines_text(start + 1, content_end);
    if !content.is_empty() {
        content.push('\n');
    }
    let lang = info.split_whitespace().next().unwrap_or_default();

    state.push(
        Token::new(TokenKind::Fence, "code", Nesting::SelfClosing)
            .with_content(content)
            .with_info(lang)
            .with_lines(start, next),
    );
    state.line = next;
    true
}

/// ATX heading: `# Title`.
pub(crate) fn heading(state: &mut BlockState<'_>, start: usize, _end: usize, silent: bool) -> bool {
    if state.indent(start) >= 4 {
        return false;
    }
    let line = state.line_text(start).trim_start();
    let level = line.bytes().take_while(|&b| b == b'#').count();
    if level == 0 || level > 6 {
        return false;
    }
    let rest = &line[level..];
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
        return false;
    }
    if silent {
        return true;
    }

    let mut text = rest.trim();
    let without_closing = text.trim_end_matches('#');
    if without_closing.is_empty() || without_closing.ends_with([' ', '\t']) {
        text = without_closing.trim_end();
    }

    let tag = HEADING_TAGS[level - 1];
    state.push(Token::new(TokenKind::HeadingOpen, tag, Nesting::Open).with_lines(start, start + 1));
    state.push(
        Token::new(TokenKind::Inline, "", Nesting::SelfClosing)
            .with_content(text)
            .with_lines(start, start + 1),
    );
    state.push(
        Token::new(TokenKind::HeadingClose, tag, Nesting::Close).with_lines(start, start + 1),
    );
    state.line = start + 1;
    true
}

/// Raw HTML block: starts with a block-level tag or comment, ends at a blank line.
pub(crate) fn html_block(
    state: &mut BlockState<'_>,
    start: usize,
    end: usize,
    silent: bool,
) -> bool {
    if state.indent(start) >= 4 {
        return false;
    }
    if !html_block_regex().is_match(state.line_text(start).trim_start()) {
        return false;
    }
    if silent {
        return true;
    }

    let next = (start + 1..end)
        .find(|&line| state.is_blank(line))
        .unwrap_or(end);
    let mut content = state.lines_text(start, next);
    content.push('\n');

    state.push(
        Token::new(TokenKind::HtmlBlock, "", Nesting::SelfClosing)
            .with_content(content)
            .with_lines(start, next),
    );
    state.line = next;
    true
}

/// Paragraph: consecutive non-blank lines not claimed by another rule.
pub(crate) fn paragraph(
    state: &mut BlockState<'_>,
    start: usize,
    end: usize,
    silent: bool,
) -> bool {
    if silent {
        return false;
    }

    let mut next = start + 1;
    while next < end && !state.is_blank(next) && !state.interrupts_paragraph(next, end) {
        next += 1;
    }

    let content = (start..next)
        .map(|line| state.line_text(line).trim_start())
        .collect::<Vec<_>>()
        .join("\n");

    state.push(Token::new(TokenKind::ParagraphOpen, "p", Nesting::Open).with_lines(start, next));
    state.push(
        Token::new(TokenKind::Inline, "", Nesting::SelfClosing)
            .with_content(content.trim_end())
            .with_lines(start, next),
    );
    state.push(Token::new(TokenKind::ParagraphClose, "p", Nesting::Close).with_lines(start, next));
    state.line = next;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_fence() {
        assert_eq!(detect_fence("```rust"), Some(('`', 3)));
        assert_eq!(detect_fence("~~~~"), Some(('~', 4)));
        assert_eq!(detect_fence("``"), None);
        assert_eq!(detect_fence("text"), None);
    }

    #[test]
    fn test_is_fence_close() {
        assert!(is_fence_close("```", '`', 3));
        assert!(is_fence_close("`````  ", '`', 3));
        assert!(!is_fence_close("``", '`', 3));
        assert!(!is_fence_close("```js", '`', 3));
        assert!(!is_fence_close("~~~", '`', 3));
    }

    #[test]
    fn test_html_block_regex() {
        assert!(html_block_regex().is_match("<div class=\"x\">"));
        assert!(html_block_regex().is_match("</DETAILS>"));
        assert!(html_block_regex().is_match("<!-- note -->"));
        assert!(html_block_regex().is_match("<hr/>"));
        assert!(!html_block_regex().is_match("<span>"));
        assert!(!html_block_regex().is_match("<divider>"));
    }
}
