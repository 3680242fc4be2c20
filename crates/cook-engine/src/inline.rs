//! Inline scanning.
//!
//! Inline rules run at the current position in ruler order; the first one
//! that consumes input wins. Plain characters collect in a pending buffer
//! that becomes a single text token when the next real token is pushed.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

use crate::bbcode;
use crate::delimiter::is_markdown_whitespace;
use crate::engine::Engine;
use crate::token::{Nesting, Token, TokenKind};

/// Inline rule: returns `true` after consuming input at `state.pos`.
pub type InlineRuleFn = Box<dyn Fn(&mut InlineState<'_>) -> bool + Send + Sync>;

/// Nesting limit for labels, emphasis and bracket tags.
const MAX_DEPTH: usize = 20;

const MAX_LINK_LABEL_LENGTH: usize = 1000;
const MAX_LINK_TITLE_LENGTH: usize = 1000;
const MAX_LINK_PAREN_DEPTH: usize = 32;

fn autolink_uri_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]{1,31}:[^\s<>]*$").expect("valid regex"))
}

fn autolink_email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~\-]+@[A-Za-z0-9](?:[A-Za-z0-9\-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]{0,61}[A-Za-z0-9])?)*$",
        )
        .expect("valid regex")
    })
}

fn html_inline_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^(?:<[A-Za-z][A-Za-z0-9\-]*(?:\s+[A-Za-z_:][A-Za-z0-9_.:\-]*(?:\s*=\s*(?:[^\s"'=<>`]+|'[^']*'|"[^"]*"))?)*\s*/?>|</[A-Za-z][A-Za-z0-9\-]*\s*>|<!--[\s\S]*?-->)"#,
        )
        .expect("valid regex")
    })
}

/// Scanning state for one inline run.
pub struct InlineState<'a> {
    /// Source being scanned.
    pub src: &'a str,
    /// Current byte offset into `src`.
    pub pos: usize,
    tokens: Vec<Token>,
    pending: String,
    engine: &'a Engine,
    depth: usize,
    /// Earliest offset past which a closing `(marker, run length)` is known
    /// to be missing.
    unmatched_runs: HashMap<(u8, usize), usize>,
    /// Bracket tag pairs per tag name, opener offset to closing range.
    bbcode_pairs: HashMap<String, HashMap<usize, Range<usize>>>,
}

impl<'a> InlineState<'a> {
    fn new(src: &'a str, engine: &'a Engine, depth: usize) -> Self {
        Self {
            src,
            pos: 0,
            tokens: Vec::new(),
            pending: String::new(),
            engine,
            depth,
            unmatched_runs: HashMap::new(),
            bbcode_pairs: HashMap::new(),
        }
    }

    /// The engine whose rules are being applied.
    #[must_use]
    pub fn engine(&self) -> &'a Engine {
        self.engine
    }

    /// Unscanned remainder of the source.
    #[must_use]
    pub fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    /// Character just before the current position.
    #[must_use]
    pub fn prev_char(&self) -> Option<char> {
        self.src[..self.pos].chars().next_back()
    }

    /// Append a token, flushing pending text first.
    pub fn push(&mut self, token: Token) {
        self.flush_pending();
        self.tokens.push(token);
    }

    /// Append literal text to the pending buffer.
    pub fn push_text(&mut self, text: &str) {
        self.pending.push_str(text);
    }

    /// Parse a nested source (a label, emphasised run, tag body).
    ///
    /// Past the nesting limit the source is returned as a single text token.
    #[must_use]
    pub fn parse_nested(&self, src: &str) -> Vec<Token> {
        if self.depth >= MAX_DEPTH {
            return vec![Token::text(src)];
        }
        parse(src, self.engine, self.depth + 1)
    }

    /// Byte range of the tag closing the `[name]` opened at `opener`, if any.
    pub(crate) fn bbcode_close(&mut self, name: &str, opener: usize) -> Option<Range<usize>> {
        let src = self.src;
        self.bbcode_pairs
            .entry(name.to_owned())
            .or_insert_with(|| bbcode::match_pairs(src, name))
            .get(&opener)
            .cloned()
    }

    fn run_known_unmatched(&self, marker: u8, run: usize) -> bool {
        self.unmatched_runs
            .get(&(marker, run))
            .is_some_and(|&from| self.pos >= from)
    }

    fn mark_run_unmatched(&mut self, marker: u8, run: usize) {
        self.unmatched_runs.entry((marker, run)).or_insert(self.pos);
    }

    /// Drop trailing spaces from pending text, returning how many there were.
    fn trim_pending_spaces(&mut self) -> usize {
        let trimmed = self.pending.trim_end_matches(' ').len();
        let removed = self.pending.len() - trimmed;
        self.pending.truncate(trimmed);
        removed
    }

    fn flush_pending(&mut self) {
        if !self.pending.is_empty() {
            let text = std::mem::take(&mut self.pending);
            self.tokens.push(Token::text(text));
        }
    }
}

/// Scan `src` into inline tokens.
pub(crate) fn parse(src: &str, engine: &Engine, depth: usize) -> Vec<Token> {
    let mut state = InlineState::new(src, engine, depth);
    let rules = engine.inline_rules().rules();

    while state.pos < state.src.len() {
        let before = state.pos;
        let matched = rules.iter().any(|rule| (rule.handler())(&mut state));
        if !matched || state.pos <= before {
            let Some(c) = state.src[before..].chars().next() else {
                break;
            };
            state.pending.push(c);
            state.pos = before + c.len_utf8();
        }
    }

    state.flush_pending();
    state.tokens
}

/// Backslash escapes: `\*` is a literal asterisk, a backslash before a line
/// break is a hard break.
pub(crate) fn escape(state: &mut InlineState<'_>) -> bool {
    let mut chars = state.rest().chars();
    if chars.next() != Some('\\') {
        return false;
    }
    match chars.next() {
        Some('\n') => {
            state.push(Token::new(TokenKind::Hardbreak, "br", Nesting::SelfClosing));
            state.pos += 2;
            skip_line_indent(state);
            true
        }
        Some(c) if c.is_ascii_punctuation() => {
            let mut buf = [0; 4];
            state.push_text(c.encode_utf8(&mut buf));
            state.pos += 2;
            true
        }
        _ => false,
    }
}

/// Code spans: a backtick run closed by a run of the same length.
pub(crate) fn backticks(state: &mut InlineState<'_>) -> bool {
    let rest = state.rest();
    if !rest.starts_with('`') {
        return false;
    }
    let open_len = rest.bytes().take_while(|&b| b == b'`').count();
    let after = &rest[open_len..];

    let mut search = if state.run_known_unmatched(b'`', open_len) {
        after.len()
    } else {
        0
    };
    while let Some(found) = after[search..].find('`') {
        let at = search + found;
        let run = after[at..].bytes().take_while(|&b| b == b'`').count();
        if run == open_len {
            let content = normalize_code_span(&after[..at]);
            state.push(
                Token::new(TokenKind::CodeInline, "code", Nesting::SelfClosing)
                    .with_content(content),
            );
            state.pos += open_len + at + run;
            return true;
        }
        search = at + run;
    }

    // No closer: the whole run is literal.
    state.mark_run_unmatched(b'`', open_len);
    state.push_text(&rest[..open_len]);
    state.pos += open_len;
    true
}

fn normalize_code_span(raw: &str) -> String {
    let content = raw.replace('\n', " ");
    if content.len() >= 2
        && content.starts_with(' ')
        && content.ends_with(' ')
        && !content.trim().is_empty()
    {
        return content[1..content.len() - 1].to_owned();
    }
    content
}

/// Line breaks: two or more trailing spaces make a hard break.
pub(crate) fn newline(state: &mut InlineState<'_>) -> bool {
    if !state.rest().starts_with('\n') {
        return false;
    }
    let token = if state.trim_pending_spaces() >= 2 {
        Token::new(TokenKind::Hardbreak, "br", Nesting::SelfClosing)
    } else {
        Token::new(TokenKind::Softbreak, "", Nesting::SelfClosing)
    };
    state.push(token);
    state.pos += 1;
    skip_line_indent(state);
    true
}

fn skip_line_indent(state: &mut InlineState<'_>) {
    let rest = state.rest();
    state.pos += rest.len() - rest.trim_start_matches([' ', '\t']).len();
}

/// Emphasis: `*em*`, `_em_`, `**strong**`, `__strong__`.
pub(crate) fn emphasis(state: &mut InlineState<'_>) -> bool {
    let rest = state.rest();
    let marker = match rest.bytes().next() {
        Some(b @ (b'*' | b'_')) => b,
        _ => return false,
    };
    let run = rest.bytes().take_while(|&b| b == marker).count();
    if run > 2 {
        state.push_text(&rest[..run]);
        state.pos += run;
        return true;
    }

    let after = &rest[run..];
    match after.chars().next() {
        None => return false,
        Some(c) if is_markdown_whitespace(c) => return false,
        Some(_) => {}
    }
    if marker == b'_' && state.prev_char().is_some_and(char::is_alphanumeric) {
        return false;
    }
    if state.run_known_unmatched(marker, run) {
        return false;
    }
    let Some(close) = find_emphasis_close(after, marker, run) else {
        state.mark_run_unmatched(marker, run);
        return false;
    };

    let (kind_open, kind_close, tag) = if run == 2 {
        (TokenKind::StrongOpen, TokenKind::StrongClose, "strong")
    } else {
        (TokenKind::EmOpen, TokenKind::EmClose, "em")
    };
    let children = state.parse_nested(&after[..close]);

    state.push(Token::new(kind_open, tag, Nesting::Open));
    for child in children {
        state.push(child);
    }
    state.push(Token::new(kind_close, tag, Nesting::Close));
    state.pos += run + close + run;
    true
}

/// Offset of a closing marker run of exactly `run` characters.
fn find_emphasis_close(after: &str, marker: u8, run: usize) -> Option<usize> {
    let bytes = after.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == marker => {
                let len = bytes[i..].iter().take_while(|&&b| b == marker).count();
                let prev_ok = after[..i]
                    .chars()
                    .next_back()
                    .is_some_and(|c| !is_markdown_whitespace(c));
                let next_ok = marker != b'_'
                    || after[i + len..]
                        .chars()
                        .next()
                        .is_none_or(|c| !c.is_alphanumeric());
                if len == run && prev_ok && next_ok {
                    return Some(i);
                }
                i += len;
            }
            _ => i += 1,
        }
    }
    None
}

/// Links: `[label](href "title")`.
pub(crate) fn link(state: &mut InlineState<'_>) -> bool {
    link_or_image(state, false)
}

/// Images: `![alt](src "title")`.
pub(crate) fn image(state: &mut InlineState<'_>) -> bool {
    link_or_image(state, true)
}

fn link_or_image(state: &mut InlineState<'_>, image: bool) -> bool {
    let opener = if image { "![" } else { "[" };
    if !state.rest().starts_with(opener) {
        return false;
    }
    let label_start = state.pos + opener.len();
    let Some(label_end) = find_label_end(state.src, label_start) else {
        return false;
    };
    if !state.src[label_end + 1..].starts_with('(') {
        return false;
    }
    let Some(destination) = parse_destination(state.src, label_end + 2) else {
        return false;
    };

    let label = &state.src[label_start..label_end];
    let mut token = if image {
        let mut token = Token::new(TokenKind::Image, "img", Nesting::SelfClosing);
        token.set_attr("src", destination.href);
        token
    } else {
        let mut token = Token::new(TokenKind::Link, "a", Nesting::SelfClosing);
        token.set_attr("href", destination.href);
        token
    };
    if let Some(title) = destination.title {
        token.set_attr("title", title);
    }
    token.children = state.parse_nested(label);
    token.content = label.to_owned();

    state.push(token);
    state.pos = destination.end;
    true
}

/// Index of the `]` closing a label that starts at `start`.
fn find_label_end(src: &str, start: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let limit = bytes.len().min(start + MAX_LINK_LABEL_LENGTH);
    let mut depth = 1usize;
    let mut i = start;
    while i < limit {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

#[derive(Debug, PartialEq, Eq)]
struct Destination {
    href: String,
    title: Option<String>,
    end: usize,
}

/// Parse `href "title")` starting just after the opening parenthesis.
fn parse_destination(src: &str, start: usize) -> Option<Destination> {
    let mut pos = skip_spaces(src, start);

    let href = if src[pos..].starts_with('<') {
        let close = src[pos + 1..].find(['>', '\n', '<'])?;
        if src.as_bytes()[pos + 1 + close] != b'>' {
            return None;
        }
        let href = &src[pos + 1..pos + 1 + close];
        pos += close + 2;
        href
    } else {
        let begin = pos;
        let mut depth = 0usize;
        let bytes = src.as_bytes();
        while pos < bytes.len() {
            match bytes[pos] {
                b'\\' if pos + 1 < bytes.len() => pos += 1,
                b'(' if depth == MAX_LINK_PAREN_DEPTH => return None,
                b'(' => depth += 1,
                b')' if depth == 0 => break,
                b')' => depth -= 1,
                b if b.is_ascii_whitespace() => break,
                _ => {}
            }
            pos += 1;
        }
        &src[begin..pos]
    };

    let after_href = pos;
    pos = skip_spaces(src, pos);
    let mut title = None;
    if pos > after_href
        && let Some(&quote) = src.as_bytes().get(pos)
        && matches!(quote, b'"' | b'\'' | b'(')
    {
        let closer = if quote == b'(' { b')' } else { quote };
        let close = src.as_bytes()[pos + 1..]
            .iter()
            .take(MAX_LINK_TITLE_LENGTH)
            .position(|&b| b == closer)?;
        title = Some(unescape(&src[pos + 1..pos + 1 + close]));
        pos = skip_spaces(src, pos + close + 2);
    }

    if !src[pos..].starts_with(')') {
        return None;
    }
    Some(Destination {
        href: unescape(href),
        title,
        end: pos + 1,
    })
}

fn skip_spaces(src: &str, pos: usize) -> usize {
    let rest = &src[pos..];
    pos + rest.len() - rest.trim_start_matches([' ', '\t', '\n']).len()
}

/// Remove backslashes before ASCII punctuation.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\'
            && let Some(&next) = chars.peek()
            && next.is_ascii_punctuation()
        {
            out.push(next);
            chars.next();
            continue;
        }
        out.push(c);
    }
    out
}

/// Autolinks: `<https://example.com>` and `<user@example.com>`.
pub(crate) fn autolink(state: &mut InlineState<'_>) -> bool {
    let rest = state.rest();
    if !rest.starts_with('<') {
        return false;
    }
    let Some(close) = rest.find('>') else {
        return false;
    };
    let inner = &rest[1..close];

    let href = if autolink_uri_regex().is_match(inner) {
        inner.to_owned()
    } else if autolink_email_regex().is_match(inner) {
        format!("mailto:{inner}")
    } else {
        return false;
    };

    let mut token = Token::new(TokenKind::Link, "a", Nesting::SelfClosing)
        .with_content(inner)
        .with_info("autolink");
    token.set_attr("href", href);
    token.children = vec![Token::text(inner)];

    state.push(token);
    state.pos += close + 1;
    true
}

/// Inline HTML tags and comments, passed through for the sanitizer to judge.
pub(crate) fn html_inline(state: &mut InlineState<'_>) -> bool {
    let rest = state.rest();
    if !rest.starts_with('<') {
        return false;
    }
    let Some(found) = html_inline_regex().find(rest) else {
        return false;
    };
    let len = found.end();
    state.push(
        Token::new(TokenKind::HtmlInline, "", Nesting::SelfClosing).with_content(found.as_str()),
    );
    state.pos += len;
    true
}

/// Runs of characters no other rule can start on.
///
/// Stops at every ASCII punctuation character and line break so extension
/// rules always get a chance at their opening delimiter.
pub(crate) fn text(state: &mut InlineState<'_>) -> bool {
    let rest = state.rest();
    let len = rest
        .find(|c: char| c == '\n' || c.is_ascii_punctuation())
        .unwrap_or(rest.len());
    if len == 0 {
        return false;
    }
    state.push_text(&rest[..len]);
    state.pos += len;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_code_span() {
        assert_eq!(normalize_code_span(" a "), "a");
        assert_eq!(normalize_code_span("  "), "  ");
        assert_eq!(normalize_code_span("a\nb"), "a b");
        assert_eq!(normalize_code_span(" `x` "), "`x`");
    }

    #[test]
    fn test_find_label_end_nested() {
        assert_eq!(find_label_end("[a [b] c](x)", 1), Some(8));
        assert_eq!(find_label_end(r"[a \] b](x)", 1), Some(7));
        assert_eq!(find_label_end("[open", 1), None);
    }

    #[test]
    fn test_find_label_end_bounded() {
        let long = format!("[{}](x)", "a".repeat(MAX_LINK_LABEL_LENGTH));
        assert_eq!(find_label_end(&long, 1), None);
        let short = format!("[{}](x)", "a".repeat(MAX_LINK_LABEL_LENGTH - 2));
        assert_eq!(find_label_end(&short, 1), Some(MAX_LINK_LABEL_LENGTH - 1));
    }

    #[test]
    fn test_parse_destination_paren_depth() {
        let nested = |depth: usize| format!("({}x{})", "(".repeat(depth), ")".repeat(depth));
        assert!(parse_destination(&nested(MAX_LINK_PAREN_DEPTH + 1), 1).is_none());
        assert!(parse_destination(&nested(MAX_LINK_PAREN_DEPTH), 1).is_some());
    }

    #[test]
    fn test_parse_destination() {
        let src = r#"(/u/a "Title") rest"#;
        assert_eq!(
            parse_destination(src, 1),
            Some(Destination {
                href: "/u/a".to_owned(),
                title: Some("Title".to_owned()),
                end: 14,
            })
        );
    }

    #[test]
    fn test_parse_destination_balanced_parens() {
        let src = "(https://en.wikipedia.org/wiki/Rust_(language))";
        let parsed = parse_destination(src, 1).unwrap();
        assert_eq!(parsed.href, "https://en.wikipedia.org/wiki/Rust_(language)");
        assert_eq!(parsed.end, src.len());
    }

    #[test]
    fn test_parse_destination_angle_and_empty() {
        assert_eq!(parse_destination("(<a b>)", 1).unwrap().href, "a b");
        assert_eq!(parse_destination("()", 1).unwrap().href, "");
        assert!(parse_destination("(a b)", 1).is_none());
        assert!(parse_destination("(open", 1).is_none());
    }

    #[test]
    fn test_find_emphasis_close() {
        assert_eq!(find_emphasis_close("a*", b'*', 1), Some(1));
        assert_eq!(find_emphasis_close("a **b**", b'*', 2), Some(5));
        assert_eq!(find_emphasis_close("b **", b'*', 2), None);
        assert_eq!(find_emphasis_close("a *", b'*', 1), None);
        assert_eq!(find_emphasis_close(r"a\*", b'*', 1), None);
        assert_eq!(find_emphasis_close("a_b c_", b'_', 1), Some(5));
    }

    #[test]
    fn test_autolink_patterns() {
        assert!(autolink_uri_regex().is_match("https://example.com/a?b=c"));
        assert!(!autolink_uri_regex().is_match("a b"));
        assert!(autolink_email_regex().is_match("sam@example.com"));
        assert!(!autolink_email_regex().is_match("not-an-email"));
    }

    #[test]
    fn test_html_inline_pattern() {
        assert!(html_inline_regex().is_match(r#"<span class="x">"#));
        assert!(html_inline_regex().is_match("</span>"));
        assert!(html_inline_regex().is_match("<br/>"));
        assert!(html_inline_regex().is_match("<!-- c -->"));
        assert!(!html_inline_regex().is_match("< span>"));
        assert!(!html_inline_regex().is_match("<3"));
    }
}
