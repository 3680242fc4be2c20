//! Bracket tags: `[name=value key="v"]…[/name]`.
//!
//! The scanner recognises any well-formed tag pair but only acts on tags a
//! feature registered in the `bbcode_inline` or `bbcode_block` ruler.
//! Unknown tags stay literal text.

use std::collections::HashMap;
use std::ops::Range;

use crate::block::BlockState;
use crate::inline::InlineState;
use crate::token::{Nesting, Token, TokenKind};

/// Tag handler: decides how an opened tag is wrapped, or declines with `None`.
pub type BbcodeRuleFn = Box<dyn Fn(&BbcodeTag) -> Option<BbcodeWrap> + Send + Sync>;

/// Longest opening tag, brackets excluded, the scanner looks at.
const MAX_TAG_LENGTH: usize = 1000;

/// Parsed opening tag.
///
/// # Example
///
/// ```
/// use cook_engine::BbcodeTag;
///
/// let tag = BbcodeTag::parse(r#"details="Summary" open=true"#).unwrap();
/// assert_eq!(tag.name, "details");
/// assert_eq!(tag.value.as_deref(), Some("Summary"));
/// assert_eq!(tag.get("open"), Some("true"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BbcodeTag {
    /// Lower-cased tag name.
    pub name: String,
    /// Default value from `[name=value]`.
    pub value: Option<String>,
    /// Named attributes from `key=value` pairs.
    pub attrs: HashMap<String, String>,
}

impl BbcodeTag {
    /// Parse the text between `[` and `]` of an opening tag.
    #[must_use]
    pub fn parse(inner: &str) -> Option<Self> {
        let name_end = inner
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(inner.len());
        let name = &inner[..name_end];
        if !is_tag_name(name) {
            return None;
        }

        let mut tag = Self {
            name: name.to_ascii_lowercase(),
            ..Self::default()
        };

        let mut remaining = &inner[name_end..];
        if let Some(after_eq) = remaining.strip_prefix('=') {
            let (value, rest) = split_value(after_eq)?;
            tag.value = Some(value.to_owned());
            remaining = rest;
        }

        while !remaining.is_empty() {
            remaining = remaining.trim_start();
            if remaining.is_empty() {
                break;
            }
            if let Some((key, value, rest)) = parse_key_value(remaining) {
                tag.attrs.insert(key.to_ascii_lowercase(), value.to_owned());
                remaining = rest;
            } else {
                let skip = remaining.chars().next().map_or(1, char::len_utf8);
                remaining = &remaining[skip..];
            }
        }

        Some(tag)
    }

    /// Get an attribute value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }
}

/// How a handled tag is rendered: a wrapping element plus optional leading
/// tokens (a `<summary>` for example).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BbcodeWrap {
    /// Wrapping element.
    pub tag: &'static str,
    /// Attributes of the wrapping element.
    pub attrs: Vec<(String, String)>,
    /// Tokens emitted right after the opening element.
    pub prelude: Vec<Token>,
}

impl BbcodeWrap {
    /// Wrap content in `tag`.
    #[must_use]
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            attrs: Vec::new(),
            prelude: Vec::new(),
        }
    }

    /// Add an attribute to the wrapping element.
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    /// Emit tokens before the content.
    #[must_use]
    pub fn with_prelude(mut self, tokens: Vec<Token>) -> Self {
        self.prelude = tokens;
        self
    }

    fn open_token(&self, name: &str) -> Token {
        let mut token =
            Token::new(TokenKind::custom("bbcode_open"), self.tag, Nesting::Open).with_info(name);
        token.attrs.clone_from(&self.attrs);
        token
    }

    fn close_token(&self, name: &str) -> Token {
        Token::new(TokenKind::custom("bbcode_close"), self.tag, Nesting::Close).with_info(name)
    }
}

fn is_tag_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Split a quoted or unquoted value off the front of `s`.
fn split_value(s: &str) -> Option<(&str, &str)> {
    for quote in ['"', '\''] {
        if let Some(stripped) = s.strip_prefix(quote) {
            let end = stripped.find(quote)?;
            return Some((&stripped[..end], &stripped[end + 1..]));
        }
    }
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    Some((&s[..end], &s[end..]))
}

/// Parse `key="value"`, `key='value'` or `key=value` off the front of `s`.
fn parse_key_value(s: &str) -> Option<(&str, &str, &str)> {
    let eq_pos = s.find('=')?;
    let key = s[..eq_pos].trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    let (value, rest) = split_value(&s[eq_pos + 1..])?;
    Some((key, value, rest))
}

/// Parse an opening tag at the start of `src`, returning it and its length.
fn parse_open_tag(src: &str) -> Option<(BbcodeTag, usize)> {
    let inner_src = src.strip_prefix('[')?;
    let close = inner_src
        .bytes()
        .take(MAX_TAG_LENGTH)
        .position(|b| b == b']' || b == b'\n')?;
    if inner_src.as_bytes()[close] != b']' {
        return None;
    }
    BbcodeTag::parse(&inner_src[..close]).map(|tag| (tag, close + 2))
}

fn closing_tag(name: &str) -> String {
    format!("[/{name}]")
}

/// Pair every `[name]` opener in `src` with its closing tag in one pass.
///
/// Maps the opener's byte offset to the byte range of its closing tag.
/// Openers that are never closed are absent.
pub(crate) fn match_pairs(src: &str, name: &str) -> HashMap<usize, Range<usize>> {
    let closing = closing_tag(name);
    let mut open = Vec::new();
    let mut pairs = HashMap::new();
    let mut search = 0;

    while let Some(found) = src[search..].find('[') {
        let at = search + found;
        let rest = &src[at..];
        if rest
            .get(..closing.len())
            .is_some_and(|candidate| candidate.eq_ignore_ascii_case(&closing))
        {
            if let Some(opener) = open.pop() {
                pairs.insert(opener, at..at + closing.len());
            }
            search = at + closing.len();
        } else if let Some((tag, len)) = parse_open_tag(rest)
            && tag.name == name
        {
            open.push(at);
            search = at + len;
        } else {
            search = at + 1;
        }
    }
    pairs
}

/// Pair every line holding only `[name]` with the line holding only its
/// closing tag.
pub(crate) fn match_line_pairs(state: &BlockState<'_>, name: &str) -> HashMap<usize, usize> {
    let closing = closing_tag(name);
    let mut open = Vec::new();
    let mut pairs = HashMap::new();
    for line in 0..state.line_count() {
        let text = state.line_text(line).trim();
        if text.eq_ignore_ascii_case(&closing) {
            if let Some(opener) = open.pop() {
                pairs.insert(opener, line);
            }
        } else if parse_open_tag(text)
            .is_some_and(|(tag, len)| tag.name == name && len == text.len())
        {
            open.push(line);
        }
    }
    pairs
}

/// Inline tag pairs within a paragraph.
pub(crate) fn inline_rule(state: &mut InlineState<'_>) -> bool {
    let rest = state.rest();
    if !rest.starts_with('[') {
        return false;
    }
    let Some((tag, open_len)) = parse_open_tag(rest) else {
        return false;
    };
    let Some(rule) = state.engine().bbcode_inline_rules().rule_for_tag(&tag.name) else {
        return false;
    };
    let start = state.pos;
    let Some(close) = state.bbcode_close(&tag.name, start) else {
        return false;
    };
    let Some(wrap) = (rule.handler())(&tag) else {
        return false;
    };

    let children = state.parse_nested(&rest[open_len..close.start - start]);
    state.push(wrap.open_token(&tag.name));
    for token in wrap.prelude.iter().cloned().chain(children) {
        state.push(token);
    }
    state.push(wrap.close_token(&tag.name));
    state.pos = close.end;
    true
}

/// Block tag pairs whose opening and closing tags sit on lines of their own.
pub(crate) fn block_rule(
    state: &mut BlockState<'_>,
    start: usize,
    end: usize,
    silent: bool,
) -> bool {
    if state.indent(start) >= 4 {
        return false;
    }
    let line = state.line_text(start).trim();
    let Some((tag, open_len)) = parse_open_tag(line) else {
        return false;
    };
    if open_len != line.len() {
        return false;
    }
    let engine = state.engine();
    let Some(rule) = engine.bbcode_block_rules().rule_for_tag(&tag.name) else {
        return false;
    };
    let Some(close_line) = state
        .bbcode_close_line(&tag.name, start)
        .filter(|&line| line < end)
    else {
        return false;
    };
    if !state.can_nest() {
        return false;
    }
    if silent {
        return true;
    }
    let Some(wrap) = (rule.handler())(&tag) else {
        return false;
    };

    state.push(wrap.open_token(&tag.name).with_lines(start, close_line + 1));
    for token in wrap.prelude.iter().cloned() {
        state.push(token);
    }
    state.tokenize_range(start + 1, close_line);
    state.push(wrap.close_token(&tag.name).with_lines(close_line, close_line + 1));
    state.line = close_line + 1;
    true
}
