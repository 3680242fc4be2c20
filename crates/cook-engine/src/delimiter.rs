//! Delimiter-scanning matchers for custom inline and block syntax.
//!
//! These are the building blocks for extensions such as math: a span between
//! single delimiter characters (`$x$`), between literal open/close strings
//! (`\(x\)`), or a block region fenced by marker lines (`$$` … `$$`).
//!
//! Boundary and escape checks work on code points and must stay exact:
//! existing documents depend on them.

use std::ops::Range;

use unicode_categories::UnicodeCategories;

use crate::block::BlockState;

const BACKSLASH: u8 = b'\\';

/// Punctuation outside the Unicode `P*` categories that still ends a word in
/// CJK, Arabic and Thai text.
const EXTRA_PUNCTUATION: &[char] = &[
    '\u{3001}', // 、
    '\u{3002}', // 。
    '\u{ff0c}', // ，
    '\u{ff1a}', // ：
    '\u{ff1b}', // ；
    '\u{ff08}', // （
    '\u{ff09}', // ）
    '\u{060c}', // ،
    '\u{061b}', // ؛
    '\u{061f}', // ؟
    '\u{0e2f}', // ฯ
];

/// Whitespace as markdown defines it.
#[must_use]
pub fn is_markdown_whitespace(c: char) -> bool {
    matches!(
        c,
        '\u{09}'..='\u{0d}'
            | '\u{20}'
            | '\u{a0}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200a}'
            | '\u{202f}'
            | '\u{205f}'
            | '\u{3000}'
    )
}

/// Check whether `c` may sit directly outside a `delimiter`.
///
/// Safe boundaries are whitespace, ASCII punctuation, Unicode punctuation
/// and a few extra CJK/Arabic/Thai marks, but never the delimiter itself.
#[must_use]
pub fn is_safe_boundary(c: char, delimiter: char) -> bool {
    if c == delimiter {
        return false;
    }
    is_markdown_whitespace(c)
        || c.is_ascii_punctuation()
        || c.is_punctuation()
        || EXTRA_PUNCTUATION.contains(&c)
}

/// Check whether the byte at `pos` is escaped.
///
/// An odd number of backslashes directly before `pos` escapes it; an even
/// number are literal backslashes escaping each other.
#[must_use]
pub fn is_escaped(src: &str, pos: usize) -> bool {
    let backslashes = src.as_bytes()[..pos]
        .iter()
        .rev()
        .take_while(|&&b| b == BACKSLASH)
        .count();
    backslashes % 2 == 1
}

/// A matched inline span.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineSpan {
    /// Byte range of the captured content.
    pub content: Range<usize>,
    /// Byte offset just past the closing delimiter.
    pub end: usize,
}

/// Match a span delimited by a single character starting at `pos`.
///
/// Fails when the opening delimiter is escaped or doubled, when either outer
/// neighbour is not a safe boundary, when no unescaped closing delimiter
/// exists, or when the content crosses a line break.
#[must_use]
pub fn match_inline(src: &str, pos: usize, delimiter: char) -> Option<InlineSpan> {
    if !src[pos..].starts_with(delimiter) || is_escaped(src, pos) {
        return None;
    }
    let start = pos + delimiter.len_utf8();

    match src[start..].chars().next() {
        None => return None,
        Some(c) if c == delimiter => return None,
        Some(_) => {}
    }

    if let Some(prev) = src[..pos].chars().next_back()
        && !is_safe_boundary(prev, delimiter)
    {
        return None;
    }

    let mut close = None;
    for (offset, c) in src[start..].char_indices() {
        let at = start + offset;
        if c == '\n' {
            return None;
        }
        if c == delimiter && !is_escaped(src, at) {
            close = Some(at);
            break;
        }
    }
    let close = close?;
    let end = close + delimiter.len_utf8();

    if let Some(next) = src[end..].chars().next()
        && !is_safe_boundary(next, delimiter)
    {
        return None;
    }

    Some(InlineSpan {
        content: start..close,
        end,
    })
}

/// Match a span between literal `open` and `close` strings starting at `pos`.
///
/// Uses the same escape and line-break rules as [`match_inline`]. Empty
/// content does not match.
#[must_use]
pub fn match_inline_pair(src: &str, pos: usize, open: &str, close: &str) -> Option<InlineSpan> {
    if !src[pos..].starts_with(open) || is_escaped(src, pos) {
        return None;
    }
    let start = pos + open.len();
    let line_end = src[start..].find('\n').map_or(src.len(), |offset| start + offset);

    let mut search = start;
    loop {
        let found = search + src[search..line_end].find(close)?;
        if is_escaped(src, found) {
            search = found + 1;
            continue;
        }
        if found == start {
            return None;
        }
        return Some(InlineSpan {
            content: start..found,
            end: found + close.len(),
        });
    }
}

/// A matched block region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockRegion {
    /// Captured content, lines joined with `\n`.
    pub content: String,
    /// First line after the region.
    pub next_line: usize,
    /// Whether a closing marker was found.
    pub closed: bool,
}

/// Match a block region starting at `start_line`.
///
/// Two shapes are recognised:
///
/// 1. One line starting with `open` and ending with `close`, with non-empty
///    content between them (`$$x^2$$`). Empty content is not a match.
/// 2. An opening line that is exactly `open`, followed by content lines and
///    a line that is exactly `close` (surrounding whitespace ignored). A
///    missing closing line takes every remaining line up to `end_line`.
#[must_use]
pub fn match_block(
    state: &BlockState<'_>,
    start_line: usize,
    end_line: usize,
    open: &str,
    close: &str,
) -> Option<BlockRegion> {
    if state.indent(start_line) >= 4 {
        return None;
    }
    let first = state.line_text(start_line).trim();
    let after_open = first.strip_prefix(open)?;

    if !after_open.trim().is_empty() {
        let inner = after_open.strip_suffix(close)?;
        let content = inner.trim();
        if content.is_empty() {
            return None;
        }
        return Some(BlockRegion {
            content: content.to_owned(),
            next_line: start_line + 1,
            closed: true,
        });
    }

    let closing = (start_line + 1..end_line).find(|&line| state.line_text(line).trim() == close);
    let (content_end, next_line, closed) = match closing {
        Some(line) => (line, line + 1, true),
        None => (end_line, end_line, false),
    };

    Some(BlockRegion {
        content: state.lines_text(start_line + 1, content_end),
        next_line,
        closed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span<'a>(src: &'a str, found: &InlineSpan) -> &'a str {
        &src[found.content.clone()]
    }

    #[test]
    fn test_whitespace_set() {
        for c in ['\t', '\n', '\u{0b}', '\u{0c}', '\r', ' ', '\u{a0}', '\u{2003}', '\u{3000}'] {
            assert!(is_markdown_whitespace(c), "{c:?}");
        }
        for c in ['a', '\u{200b}', '\u{180e}'] {
            assert!(!is_markdown_whitespace(c), "{c:?}");
        }
    }

    #[test]
    fn test_safe_boundary() {
        assert!(is_safe_boundary(' ', '$'));
        assert!(is_safe_boundary(',', '$'));
        assert!(is_safe_boundary('(', '$'));
        assert!(is_safe_boundary('\u{3002}', '$'));
        assert!(is_safe_boundary('\u{ff0c}', '$'));
        assert!(is_safe_boundary('\u{061f}', '$'));
        assert!(is_safe_boundary('\u{0e2f}', '$'));
        assert!(is_safe_boundary('\u{00bf}', '$'));
        assert!(!is_safe_boundary('$', '$'));
        assert!(!is_safe_boundary('a', '$'));
        assert!(!is_safe_boundary('5', '$'));
        assert!(!is_safe_boundary('\u{4e2d}', '$'));
    }

    #[test]
    fn test_is_escaped_counts_backslashes() {
        assert!(!is_escaped("$", 0));
        assert!(is_escaped(r"\$", 1));
        assert!(!is_escaped(r"\\$", 2));
        assert!(is_escaped(r"\\\$", 3));
        assert!(!is_escaped(r"a$", 1));
    }

    #[test]
    fn test_match_inline_simple() {
        let src = "$x$";
        let found = match_inline(src, 0, '$').unwrap();
        assert_eq!(span(src, &found), "x");
        assert_eq!(found.end, 3);
    }

    #[test]
    fn test_match_inline_needs_safe_boundaries() {
        assert!(match_inline("a$x$", 1, '$').is_none());
        assert!(match_inline("$x$a", 0, '$').is_none());
        assert!(match_inline("($x$)", 1, '$').is_some());
        assert!(match_inline("is $x$.", 3, '$').is_some());
        assert!(match_inline("，$x$。", "，".len(), '$').is_some());
        assert!(match_inline("是$x$。", "是".len(), '$').is_none());
    }

    #[test]
    fn test_match_inline_rejects_doubled_delimiter() {
        assert!(match_inline("$$x$$", 0, '$').is_none());
        assert!(match_inline("$", 0, '$').is_none());
    }

    #[test]
    fn test_match_inline_prices_do_not_match() {
        assert!(match_inline("costs $5 and $10", 6, '$').is_none());
    }

    #[test]
    fn test_match_inline_skips_escaped_close() {
        let src = r"$a\$b$";
        let found = match_inline(src, 0, '$').unwrap();
        assert_eq!(span(src, &found), r"a\$b");
    }

    #[test]
    fn test_match_inline_even_backslashes_close() {
        let src = r"$a\\$";
        let found = match_inline(src, 0, '$').unwrap();
        assert_eq!(span(src, &found), r"a\\");
    }

    #[test]
    fn test_match_inline_escaped_open() {
        assert!(match_inline(r"\$x$", 1, '$').is_none());
    }

    #[test]
    fn test_match_inline_rejects_line_break() {
        assert!(match_inline("$a\nb$", 0, '$').is_none());
    }

    #[test]
    fn test_match_inline_no_close() {
        assert!(match_inline("$abc", 0, '$').is_none());
    }

    #[test]
    fn test_match_inline_pair() {
        let src = r"see \(x^2\) here";
        let found = match_inline_pair(src, 4, r"\(", r"\)").unwrap();
        assert_eq!(span(src, &found), "x^2");
        assert_eq!(&src[found.end..], " here");
    }

    #[test]
    fn test_match_inline_pair_escaped_close_skipped() {
        let src = r"\(a\\)b\)";
        let found = match_inline_pair(src, 0, r"\(", r"\)").unwrap();
        assert_eq!(span(src, &found), r"a\\)b");
    }

    #[test]
    fn test_match_inline_pair_rejects() {
        assert!(match_inline_pair(r"\(\)", 0, r"\(", r"\)").is_none());
        assert!(match_inline_pair("\\(a\nb\\)", 0, r"\(", r"\)").is_none());
        assert!(match_inline_pair(r"\\(a\)", 1, r"\(", r"\)").is_none());
        assert!(match_inline_pair(r"\(abc", 0, r"\(", r"\)").is_none());
    }
}
