//! Tokens produced while scanning markup.

use std::borrow::Cow;

/// Kind of a token.
///
/// Built-in kinds cover the host grammar. Extensions use [`TokenKind::Custom`]
/// with a stable name (e.g. `math_inline`) that renderer rules are keyed by.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TokenKind {
    ParagraphOpen,
    ParagraphClose,
    HeadingOpen,
    HeadingClose,
    /// Container whose `content` is parsed into inline `children`.
    Inline,
    /// Block literal: fenced code.
    Fence,
    HtmlBlock,
    HtmlInline,
    /// Trusted HTML that bypasses sanitization via hoisting.
    HtmlRaw,
    Text,
    /// Inline literal: code span.
    CodeInline,
    Softbreak,
    Hardbreak,
    EmOpen,
    EmClose,
    StrongOpen,
    StrongClose,
    /// Link with its label parsed into `children`.
    Link,
    /// Image with its alt text parsed into `children`.
    Image,
    Custom(Cow<'static, str>),
}

impl TokenKind {
    /// Stable name used to look up renderer rules.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::ParagraphOpen => "paragraph_open",
            Self::ParagraphClose => "paragraph_close",
            Self::HeadingOpen => "heading_open",
            Self::HeadingClose => "heading_close",
            Self::Inline => "inline",
            Self::Fence => "fence",
            Self::HtmlBlock => "html_block",
            Self::HtmlInline => "html_inline",
            Self::HtmlRaw => "html_raw",
            Self::Text => "text",
            Self::CodeInline => "code_inline",
            Self::Softbreak => "softbreak",
            Self::Hardbreak => "hardbreak",
            Self::EmOpen => "em_open",
            Self::EmClose => "em_close",
            Self::StrongOpen => "strong_open",
            Self::StrongClose => "strong_close",
            Self::Link => "link",
            Self::Image => "image",
            Self::Custom(name) => name,
        }
    }

    /// Create a custom kind.
    #[must_use]
    pub fn custom(name: &'static str) -> Self {
        Self::Custom(Cow::Borrowed(name))
    }
}

/// Whether a token opens, closes or stands alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Nesting {
    Open,
    Close,
    SelfClosing,
}

/// A unit of scanned markup.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Token {
    /// What the token is.
    pub kind: TokenKind,
    /// HTML element used by the generic renderer (empty for text-like tokens).
    pub tag: &'static str,
    /// Open / close / self-closing.
    pub nesting: Nesting,
    /// HTML attributes in insertion order.
    pub attrs: Vec<(String, String)>,
    /// Raw captured text.
    pub content: String,
    /// Sub-kind discriminator: fence language, math flavour, link origin.
    pub info: String,
    /// Source line range `[start, end)` for block tokens.
    pub lines: Option<(usize, usize)>,
    /// Nested inline tokens.
    pub children: Vec<Token>,
    /// Block-level token.
    pub block: bool,
}

impl Token {
    /// Create an empty token.
    #[must_use]
    pub fn new(kind: TokenKind, tag: &'static str, nesting: Nesting) -> Self {
        Self {
            kind,
            tag,
            nesting,
            attrs: Vec::new(),
            content: String::new(),
            info: String::new(),
            lines: None,
            children: Vec::new(),
            block: false,
        }
    }

    /// Create a text token.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(TokenKind::Text, "", Nesting::SelfClosing).with_content(content)
    }

    /// Create a trusted raw-HTML token.
    ///
    /// Its content is hoisted past the sanitizer, so it must never carry
    /// unescaped user text.
    #[must_use]
    pub fn html_raw(content: impl Into<String>) -> Self {
        Self::new(TokenKind::HtmlRaw, "", Nesting::SelfClosing).with_content(content)
    }

    /// Set the content.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Set the metadata string.
    #[must_use]
    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }

    /// Mark as a block token covering `[start, end)` source lines.
    #[must_use]
    pub fn with_lines(mut self, start: usize, end: usize) -> Self {
        self.block = true;
        self.lines = Some((start, end));
        self
    }

    /// Get an attribute value.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, replacing an existing value.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.attrs.push((name, value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(TokenKind::Fence.name(), "fence");
        assert_eq!(TokenKind::CodeInline.name(), "code_inline");
        assert_eq!(TokenKind::custom("math_inline").name(), "math_inline");
    }

    #[test]
    fn test_set_attr_replaces() {
        let mut token = Token::new(TokenKind::Image, "img", Nesting::SelfClosing);
        token.set_attr("src", "/a.png");
        token.set_attr("alt", "a");
        token.set_attr("src", "/b.png");

        assert_eq!(token.attr("src"), Some("/b.png"));
        assert_eq!(token.attrs.len(), 2);
        assert_eq!(token.attr("title"), None);
    }

    #[test]
    fn test_with_lines_marks_block() {
        let token = Token::new(TokenKind::Fence, "code", Nesting::SelfClosing).with_lines(2, 5);
        assert!(token.block);
        assert_eq!(token.lines, Some((2, 5)));
    }
}
