//! Token-to-HTML rendering.
//!
//! Rendering is keyed by [`TokenKind::name`]: a rule registered for a kind
//! replaces the built-in output for it. Kinds without a rule fall back to
//! generic rendering from the token's tag, nesting and attributes.

use std::collections::HashMap;
use std::fmt;

use crate::context::{CookEnv, RenderContext};
use crate::hoist::HoistMap;
use crate::token::{Nesting, Token, TokenKind};

/// Render rule for one token kind.
pub type RenderRuleFn = Box<dyn Fn(&Token, &mut RenderEnv<'_>) -> String + Send + Sync>;

/// Renderer with per-kind rule overrides.
#[derive(Default)]
pub struct Renderer {
    rules: HashMap<String, RenderRuleFn>,
}

impl Renderer {
    /// Create a renderer with no overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the rule for a token kind, returning the one it replaces.
    pub fn set_rule(
        &mut self,
        kind: impl Into<String>,
        rule: RenderRuleFn,
    ) -> Option<RenderRuleFn> {
        let kind = kind.into();
        tracing::trace!(kind = %kind, "Setting render rule");
        self.rules.insert(kind, rule)
    }

    /// Check whether a kind has a rule.
    #[must_use]
    pub fn has_rule(&self, kind: &str) -> bool {
        self.rules.contains_key(kind)
    }

    /// Render a token sequence.
    pub fn render(&self, tokens: &[Token], env: &mut RenderEnv<'_>) -> String {
        let mut out = String::new();
        for (idx, token) in tokens.iter().enumerate() {
            if let Some(rule) = self.rules.get(token.kind.name()) {
                out.push_str(&rule(token, env));
            } else {
                self.render_default(token, tokens.get(idx + 1), env, &mut out);
            }
        }
        out
    }

    fn render_default(
        &self,
        token: &Token,
        next: Option<&Token>,
        env: &mut RenderEnv<'_>,
        out: &mut String,
    ) {
        match &token.kind {
            TokenKind::Inline => out.push_str(&self.render(&token.children, env)),
            TokenKind::Text => out.push_str(&escape_html(&token.content)),
            TokenKind::CodeInline => {
                out.push_str("<code>");
                out.push_str(&escape_html(&token.content));
                out.push_str("</code>");
            }
            TokenKind::Fence => {
                if token.info.is_empty() {
                    out.push_str("<pre><code>");
                } else {
                    out.push_str(&format!(
                        r#"<pre><code class="lang-{}">"#,
                        escape_html(&token.info)
                    ));
                }
                out.push_str(&escape_html(&token.content));
                out.push_str("</code></pre>\n");
            }
            TokenKind::HtmlBlock | TokenKind::HtmlInline | TokenKind::HtmlRaw => {
                out.push_str(&token.content);
            }
            TokenKind::Softbreak => out.push('\n'),
            TokenKind::Hardbreak => out.push_str("<br>\n"),
            TokenKind::Link => {
                out.push_str(&format!("<a{}>", render_attrs(&token.attrs)));
                out.push_str(&self.render(&token.children, env));
                out.push_str("</a>");
            }
            TokenKind::Image => {
                let mut attrs = token.attrs.clone();
                attrs.insert(
                    1.min(attrs.len()),
                    ("alt".to_owned(), render_as_text(&token.children)),
                );
                out.push_str(&format!("<img{}>", render_attrs(&attrs)));
            }
            _ if token.tag.is_empty() => out.push_str(&escape_html(&token.content)),
            _ => {
                match token.nesting {
                    Nesting::Open | Nesting::SelfClosing => {
                        out.push_str(&format!("<{}{}>", token.tag, render_attrs(&token.attrs)));
                    }
                    Nesting::Close => out.push_str(&format!("</{}>", token.tag)),
                }
                let needs_newline = token.block
                    && (token.nesting != Nesting::Open
                        || next.is_none_or(|next| next.kind != TokenKind::Inline));
                if needs_newline {
                    out.push('\n');
                }
            }
        }
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&String> = self.rules.keys().collect();
        kinds.sort();
        f.debug_struct("Renderer").field("rules", &kinds).finish()
    }
}

/// State shared by render rules during one cook call.
pub struct RenderEnv<'a> {
    renderer: &'a Renderer,
    hoisted: &'a mut HoistMap,
    context: &'a RenderContext,
    cook: &'a CookEnv,
}

impl<'a> RenderEnv<'a> {
    pub(crate) fn new(
        renderer: &'a Renderer,
        hoisted: &'a mut HoistMap,
        context: &'a RenderContext,
        cook: &'a CookEnv,
    ) -> Self {
        Self {
            renderer,
            hoisted,
            context,
            cook,
        }
    }

    /// Render nested tokens with the same renderer.
    pub fn render(&mut self, tokens: &[Token]) -> String {
        let renderer = self.renderer;
        renderer.render(tokens, self)
    }

    /// Hoist trusted HTML past the sanitizer. See [`HoistMap::hoist`].
    pub fn hoist(&mut self, html: impl Into<String>) -> String {
        self.hoisted.hoist(html)
    }

    /// Engine render context.
    #[must_use]
    pub fn context(&self) -> &'a RenderContext {
        self.context
    }

    /// Per-call cook settings.
    #[must_use]
    pub fn cook_env(&self) -> &'a CookEnv {
        self.cook
    }

    /// Check whether this is a composer preview render.
    #[must_use]
    pub fn previewing(&self) -> bool {
        self.cook.previewing
    }
}

/// Plain text of inline tokens, as used for alt text.
#[must_use]
pub fn render_as_text(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        match token.kind {
            TokenKind::Text | TokenKind::CodeInline => out.push_str(&token.content),
            TokenKind::Softbreak | TokenKind::Hardbreak => out.push('\n'),
            _ => out.push_str(&render_as_text(&token.children)),
        }
    }
    out
}

/// Escape text for HTML content and attribute values.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render attributes as ` name="value"` pairs.
#[must_use]
pub fn render_attrs(attrs: &[(String, String)]) -> String {
    attrs
        .iter()
        .map(|(name, value)| format!(r#" {name}="{}""#, escape_html(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(renderer: &Renderer, tokens: &[Token]) -> (String, HoistMap) {
        let context = RenderContext::default();
        let cook = CookEnv::default();
        let mut hoisted = HoistMap::new();
        let mut env = RenderEnv::new(renderer, &mut hoisted, &context, &cook);
        let html = renderer.render(tokens, &mut env);
        (html, hoisted)
    }

    fn paragraph(text: &str) -> Vec<Token> {
        let mut inline = Token::new(TokenKind::Inline, "", Nesting::SelfClosing).with_lines(0, 1);
        inline.children = vec![Token::text(text)];
        vec![
            Token::new(TokenKind::ParagraphOpen, "p", Nesting::Open).with_lines(0, 1),
            inline,
            Token::new(TokenKind::ParagraphClose, "p", Nesting::Close).with_lines(0, 1),
        ]
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">&</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_render_attrs() {
        let attrs = vec![
            ("src".to_owned(), "/a.png".to_owned()),
            ("alt".to_owned(), "a \"b\"".to_owned()),
        ];
        assert_eq!(render_attrs(&attrs), r#" src="/a.png" alt="a &quot;b&quot;""#);
    }

    #[test]
    fn test_paragraph_default_rendering() {
        let (html, hoisted) = render(&Renderer::new(), &paragraph("a < b"));
        assert_eq!(html, "<p>a &lt; b</p>\n");
        assert!(hoisted.is_empty());
    }

    #[test]
    fn test_fence_language_class() {
        let fence = Token::new(TokenKind::Fence, "code", Nesting::SelfClosing)
            .with_content("let x = 1;\n")
            .with_info("rust")
            .with_lines(0, 3);
        let (html, _) = render(&Renderer::new(), &[fence]);
        assert_eq!(html, "<pre><code class=\"lang-rust\">let x = 1;\n</code></pre>\n");
    }

    #[test]
    fn test_rule_overrides_default() {
        let mut renderer = Renderer::new();
        let upper: RenderRuleFn = Box::new(|token: &Token, _: &mut RenderEnv<'_>| {
            token.content.to_uppercase()
        });
        assert!(renderer.set_rule("text", upper).is_none());
        assert!(renderer.has_rule("text"));
        let (html, _) = render(&renderer, &paragraph("abc"));
        assert_eq!(html, "<p>ABC</p>\n");
    }

    #[test]
    fn test_rule_can_hoist() {
        let mut renderer = Renderer::new();
        let hoist: RenderRuleFn = Box::new(|token: &Token, env: &mut RenderEnv<'_>| {
            env.hoist(token.content.clone())
        });
        renderer.set_rule("html_raw", hoist);
        let (html, hoisted) = render(&renderer, &[Token::html_raw("<b>trusted</b>")]);
        assert!(html.starts_with("hoisted"));
        assert_eq!(hoisted.len(), 1);
    }

    #[test]
    fn test_render_as_text() {
        let tokens = vec![
            Token::text("a"),
            Token::new(TokenKind::EmOpen, "em", Nesting::Open),
            Token::new(TokenKind::CodeInline, "code", Nesting::SelfClosing).with_content("b"),
            Token::new(TokenKind::EmClose, "em", Nesting::Close),
            Token::new(TokenKind::Softbreak, "", Nesting::SelfClosing),
            Token::text("c|d"),
        ];
        assert_eq!(render_as_text(&tokens), "ab\nc|d");
    }
}
