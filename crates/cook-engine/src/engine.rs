//! Engine construction and the cook pipeline.

use cook_sanitize::{AllowList, Sanitizer};

use crate::bbcode::{self, BbcodeRuleFn};
use crate::block::{self, BlockRuleFn, BlockState};
use crate::context::{CookEnv, RenderContext};
use crate::error::EngineError;
use crate::features;
use crate::hoist::HoistMap;
use crate::inline::{self, InlineRuleFn};
use crate::media;
use crate::render::{RenderEnv, RenderRuleFn, Renderer};
use crate::ruler::Ruler;
use crate::token::{Token, TokenKind};

/// Core rule: rewrites the complete token stream after parsing.
pub type CoreRuleFn = Box<dyn Fn(&mut CoreState<'_>) + Send + Sync>;

/// Elements every engine permits, whatever features are enabled.
const BASE_ALLOW_LIST: &[&str] = &[
    "p",
    "br",
    "hr",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "em",
    "strong",
    "b",
    "i",
    "s",
    "del",
    "ins",
    "sub",
    "sup",
    "kbd",
    "small",
    "blockquote",
    "ul",
    "ol[start]",
    "li",
    "table",
    "thead",
    "tbody",
    "tr",
    "th",
    "td",
    "pre",
    "code[class]",
    "abbr[title]",
    "a[href][title][data-*]",
    "img[src][alt][title][width][height][data-*][role=presentation]",
    "img.resizable",
    "div.video-placeholder-container[data-video-src][data-orig-src]",
    "div.onebox-placeholder-container[data-orig-src-id]",
    "span.placeholder-icon.video",
    "audio[preload][controls]",
    "source[src][data-orig-src]",
];

/// Token stream handed to core rules.
pub struct CoreState<'a> {
    /// Block tokens; `Inline` tokens already carry their children.
    pub tokens: Vec<Token>,
    /// Per-call cook settings.
    pub cook: &'a CookEnv,
    /// Engine render context.
    pub context: &'a RenderContext,
}

/// A pluggable feature.
///
/// Built-in features and plugins share this interface. `setup` runs once per
/// engine build, and only when the render context enables [`name`](Self::name).
pub trait Feature: Send + Sync {
    /// Feature flag name.
    fn name(&self) -> &'static str;

    /// Register rules, render rules and allow-list entries.
    fn setup(&self, builder: &mut EngineBuilder) -> Result<(), EngineError>;
}

/// Mutable engine under construction.
///
/// The rulers, renderer and allow-list are open to features while the
/// builder exists. [`build`](Self::build) freezes them into an [`Engine`].
pub struct EngineBuilder {
    /// Block rules.
    pub block: Ruler<BlockRuleFn>,
    /// Inline rules.
    pub inline: Ruler<InlineRuleFn>,
    /// Whole-stream rewrite rules, run after parsing.
    pub core: Ruler<CoreRuleFn>,
    /// Bracket tags valid as blocks.
    pub bbcode_block: Ruler<BbcodeRuleFn>,
    /// Bracket tags valid inline.
    pub bbcode_inline: Ruler<BbcodeRuleFn>,
    /// Render rules.
    pub renderer: Renderer,
    /// Sanitizer allow-list.
    pub allow_list: AllowList,
    context: RenderContext,
    plugins: Vec<Box<dyn Feature>>,
}

impl EngineBuilder {
    /// Create a builder with the built-in grammar and render rules.
    pub fn new(context: RenderContext) -> Result<Self, EngineError> {
        let mut builder = Self {
            block: Ruler::new("block"),
            inline: Ruler::new("inline"),
            core: Ruler::new("core"),
            bbcode_block: Ruler::new("bbcode_block"),
            bbcode_inline: Ruler::new("bbcode_inline"),
            renderer: Renderer::new(),
            allow_list: AllowList::new(),
            context,
            plugins: Vec::new(),
        };
        builder.register_builtins()?;
        Ok(builder)
    }

    fn register_builtins(&mut self) -> Result<(), EngineError> {
        let block_rules: [(&str, BlockRuleFn); 5] = [
            ("fence", Box::new(block::fence)),
            ("heading", Box::new(block::heading)),
            ("html_block", Box::new(block::html_block)),
            ("bbcode_block", Box::new(bbcode::block_rule)),
            ("paragraph", Box::new(block::paragraph)),
        ];
        for (name, rule) in block_rules {
            self.block.push(name, rule)?;
        }

        let inline_rules: [(&str, InlineRuleFn); 10] = [
            ("escape", Box::new(inline::escape)),
            ("backticks", Box::new(inline::backticks)),
            ("newline", Box::new(inline::newline)),
            ("emphasis", Box::new(inline::emphasis)),
            ("image", Box::new(inline::image)),
            ("link", Box::new(inline::link)),
            ("autolink", Box::new(inline::autolink)),
            ("html_inline", Box::new(inline::html_inline)),
            ("bbcode_inline", Box::new(bbcode::inline_rule)),
            ("text", Box::new(inline::text)),
        ];
        for (name, rule) in inline_rules {
            self.inline.push(name, rule)?;
        }

        let render_rules: [(&str, RenderRuleFn); 3] = [
            ("html_raw", Box::new(render_html_raw)),
            ("image", Box::new(media::render_image)),
            ("link", Box::new(media::render_link)),
        ];
        for (kind, rule) in render_rules {
            self.renderer.set_rule(kind, rule);
        }

        self.allow_list.allow_all(BASE_ALLOW_LIST)?;
        let attachment_classes: Vec<String> = self
            .context
            .attachment_classes
            .iter()
            .map(|class| format!("a.{class}"))
            .collect();
        self.allow_list.allow_all(attachment_classes)?;
        Ok(())
    }

    /// Render context the engine is built for.
    #[must_use]
    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Add a plugin feature. It is set up during [`build`](Self::build) if
    /// its name is enabled in the render context.
    #[must_use]
    pub fn with_feature(mut self, feature: impl Feature + 'static) -> Self {
        self.plugins.push(Box::new(feature));
        self
    }

    /// Apply enabled features and freeze the engine.
    pub fn build(mut self) -> Result<Engine, EngineError> {
        let builtins = features::builtin_features();
        let plugins = std::mem::take(&mut self.plugins);
        let mut applied = Vec::new();

        for feature in builtins.iter().chain(plugins.iter()) {
            let name = feature.name();
            if !self.context.features.is_enabled(name) {
                tracing::trace!(feature = name, "Feature disabled");
                continue;
            }
            feature.setup(&mut self)?;
            tracing::debug!(feature = name, "Feature enabled");
            applied.push(name);
        }

        let sanitizer = if self.context.sanitize {
            Sanitizer::new(self.allow_list)
        } else {
            Sanitizer::pass_through()
        };

        tracing::info!(
            features = ?applied,
            block_rules = self.block.len(),
            inline_rules = self.inline.len(),
            "Engine built"
        );

        Ok(Engine {
            block: self.block,
            inline: self.inline,
            core: self.core,
            bbcode_block: self.bbcode_block,
            bbcode_inline: self.bbcode_inline,
            renderer: self.renderer,
            sanitizer,
            context: self.context,
        })
    }
}

fn render_html_raw(token: &Token, env: &mut RenderEnv<'_>) -> String {
    let key = env.hoist(token.content.clone());
    if token.block && !key.is_empty() {
        format!("{key}\n")
    } else {
        key
    }
}

/// A configured cooking engine.
///
/// Built once per render configuration with [`EngineBuilder`] and shared
/// freely; every cook call gets its own hoist map.
///
/// # Example
///
/// ```
/// use cook_engine::{EngineBuilder, RenderContext};
///
/// let context = RenderContext::default().with_features(["math"]);
/// let engine = EngineBuilder::new(context).unwrap().build().unwrap();
///
/// assert_eq!(
///     engine.cook("Euler: $e^{i\\pi}$"),
///     r#"<p>Euler: <span class="math">e^{i\pi}</span></p>"#
/// );
/// ```
pub struct Engine {
    block: Ruler<BlockRuleFn>,
    inline: Ruler<InlineRuleFn>,
    core: Ruler<CoreRuleFn>,
    bbcode_block: Ruler<BbcodeRuleFn>,
    bbcode_inline: Ruler<BbcodeRuleFn>,
    renderer: Renderer,
    sanitizer: Sanitizer,
    context: RenderContext,
}

impl Engine {
    /// Build an engine with only the features named in `context`.
    pub fn new(context: RenderContext) -> Result<Self, EngineError> {
        EngineBuilder::new(context)?.build()
    }

    /// Block rules.
    #[must_use]
    pub fn block_rules(&self) -> &Ruler<BlockRuleFn> {
        &self.block
    }

    /// Inline rules.
    #[must_use]
    pub fn inline_rules(&self) -> &Ruler<InlineRuleFn> {
        &self.inline
    }

    /// Core rules.
    #[must_use]
    pub fn core_rules(&self) -> &Ruler<CoreRuleFn> {
        &self.core
    }

    /// Block-level bracket tags.
    #[must_use]
    pub fn bbcode_block_rules(&self) -> &Ruler<BbcodeRuleFn> {
        &self.bbcode_block
    }

    /// Inline bracket tags.
    #[must_use]
    pub fn bbcode_inline_rules(&self) -> &Ruler<BbcodeRuleFn> {
        &self.bbcode_inline
    }

    /// The renderer.
    #[must_use]
    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// The sanitizer.
    #[must_use]
    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    /// Render context the engine was built for.
    #[must_use]
    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Parse raw markup into tokens.
    pub fn parse(&self, raw: &str, cook: &CookEnv) -> Vec<Token> {
        let src = normalize(raw);

        let mut state = BlockState::new(&src, self);
        let line_count = state.line_count();
        block::tokenize(&mut state, 0, line_count);
        let mut tokens = state.tokens;

        for token in &mut tokens {
            if token.kind == TokenKind::Inline {
                token.children = inline::parse(&token.content, self, 0);
            }
        }

        let mut core = CoreState {
            tokens,
            cook,
            context: &self.context,
        };
        for rule in self.core.rules() {
            (rule.handler())(&mut core);
        }
        core.tokens
    }

    /// Render tokens to unsanitized HTML, hoisting trusted fragments into
    /// `hoisted`.
    pub fn render(&self, tokens: &[Token], cook: &CookEnv, hoisted: &mut HoistMap) -> String {
        let mut env = RenderEnv::new(&self.renderer, hoisted, &self.context, cook);
        self.renderer.render(tokens, &mut env)
    }

    /// Cook raw markup with default per-call settings.
    #[must_use]
    pub fn cook(&self, raw: &str) -> String {
        self.cook_with(raw, &CookEnv::default())
    }

    /// Cook raw markup: render, sanitize, unhoist, trim.
    ///
    /// Never fails: malformed markup degrades to literal text.
    #[must_use]
    pub fn cook_with(&self, raw: &str, cook: &CookEnv) -> String {
        let tokens = self.parse(raw, cook);
        let mut hoisted = HoistMap::new();
        let rendered = self.render(&tokens, cook, &mut hoisted);
        let hoisted_count = hoisted.len();

        let mut html = self.sanitizer.sanitize(&rendered);
        hoisted.unhoist(&mut html);

        tracing::debug!(
            tokens = tokens.len(),
            hoisted = hoisted_count,
            previewing = cook.previewing,
            "Cooked markup"
        );
        html.trim().to_owned()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("block", &self.block)
            .field("inline", &self.inline)
            .field("core", &self.core)
            .field("bbcode_block", &self.bbcode_block)
            .field("bbcode_inline", &self.bbcode_inline)
            .field("renderer", &self.renderer)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Normalize line endings and replace NUL characters.
fn normalize(raw: &str) -> String {
    raw.replace("\r\n", "\n").replace('\r', "\n").replace('\0', "\u{fffd}")
}

/// Cook raw markup with a one-off engine built from `context`.
///
/// Building an engine is far more expensive than cooking; callers that cook
/// repeatedly should build an [`Engine`] once and reuse it.
pub fn cook(raw: &str, context: &RenderContext) -> Result<String, EngineError> {
    Ok(Engine::new(context.clone())?.cook(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn engine(features: &[&str]) -> Engine {
        Engine::new(RenderContext::default().with_features(features.iter().copied())).unwrap()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("a\r\nb\rc\0"), "a\nb\nc\u{fffd}");
    }

    #[test]
    fn test_builtin_rule_order() {
        let engine = engine(&[]);
        let names: Vec<&str> = engine.inline_rules().rules().iter().map(|r| r.name()).collect();
        assert_eq!(names.first(), Some(&"escape"));
        assert_eq!(names.last(), Some(&"text"));
        assert!(engine.bbcode_block_rules().is_empty());
        assert!(engine.bbcode_inline_rules().is_empty());
    }

    #[test]
    fn test_math_rules_registered_around_escape() {
        let engine = engine(&["math"]);
        let names: Vec<&str> = engine.inline_rules().rules().iter().map(|r| r.name()).collect();
        let escape = names.iter().position(|&n| n == "escape").unwrap();
        assert_eq!(names[escape - 1], "math_bracket");
        assert_eq!(names[escape + 1], "math");
    }

    #[test]
    fn test_disabled_feature_not_applied() {
        let engine = engine(&[]);
        assert!(engine.inline_rules().rule("math").is_none());
        assert!(!engine.renderer().has_rule("math_inline"));
    }

    #[test]
    fn test_parse_fills_inline_children() {
        let engine = engine(&[]);
        let tokens = engine.parse("# Title\n\nhello *world*", &CookEnv::default());
        let kinds: Vec<&str> = tokens.iter().map(|t| t.kind.name()).collect();
        assert_eq!(
            kinds,
            vec![
                "heading_open",
                "inline",
                "heading_close",
                "paragraph_open",
                "inline",
                "paragraph_close"
            ]
        );
        assert_eq!(tokens[4].children.len(), 4);
        assert_eq!(tokens[4].children[0].content, "hello ");
    }

    #[test]
    fn test_render_html_raw_hoists() {
        let engine = engine(&[]);
        let mut hoisted = HoistMap::new();
        let html = engine.render(&[Token::html_raw("<b>x</b>")], &CookEnv::default(), &mut hoisted);
        assert!(html.starts_with("hoisted"));
        assert_eq!(hoisted.len(), 1);
    }

    #[test]
    fn test_sanitize_switch() {
        let context = RenderContext {
            sanitize: false,
            ..RenderContext::default()
        };
        let engine = Engine::new(context).unwrap();
        assert!(engine.sanitizer().is_pass_through());
        assert_eq!(engine.cook("<script>x()</script>"), "<script>x()</script>");
    }
}
