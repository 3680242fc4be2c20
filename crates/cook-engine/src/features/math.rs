//! Math: `$…$` inline, `$$…$$` blocks, optional `\(…\)` / `\[…\]` and
//! AsciiMath `%…%`.
//!
//! Math is rendered client-side; the engine only wraps the escaped source in
//! marker elements and hoists them so the sanitizer cannot mangle the TeX.

use crate::block::BlockState;
use crate::delimiter::{match_block, match_inline, match_inline_pair};
use crate::engine::{EngineBuilder, Feature};
use crate::error::EngineError;
use crate::inline::InlineState;
use crate::render::{RenderEnv, escape_html};
use crate::token::{Nesting, Token, TokenKind};

const INLINE_KIND: &str = "math_inline";
const BLOCK_KIND: &str = "math_block";

/// The `math` feature.
#[derive(Clone, Copy, Debug, Default)]
pub struct Math;

impl Feature for Math {
    fn name(&self) -> &'static str {
        "math"
    }

    fn setup(&self, builder: &mut EngineBuilder) -> Result<(), EngineError> {
        let options = builder.context().math.clone();

        builder.inline.after("escape", "math", Box::new(dollar_inline))?;
        builder.block.after("fence", "math_block", Box::new(dollar_block))?;
        if options.asciimath {
            builder.inline.after("math", "asciimath", Box::new(asciimath_inline))?;
        }
        if options.bracket_delimiters {
            // `\(` starts with a backslash, so this has to run before escapes.
            builder.inline.before("escape", "math_bracket", Box::new(bracket_inline))?;
            builder.block.after("math_block", "math_bracket_block", Box::new(bracket_block))?;
        }

        builder.renderer.set_rule(INLINE_KIND, Box::new(render_inline));
        builder.renderer.set_rule(BLOCK_KIND, Box::new(render_block));
        builder.allow_list.allow_all(["span.math", "span.asciimath", "div.math"])?;
        Ok(())
    }
}

fn push_inline(state: &mut InlineState<'_>, content: &str, end: usize, info: &str) {
    state.push(
        Token::new(TokenKind::custom(INLINE_KIND), "span", Nesting::SelfClosing)
            .with_content(content)
            .with_info(info),
    );
    state.pos = end;
}

fn dollar_inline(state: &mut InlineState<'_>) -> bool {
    let Some(span) = match_inline(state.src, state.pos, '$') else {
        return false;
    };
    let content = &state.src[span.content];
    push_inline(state, content, span.end, "math");
    true
}

fn asciimath_inline(state: &mut InlineState<'_>) -> bool {
    let Some(span) = match_inline(state.src, state.pos, '%') else {
        return false;
    };
    let content = &state.src[span.content];
    push_inline(state, content, span.end, "asciimath");
    true
}

fn bracket_inline(state: &mut InlineState<'_>) -> bool {
    let Some(span) = match_inline_pair(state.src, state.pos, r"\(", r"\)") else {
        return false;
    };
    let content = &state.src[span.content];
    push_inline(state, content, span.end, "math");
    true
}

fn block(
    state: &mut BlockState<'_>,
    start: usize,
    end: usize,
    silent: bool,
    open: &str,
    close: &str,
) -> bool {
    let Some(region) = match_block(state, start, end, open, close) else {
        return false;
    };
    if silent {
        return true;
    }
    if !region.closed {
        tracing::debug!(line = start, "Unterminated math block runs to end of input");
    }
    state.push(
        Token::new(TokenKind::custom(BLOCK_KIND), "div", Nesting::SelfClosing)
            .with_content(region.content)
            .with_info("math")
            .with_lines(start, region.next_line),
    );
    state.line = region.next_line;
    true
}

fn dollar_block(state: &mut BlockState<'_>, start: usize, end: usize, silent: bool) -> bool {
    block(state, start, end, silent, "$$", "$$")
}

fn bracket_block(state: &mut BlockState<'_>, start: usize, end: usize, silent: bool) -> bool {
    block(state, start, end, silent, r"\[", r"\]")
}

fn render_inline(token: &Token, env: &mut RenderEnv<'_>) -> String {
    let class = if token.info == "asciimath" { "asciimath" } else { "math" };
    env.hoist(format!(
        r#"<span class="{class}">{}</span>"#,
        escape_html(&token.content)
    ))
}

fn render_block(token: &Token, env: &mut RenderEnv<'_>) -> String {
    let key = env.hoist(format!(
        "<div class=\"math\">\n{}\n</div>",
        escape_html(&token.content)
    ));
    format!("{key}\n")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::context::{MathOptions, RenderContext};
    use crate::engine::Engine;

    fn engine(math: MathOptions) -> Engine {
        let context = RenderContext {
            math,
            ..RenderContext::default()
        }
        .with_features(["math"]);
        Engine::new(context).unwrap()
    }

    fn default_engine() -> Engine {
        engine(MathOptions::default())
    }

    #[test]
    fn test_inline_dollar() {
        assert_eq!(
            default_engine().cook("area $a < b$ here"),
            r#"<p>area <span class="math">a &lt; b</span> here</p>"#
        );
    }

    #[test]
    fn test_escaped_dollars_stay_text() {
        assert_eq!(default_engine().cook(r"\$x\$"), "<p>$x$</p>");
    }

    #[test]
    fn test_prices_stay_text() {
        assert_eq!(default_engine().cook("costs $5 and $10"), "<p>costs $5 and $10</p>");
    }

    #[test]
    fn test_bracket_inline() {
        assert_eq!(
            default_engine().cook(r"so \(x^2\) works"),
            r#"<p>so <span class="math">x^2</span> works</p>"#
        );
    }

    #[test]
    fn test_bracket_disabled() {
        let engine = engine(MathOptions {
            bracket_delimiters: false,
            ..MathOptions::default()
        });
        assert_eq!(engine.cook(r"\(x\)"), "<p>(x)</p>");
    }

    #[test]
    fn test_block_multiline() {
        assert_eq!(
            default_engine().cook("$$\nx^2\n$$\n\nafter"),
            "<div class=\"math\">\nx^2\n</div>\n<p>after</p>"
        );
    }

    #[test]
    fn test_block_single_line() {
        assert_eq!(
            default_engine().cook("$$x^2$$"),
            "<div class=\"math\">\nx^2\n</div>"
        );
    }

    #[test]
    fn test_block_unterminated() {
        assert_eq!(
            default_engine().cook("$$\na\nb"),
            "<div class=\"math\">\na\nb\n</div>"
        );
    }

    #[test]
    fn test_empty_single_line_block_is_paragraph() {
        assert_eq!(default_engine().cook("$$ $$"), "<p>$$ $$</p>");
    }

    #[test]
    fn test_bracket_block() {
        assert_eq!(
            default_engine().cook("\\[\n\\sum x\n\\]"),
            "<div class=\"math\">\n\\sum x\n</div>"
        );
    }

    #[test]
    fn test_asciimath() {
        let engine = engine(MathOptions {
            asciimath: true,
            ..MathOptions::default()
        });
        assert_eq!(
            engine.cook("see %sum_(i=1)^n i% now"),
            r#"<p>see <span class="asciimath">sum_(i=1)^n i</span> now</p>"#
        );
    }

    #[test]
    fn test_asciimath_off_by_default() {
        assert_eq!(default_engine().cook("50% and %x%"), "<p>50% and %x%</p>");
    }
}
