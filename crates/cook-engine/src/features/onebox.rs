//! Link previews: a paragraph holding nothing but a link becomes the
//! host-supplied preview for that URL.
//!
//! Previews come from [`CookEnv::link_previews`](crate::CookEnv) and are
//! trusted HTML produced by the host, so they are emitted as `html_raw`.

use crate::engine::{CoreState, EngineBuilder, Feature};
use crate::error::EngineError;
use crate::token::{Token, TokenKind};

/// The `onebox` feature.
#[derive(Clone, Copy, Debug, Default)]
pub struct Onebox;

impl Feature for Onebox {
    fn name(&self) -> &'static str {
        "onebox"
    }

    fn setup(&self, builder: &mut EngineBuilder) -> Result<(), EngineError> {
        builder.core.push("onebox", Box::new(apply_previews))?;
        Ok(())
    }
}

fn apply_previews(state: &mut CoreState<'_>) {
    if state.cook.link_previews.is_empty() {
        return;
    }

    let tokens = std::mem::take(&mut state.tokens);
    let mut out = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();

    while let Some(token) = iter.next() {
        if token.kind != TokenKind::ParagraphOpen {
            out.push(token);
            continue;
        }
        let preview = iter
            .peek()
            .and_then(|inline| lone_url(inline))
            .and_then(|url| state.cook.link_previews.get(url))
            .cloned();
        let Some(preview) = preview else {
            out.push(token);
            continue;
        };

        // Skip the inline and closing tokens the preview replaces.
        iter.next();
        iter.next_if(|close| close.kind == TokenKind::ParagraphClose);

        let (start, end) = token.lines.unwrap_or_default();
        tracing::debug!(line = start, "Replacing link paragraph with preview");
        out.push(Token::html_raw(preview).with_lines(start, end));
    }

    state.tokens = out;
}

/// URL of an inline token whose only content is a link or a bare URL.
fn lone_url(inline: &Token) -> Option<&str> {
    if inline.kind != TokenKind::Inline {
        return None;
    }
    match inline.children.as_slice() {
        [link] if link.kind == TokenKind::Link => {
            let href = link.attr("href")?;
            let text = link.content.as_str();
            (!link.info.is_empty() || text == href).then_some(href)
        }
        [text] if text.kind == TokenKind::Text => {
            let url = text.content.trim();
            let is_url = (url.starts_with("https://") || url.starts_with("http://"))
                && !url.contains(char::is_whitespace);
            is_url.then_some(url)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::context::{CookEnv, RenderContext};
    use crate::engine::Engine;

    fn engine() -> Engine {
        Engine::new(RenderContext::default().with_features(["onebox"])).unwrap()
    }

    fn env() -> CookEnv {
        let mut env = CookEnv::default();
        env.link_previews.insert(
            "https://example.com/t/1".to_owned(),
            r#"<aside class="onebox"><script>trusted()</script></aside>"#.to_owned(),
        );
        env
    }

    #[test]
    fn test_bare_url_paragraph_replaced() {
        assert_eq!(
            engine().cook_with("before\n\nhttps://example.com/t/1\n\nafter", &env()),
            "<p>before</p>\n<aside class=\"onebox\"><script>trusted()</script></aside>\n<p>after</p>"
        );
    }

    #[test]
    fn test_autolink_paragraph_replaced() {
        assert_eq!(
            engine().cook_with("<https://example.com/t/1>", &env()),
            r#"<aside class="onebox"><script>trusted()</script></aside>"#
        );
    }

    #[test]
    fn test_url_inside_sentence_untouched() {
        assert_eq!(
            engine().cook_with("see https://example.com/t/1", &env()),
            "<p>see https://example.com/t/1</p>"
        );
    }

    #[test]
    fn test_unknown_url_untouched() {
        assert_eq!(
            engine().cook_with("https://example.com/other", &env()),
            "<p>https://example.com/other</p>"
        );
    }
}
