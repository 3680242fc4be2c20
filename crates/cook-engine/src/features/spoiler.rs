//! `[spoiler]…[/spoiler]`: content hidden until clicked.

use crate::bbcode::{BbcodeTag, BbcodeWrap};
use crate::engine::{EngineBuilder, Feature};
use crate::error::EngineError;

/// The `spoiler` feature.
#[derive(Clone, Copy, Debug, Default)]
pub struct Spoiler;

impl Feature for Spoiler {
    fn name(&self) -> &'static str {
        "spoiler"
    }

    fn setup(&self, builder: &mut EngineBuilder) -> Result<(), EngineError> {
        builder
            .bbcode_inline
            .push_for_tag("spoiler", "spoiler", Box::new(inline_spoiler))?;
        builder
            .bbcode_block
            .push_for_tag("spoiler", "spoiler", Box::new(block_spoiler))?;
        builder.allow_list.allow_all(["span.spoiler", "div.spoiler"])?;
        Ok(())
    }
}

fn inline_spoiler(_tag: &BbcodeTag) -> Option<BbcodeWrap> {
    Some(BbcodeWrap::new("span").with_attr("class", "spoiler"))
}

fn block_spoiler(_tag: &BbcodeTag) -> Option<BbcodeWrap> {
    Some(BbcodeWrap::new("div").with_attr("class", "spoiler"))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::context::RenderContext;
    use crate::engine::Engine;

    fn engine() -> Engine {
        Engine::new(RenderContext::default().with_features(["spoiler"])).unwrap()
    }

    #[test]
    fn test_inline_spoiler() {
        assert_eq!(
            engine().cook("the butler [spoiler]did *it*[/spoiler]!"),
            r#"<p>the butler <span class="spoiler">did <em>it</em></span>!</p>"#
        );
    }

    #[test]
    fn test_block_spoiler() {
        assert_eq!(
            engine().cook("[spoiler]\nfirst\n\nsecond\n[/spoiler]"),
            "<div class=\"spoiler\">\n<p>first</p>\n<p>second</p>\n</div>"
        );
    }

    #[test]
    fn test_unclosed_spoiler_is_text() {
        assert_eq!(engine().cook("[spoiler]open"), "<p>[spoiler]open</p>");
    }

    #[test]
    fn test_spoiler_disabled() {
        let engine = Engine::new(RenderContext::default()).unwrap();
        assert_eq!(engine.cook("[spoiler]x[/spoiler]"), "<p>[spoiler]x[/spoiler]</p>");
    }
}
