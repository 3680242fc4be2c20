//! `[details="Summary"]…[/details]`: collapsible sections.

use crate::bbcode::{BbcodeTag, BbcodeWrap};
use crate::engine::{EngineBuilder, Feature};
use crate::error::EngineError;
use crate::token::{Nesting, Token, TokenKind};

/// The `details` feature.
#[derive(Clone, Copy, Debug, Default)]
pub struct Details;

impl Feature for Details {
    fn name(&self) -> &'static str {
        "details"
    }

    fn setup(&self, builder: &mut EngineBuilder) -> Result<(), EngineError> {
        builder
            .bbcode_block
            .push_for_tag("details", "details", Box::new(details))?;
        builder.allow_list.allow_all(["details[open]", "summary"])?;
        Ok(())
    }
}

fn details(tag: &BbcodeTag) -> Option<BbcodeWrap> {
    let summary = tag
        .value
        .as_deref()
        .or_else(|| tag.get("summary"))
        .unwrap_or_default();

    let mut wrap = BbcodeWrap::new("details");
    if tag.get("open").is_some_and(|open| open == "true" || open == "open") {
        wrap = wrap.with_attr("open", "");
    }
    Some(wrap.with_prelude(vec![
        Token::new(TokenKind::custom("summary_open"), "summary", Nesting::Open),
        Token::text(summary),
        Token::new(TokenKind::custom("summary_close"), "summary", Nesting::Close),
    ]))
}
