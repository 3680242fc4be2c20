//! Smart punctuation: curly quotes, dashes and ellipses in text.

use crate::context::Quotes;
use crate::engine::{CoreState, EngineBuilder, Feature};
use crate::error::EngineError;
use crate::token::{Token, TokenKind};

/// The `typographer` feature.
#[derive(Clone, Copy, Debug, Default)]
pub struct Typographer;

impl Feature for Typographer {
    fn name(&self) -> &'static str {
        "typographer"
    }

    fn setup(&self, builder: &mut EngineBuilder) -> Result<(), EngineError> {
        let quotes = builder.context().quotes.clone();
        builder.core.push(
            "typographer",
            Box::new(move |state: &mut CoreState<'_>| {
                for token in &mut state.tokens {
                    if token.kind == TokenKind::Inline {
                        let mut prev = None;
                        smarten(&mut token.children, &quotes, &mut prev);
                    }
                }
            }),
        )?;
        Ok(())
    }
}

fn smarten(tokens: &mut [Token], quotes: &Quotes, prev: &mut Option<char>) {
    for token in tokens {
        match token.kind {
            TokenKind::Text => {
                token.content = replace_punctuation(&token.content, quotes, prev);
            }
            TokenKind::Link if token.info.is_empty() => smarten(&mut token.children, quotes, prev),
            TokenKind::Softbreak | TokenKind::Hardbreak => *prev = Some('\n'),
            _ => {
                if let Some(last) = token.content.chars().next_back() {
                    *prev = Some(last);
                }
            }
        }
    }
}

/// Characters after which a quote opens.
fn opens_after(prev: Option<char>) -> bool {
    prev.is_none_or(|c| {
        c.is_whitespace() || matches!(c, '(' | '[' | '{' | '-' | '\u{2013}' | '\u{2014}')
    })
}

fn replace_punctuation(text: &str, quotes: &Quotes, prev: &mut Option<char>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                out.push_str(if opens_after(*prev) {
                    &quotes.double_open
                } else {
                    &quotes.double_close
                });
            }
            '\'' => {
                let apostrophe = prev.is_some_and(char::is_alphanumeric);
                out.push_str(if !apostrophe && opens_after(*prev) {
                    &quotes.single_open
                } else {
                    &quotes.single_close
                });
            }
            '-' if chars.peek() == Some(&'-') => {
                let mut count = 1;
                while chars.next_if_eq(&'-').is_some() {
                    count += 1;
                }
                out.push_str(&dashes(count));
            }
            '.' if chars.peek() == Some(&'.') => {
                chars.next();
                if chars.next_if_eq(&'.').is_some() {
                    out.push('\u{2026}');
                } else {
                    out.push_str("..");
                }
            }
            _ => out.push(c),
        }
        *prev = out.chars().next_back();
    }
    out
}

/// Split a run of hyphens into em and en dashes.
fn dashes(count: usize) -> String {
    let (ens, ems) = if count % 3 == 0 {
        (0, count / 3)
    } else if count % 2 == 0 {
        (count / 2, 0)
    } else if count % 3 == 2 {
        (1, (count - 2) / 3)
    } else {
        (2, (count - 4) / 3)
    };
    let mut out = "\u{2014}".repeat(ems);
    out.push_str(&"\u{2013}".repeat(ens));
    out
}
