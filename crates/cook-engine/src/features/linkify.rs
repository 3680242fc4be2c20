//! Bare links in text: `https://…`, `www.…` and `example.com`.
//!
//! Scheme-less links are only recognised for the configured top-level
//! domains.

use std::sync::OnceLock;

use regex::Regex;

use crate::engine::{CoreState, EngineBuilder, Feature};
use crate::error::EngineError;
use crate::token::{Nesting, Token, TokenKind};

fn link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)https?://[^\s<>]+|(?:[a-z0-9](?:[a-z0-9\-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}(?:[/?#][^\s<>]*)?",
        )
        .expect("valid regex")
    })
}

/// The `linkify` feature.
#[derive(Clone, Copy, Debug, Default)]
pub struct Linkify;

impl Feature for Linkify {
    fn name(&self) -> &'static str {
        "linkify"
    }

    fn setup(&self, builder: &mut EngineBuilder) -> Result<(), EngineError> {
        let tlds = builder.context().linkify_tlds.clone();
        builder.core.push(
            "linkify",
            Box::new(move |state: &mut CoreState<'_>| {
                for token in &mut state.tokens {
                    if token.kind == TokenKind::Inline {
                        let children = std::mem::take(&mut token.children);
                        token.children = linkify_children(children, &tlds);
                    }
                }
            }),
        )?;
        Ok(())
    }
}

/// Split text tokens around bare links, skipping text inside HTML anchors.
fn linkify_children(children: Vec<Token>, tlds: &[String]) -> Vec<Token> {
    let mut out = Vec::with_capacity(children.len());
    let mut html_anchor_depth = 0usize;

    for token in children {
        match token.kind {
            TokenKind::HtmlInline => {
                let tag = token.content.to_ascii_lowercase();
                if tag.starts_with("<a ") || tag == "<a>" {
                    html_anchor_depth += 1;
                } else if tag.starts_with("</a") {
                    html_anchor_depth = html_anchor_depth.saturating_sub(1);
                }
                out.push(token);
            }
            TokenKind::Text if html_anchor_depth == 0 => {
                split_links(&token.content, tlds, &mut out);
            }
            _ => out.push(token),
        }
    }
    out
}

fn split_links(text: &str, tlds: &[String], out: &mut Vec<Token>) {
    let mut last = 0;
    for found in link_regex().find_iter(text) {
        let Some((href, len)) = accept(text, found.start(), found.as_str(), tlds) else {
            continue;
        };
        if found.start() < last {
            continue;
        }
        let end = found.start() + len;
        if found.start() > last {
            out.push(Token::text(&text[last..found.start()]));
        }
        let label = &text[found.start()..end];
        let mut link = Token::new(TokenKind::Link, "a", Nesting::SelfClosing)
            .with_content(label)
            .with_info("linkify");
        link.set_attr("href", href);
        link.children = vec![Token::text(label)];
        out.push(link);
        last = end;
    }
    if last < text.len() {
        out.push(Token::text(&text[last..]));
    }
}

/// Validate a candidate, returning its href and trimmed length.
fn accept(text: &str, start: usize, candidate: &str, tlds: &[String]) -> Option<(String, usize)> {
    if let Some(before) = text[..start].chars().next_back()
        && (before.is_alphanumeric() || matches!(before, '@' | '.' | '/' | ':' | '-' | '_'))
    {
        return None;
    }
    let trimmed = trim_trailing(candidate);
    if text[start + trimmed.len()..].starts_with('@') {
        return None;
    }

    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        if trimmed.len() <= lower.find("//").map_or(0, |at| at + 2) {
            return None;
        }
        return Some((trimmed.to_owned(), trimmed.len()));
    }

    let host = lower.split(['/', '?', '#']).next().unwrap_or_default();
    let tld = host.rsplit('.').next().unwrap_or_default();
    tlds.iter()
        .any(|allowed| allowed == tld)
        .then(|| (format!("http://{trimmed}"), trimmed.len()))
}

/// Drop trailing punctuation and unbalanced closing parentheses.
fn trim_trailing(candidate: &str) -> &str {
    let mut end = candidate.len();
    loop {
        let current = &candidate[..end];
        let Some(last) = current.chars().next_back() else {
            break;
        };
        let drop = match last {
            '.' | ',' | ':' | ';' | '!' | '?' | '\'' | '"' | '*' | '_' => true,
            ')' => current.matches(')').count() > current.matches('(').count(),
            _ => false,
        };
        if !drop {
            break;
        }
        end -= last.len_utf8();
    }
    &candidate[..end]
}
