//! Extensible markup cooking pipeline.
//!
//! Raw post markup goes in, sanitized HTML comes out. The pipeline is:
//!
//! 1. Block rules split the source into block tokens; inline rules fill the
//!    children of every `inline` token.
//! 2. Core rules rewrite the complete token stream (typography, bare links,
//!    link previews).
//! 3. Render rules turn tokens into HTML. Trusted fragments the sanitizer
//!    must not touch are hoisted out behind opaque keys.
//! 4. The sanitizer filters the HTML against the engine's allow-list.
//! 5. Hoisted fragments are put back and the result is trimmed.
//!
//! # Architecture
//!
//! Grammar lives in named, ordered [`Ruler`]s. Features register rules,
//! render rules and allow-list entries through [`EngineBuilder`] while the
//! engine is being built; the finished [`Engine`] is immutable and shared
//! between cook calls.
//!
//! - [`features`]: built-in math, spoiler, details, typographer, linkify and
//!   onebox features
//! - [`delimiter`]: shared delimiter matchers for custom syntax
//! - [`media`]: image, video, audio and attachment label handling
//!
//! # Example
//!
//! ```
//! use cook_engine::{Engine, RenderContext};
//!
//! let engine = Engine::new(RenderContext::default().with_features(["spoiler"])).unwrap();
//!
//! assert_eq!(
//!     engine.cook("[spoiler]plot twist[/spoiler] <script>x()</script>"),
//!     r#"<p><span class="spoiler">plot twist</span> </p>"#
//! );
//! ```

mod bbcode;
mod block;
mod context;
pub mod delimiter;
mod engine;
mod error;
pub mod features;
mod hoist;
mod inline;
pub mod media;
mod render;
mod ruler;
mod token;

pub use bbcode::{BbcodeRuleFn, BbcodeTag, BbcodeWrap};
pub use block::{BlockRuleFn, BlockState};
pub use context::{CookEnv, Features, MathOptions, Quotes, RenderContext, parse_tlds};
pub use engine::{CoreRuleFn, CoreState, Engine, EngineBuilder, Feature, cook};
pub use error::{EngineError, RulerError};
pub use hoist::HoistMap;
pub use inline::{InlineRuleFn, InlineState};
pub use render::{RenderEnv, RenderRuleFn, Renderer, escape_html, render_as_text, render_attrs};
pub use ruler::{Rule, Ruler};
pub use token::{Nesting, Token, TokenKind};

pub use cook_sanitize::{AllowList, Sanitizer};
