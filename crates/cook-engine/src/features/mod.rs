//! Built-in features.
//!
//! Each feature registers its rules when its name is enabled in the render
//! context. Plugins implement the same [`Feature`] trait.

mod details;
mod linkify;
mod math;
mod onebox;
mod spoiler;
mod typographer;

pub use details::Details;
pub use linkify::Linkify;
pub use math::Math;
pub use onebox::Onebox;
pub use spoiler::Spoiler;
pub use typographer::Typographer;

use crate::engine::Feature;

/// Names of the built-in features, in setup order.
pub const BUILTIN_FEATURES: &[&str] = &[
    "details",
    "linkify",
    "math",
    "onebox",
    "spoiler",
    "typographer",
];

/// All built-in features, in setup order.
#[must_use]
pub fn builtin_features() -> Vec<Box<dyn Feature>> {
    vec![
        Box::new(Details),
        Box::new(Linkify),
        Box::new(Math),
        Box::new(Onebox),
        Box::new(Spoiler),
        Box::new(Typographer),
    ]
}
