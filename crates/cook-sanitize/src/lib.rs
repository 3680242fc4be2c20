//! Allow-list driven HTML sanitization.
//!
//! Cooked markup is rendered to HTML first and sanitized afterwards. Anything
//! not explicitly permitted by an [`AllowList`] is stripped by the
//! [`Sanitizer`].
//!
//! # Example
//!
//! ```
//! use cook_sanitize::{AllowList, Sanitizer};
//!
//! let mut allow_list = AllowList::new();
//! allow_list.allow("span.math").unwrap();
//!
//! let sanitizer = Sanitizer::new(allow_list);
//! let html = sanitizer.sanitize(r#"<span class="math">x</span><script>evil()</script>"#);
//! assert_eq!(html, r#"<span class="math">x</span>"#);
//! ```
//!
//! The allow-list is moved into the sanitizer, so it cannot be extended once
//! sanitization has started.

mod allow_list;
mod sanitizer;

pub use allow_list::{AllowList, AttrPattern, Selector};
pub use sanitizer::Sanitizer;

/// Allow-list errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SanitizeError {
    /// Selector syntax could not be parsed.
    #[error("Invalid allow-list selector `{selector}`: {reason}")]
    InvalidSelector {
        /// The selector as given.
        selector: String,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// Tag whose content is always removed.
    #[error("Tag `{0}` can never be allow-listed")]
    ForbiddenTag(String),
}
