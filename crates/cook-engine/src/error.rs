//! Engine error types.
//!
//! Only misconfiguration is an error. Malformed user markup always degrades
//! to literal text.

use cook_sanitize::SanitizeError;

/// Rule registry error.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RulerError {
    /// A rule with the same name is already registered.
    #[error("{ruler} ruler already has a rule named `{name}`")]
    Duplicate {
        /// Ruler the rule was pushed into.
        ruler: &'static str,
        /// Rule name.
        name: String,
    },
    /// Anchor rule for `before`/`after` does not exist.
    #[error("{ruler} ruler has no rule named `{name}`")]
    UnknownRule {
        /// Ruler that was searched.
        ruler: &'static str,
        /// Missing rule name.
        name: String,
    },
}

/// Engine construction error.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Rule registration failed.
    #[error("{0}")]
    Ruler(#[from] RulerError),
    /// Allow-list registration failed.
    #[error("{0}")]
    AllowList(#[from] SanitizeError),
    /// Feature setup failed for a reason of its own.
    #[error("Feature `{feature}`: {message}")]
    Feature {
        /// Feature name.
        feature: String,
        /// What went wrong.
        message: String,
    },
}
