//! Hoisting: trusted HTML that bypasses the sanitizer.
//!
//! A renderer that produces trusted markup stores it under an opaque key and
//! emits only the key. The sanitizer sees plain text; afterwards every key
//! is swapped back for its markup.

use std::collections::HashMap;

use uuid::Uuid;

/// Key prefix. Keys are alphanumeric so sanitization never alters them.
const KEY_PREFIX: &str = "hoisted";

/// Per-cook store of hoisted fragments.
#[derive(Debug, Default)]
pub struct HoistMap {
    entries: HashMap<String, String>,
}

impl HoistMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store trusted HTML and return the key to emit in its place.
    ///
    /// Empty content stores nothing and returns an empty key. The content is
    /// never sanitized: it must not contain unescaped user text.
    pub fn hoist(&mut self, content: impl Into<String>) -> String {
        let content = content.into();
        if content.is_empty() {
            return String::new();
        }
        let key = format!("{KEY_PREFIX}{}", Uuid::new_v4().simple());
        self.entries.insert(key.clone(), content);
        key
    }

    /// Replace every hoisted key in `html` with its content.
    ///
    /// Substitution repeats until a pass replaces nothing, so fragments
    /// hoisted inside other fragments are restored too. Keys that no longer
    /// occur (their host element was stripped) are discarded. The map is
    /// empty afterwards.
    pub fn unhoist(&mut self, html: &mut String) {
        let mut passes = 0usize;
        loop {
            let mut substituted = false;
            self.entries.retain(|key, content| {
                if html.contains(key.as_str()) {
                    *html = html.replace(key.as_str(), content.as_str());
                    substituted = true;
                    false
                } else {
                    true
                }
            });
            passes += 1;
            if !substituted || self.entries.is_empty() {
                break;
            }
        }

        if !self.entries.is_empty() {
            tracing::debug!(
                dropped = self.entries.len(),
                passes,
                "Discarding hoisted fragments missing from sanitized output"
            );
            self.entries.clear();
        }
    }

    /// Number of stored fragments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
