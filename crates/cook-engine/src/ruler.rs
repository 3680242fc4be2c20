//! Ordered, named rule registry with a tag-indexed lookup cache.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::error::RulerError;

/// A named entry in a [`Ruler`].
pub struct Rule<F> {
    name: String,
    tag: Option<String>,
    handler: F,
}

impl<F> Rule<F> {
    /// Rule name, unique within its ruler.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tag this rule handles, if any.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// The rule itself.
    #[must_use]
    pub fn handler(&self) -> &F {
        &self.handler
    }
}

/// Ordered list of named rules.
///
/// Evaluation order is list order. Rules appended with [`push`](Self::push)
/// go to the end; [`before`](Self::before) and [`after`](Self::after) insert
/// relative to an existing rule.
///
/// Rules pushed with [`push_for_tag`](Self::push_for_tag) are also reachable
/// through [`rule_for_tag`](Self::rule_for_tag). The tag cache is derived
/// lazily and dropped on every mutation, so lookups never observe a stale
/// mapping.
///
/// # Example
///
/// ```
/// use cook_engine::Ruler;
///
/// let mut ruler: Ruler<&str> = Ruler::new("bbcode");
/// ruler.push_for_tag("quote", "quote", "first").unwrap();
/// ruler.push_for_tag("fancy-quote", "quote", "second").unwrap();
///
/// assert_eq!(ruler.rule_for_tag("quote").map(|r| *r.handler()), Some("second"));
/// assert!(ruler.rule_for_tag("poll").is_none());
/// ```
pub struct Ruler<F> {
    name: &'static str,
    rules: Vec<Rule<F>>,
    tag_cache: OnceLock<HashMap<String, usize>>,
}

impl<F> Ruler<F> {
    /// Create an empty ruler. The name only appears in errors and logs.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            rules: Vec::new(),
            tag_cache: OnceLock::new(),
        }
    }

    /// Ruler name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Append a rule.
    pub fn push(&mut self, name: impl Into<String>, handler: F) -> Result<(), RulerError> {
        let index = self.rules.len();
        self.insert(index, name.into(), None, handler)
    }

    /// Append a rule that handles `tag`.
    pub fn push_for_tag(
        &mut self,
        name: impl Into<String>,
        tag: impl Into<String>,
        handler: F,
    ) -> Result<(), RulerError> {
        let index = self.rules.len();
        self.insert(index, name.into(), Some(tag.into()), handler)
    }

    /// Insert a rule directly before `anchor`.
    pub fn before(
        &mut self,
        anchor: &str,
        name: impl Into<String>,
        handler: F,
    ) -> Result<(), RulerError> {
        let index = self.position(anchor)?;
        self.insert(index, name.into(), None, handler)
    }

    /// Insert a rule directly after `anchor`.
    pub fn after(
        &mut self,
        anchor: &str,
        name: impl Into<String>,
        handler: F,
    ) -> Result<(), RulerError> {
        let index = self.position(anchor)?;
        self.insert(index + 1, name.into(), None, handler)
    }

    /// All rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[Rule<F>] {
        &self.rules
    }

    /// Find a rule by name.
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&Rule<F>> {
        self.rules.iter().find(|rule| rule.name == name)
    }

    /// Rule responsible for `tag`.
    ///
    /// When several rules handle the same tag, the one nearest the end of
    /// the list wins. `None` means no custom handling.
    #[must_use]
    pub fn rule_for_tag(&self, tag: &str) -> Option<&Rule<F>> {
        let cache = self.tag_cache.get_or_init(|| {
            let mut cache = HashMap::new();
            for (index, rule) in self.rules.iter().enumerate().rev() {
                if let Some(tag) = &rule.tag {
                    cache.entry(tag.clone()).or_insert(index);
                }
            }
            cache
        });
        cache.get(tag).map(|&index| &self.rules[index])
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if the ruler has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn position(&self, anchor: &str) -> Result<usize, RulerError> {
        self.rules
            .iter()
            .position(|rule| rule.name == anchor)
            .ok_or_else(|| RulerError::UnknownRule {
                ruler: self.name,
                name: anchor.to_owned(),
            })
    }

    fn insert(
        &mut self,
        index: usize,
        name: String,
        tag: Option<String>,
        handler: F,
    ) -> Result<(), RulerError> {
        if self.rule(&name).is_some() {
            return Err(RulerError::Duplicate {
                ruler: self.name,
                name,
            });
        }
        tracing::trace!(ruler = self.name, rule = %name, index, "Registering rule");
        self.rules.insert(index, Rule { name, tag, handler });
        self.tag_cache = OnceLock::new();
        Ok(())
    }
}

impl<F> fmt::Debug for Ruler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ruler")
            .field("name", &self.name)
            .field(
                "rules",
                &self.rules.iter().map(|rule| &rule.name).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names<F>(ruler: &Ruler<F>) -> Vec<&str> {
        ruler.rules().iter().map(Rule::name).collect()
    }

    #[test]
    fn test_push_keeps_order() {
        let mut ruler = Ruler::new("inline");
        ruler.push("escape", 1).unwrap();
        ruler.push("text", 2).unwrap();
        assert_eq!(names(&ruler), vec!["escape", "text"]);
        assert_eq!(ruler.len(), 2);
    }

    #[test]
    fn test_before_and_after() {
        let mut ruler = Ruler::new("inline");
        ruler.push("escape", 0).unwrap();
        ruler.push("text", 0).unwrap();
        ruler.after("escape", "math", 0).unwrap();
        ruler.before("escape", "math_bracket", 0).unwrap();
        assert_eq!(names(&ruler), vec!["math_bracket", "escape", "math", "text"]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut ruler = Ruler::new("block");
        ruler.push("fence", 0).unwrap();
        assert_eq!(
            ruler.push("fence", 1),
            Err(RulerError::Duplicate {
                ruler: "block",
                name: "fence".to_owned()
            })
        );
        assert_eq!(ruler.len(), 1);
    }

    #[test]
    fn test_unknown_anchor_rejected() {
        let mut ruler: Ruler<i32> = Ruler::new("block");
        let err = ruler.after("missing", "math", 0).unwrap_err();
        assert!(matches!(err, RulerError::UnknownRule { .. }));
        assert!(ruler.is_empty());
    }

    #[test]
    fn test_rule_for_tag_most_recent_wins() {
        let mut ruler = Ruler::new("bbcode_block");
        ruler.push_for_tag("quote-a", "quote", 'a').unwrap();
        ruler.push_for_tag("details", "details", 'd').unwrap();
        ruler.push_for_tag("quote-b", "quote", 'b').unwrap();

        assert_eq!(ruler.rule_for_tag("quote").map(|r| *r.handler()), Some('b'));
        assert_eq!(ruler.rule_for_tag("details").map(Rule::name), Some("details"));
    }

    #[test]
    fn test_cache_invalidated_on_push() {
        let mut ruler = Ruler::new("bbcode_inline");
        ruler.push_for_tag("spoiler-a", "spoiler", 1).unwrap();
        assert_eq!(ruler.rule_for_tag("spoiler").map(|r| *r.handler()), Some(1));

        ruler.push_for_tag("spoiler-b", "spoiler", 2).unwrap();
        assert_eq!(ruler.rule_for_tag("spoiler").map(|r| *r.handler()), Some(2));
    }

    #[test]
    fn test_unknown_tag_is_none() {
        let mut ruler = Ruler::new("bbcode_inline");
        ruler.push("untagged", 0).unwrap();
        assert!(ruler.rule_for_tag("untagged").is_none());
        assert!(ruler.rule_for_tag("").is_none());
    }
}
