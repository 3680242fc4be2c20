//! Allow-list entries and selector parsing.
//!
//! Selectors use a small CSS-like syntax:
//!
//! - `tag` - the element itself
//! - `tag.class` - the element with the given class (classes accumulate)
//! - `tag[attr]` - any value of `attr`
//! - `tag[attr=value]` - only the given value of `attr`
//! - `tag[data-*]` - any `data-` attribute
//!
//! Brackets can be chained: `img[src][alt]`.

use std::collections::{BTreeMap, BTreeSet};

use crate::SanitizeError;

/// Tags whose content is dropped together with the tag.
pub(crate) const FORBIDDEN_TAGS: &[&str] = &["script", "style"];

/// Attribute part of a selector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttrPattern {
    /// `[name]`
    Any(String),
    /// `[name=value]`
    Value(String, String),
    /// `[data-*]`
    DataWildcard,
}

/// Parsed allow-list selector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    /// Element name, lower-cased.
    pub tag: String,
    /// Classes from `.class` parts.
    pub classes: Vec<String>,
    /// Attribute patterns from `[...]` parts.
    pub attrs: Vec<AttrPattern>,
}

impl Selector {
    /// Parse a selector string.
    ///
    /// # Example
    ///
    /// ```
    /// use cook_sanitize::{AttrPattern, Selector};
    ///
    /// let selector = Selector::parse("a[href][data-*]").unwrap();
    /// assert_eq!(selector.tag, "a");
    /// assert_eq!(selector.attrs[1], AttrPattern::DataWildcard);
    /// ```
    pub fn parse(selector: &str) -> Result<Self, SanitizeError> {
        let invalid = |reason| SanitizeError::InvalidSelector {
            selector: selector.to_owned(),
            reason,
        };

        let trimmed = selector.trim();
        let tag_end = trimmed
            .find(|c: char| c == '.' || c == '[')
            .unwrap_or(trimmed.len());
        let tag = &trimmed[..tag_end];
        if !is_valid_name(tag) {
            return Err(invalid("tag name must be alphanumeric"));
        }

        let mut parsed = Self {
            tag: tag.to_ascii_lowercase(),
            classes: Vec::new(),
            attrs: Vec::new(),
        };

        let mut rest = &trimmed[tag_end..];
        while !rest.is_empty() {
            if let Some(after_dot) = rest.strip_prefix('.') {
                let end = after_dot
                    .find(|c: char| c == '.' || c == '[')
                    .unwrap_or(after_dot.len());
                let class = &after_dot[..end];
                if class.is_empty() || !class.chars().all(is_class_char) {
                    return Err(invalid("class name is empty or malformed"));
                }
                parsed.classes.push(class.to_owned());
                rest = &after_dot[end..];
            } else if let Some(after_bracket) = rest.strip_prefix('[') {
                let end = after_bracket
                    .find(']')
                    .ok_or_else(|| invalid("unclosed attribute bracket"))?;
                parsed
                    .attrs
                    .push(parse_attr(&after_bracket[..end]).ok_or_else(|| {
                        invalid("attribute must be `name`, `name=value` or `data-*`")
                    })?);
                rest = &after_bracket[end + 1..];
            } else {
                return Err(invalid("unexpected character after tag"));
            }
        }

        Ok(parsed)
    }
}

fn parse_attr(inner: &str) -> Option<AttrPattern> {
    let inner = inner.trim();
    if inner == "data-*" {
        return Some(AttrPattern::DataWildcard);
    }
    match inner.split_once('=') {
        Some((name, value)) => {
            let name = name.trim();
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            is_valid_attr_name(name)
                .then(|| AttrPattern::Value(name.to_ascii_lowercase(), value.to_owned()))
        }
        None => is_valid_attr_name(inner).then(|| AttrPattern::Any(inner.to_ascii_lowercase())),
    }
}

fn is_valid_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric())
}

fn is_valid_attr_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'))
}

fn is_class_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Which classes survive on an element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum ClassRule {
    #[default]
    None,
    Listed(BTreeSet<String>),
    Any,
}

/// Permissions for one element.
#[derive(Clone, Debug, Default)]
pub(crate) struct TagRule {
    pub(crate) attributes: BTreeSet<String>,
    pub(crate) values: BTreeMap<String, BTreeSet<String>>,
    pub(crate) classes: ClassRule,
    pub(crate) data_attributes: bool,
}

/// Set of permitted elements and attributes.
///
/// Features contribute entries while the engine is built. Once handed to
/// [`Sanitizer::new`](crate::Sanitizer::new) the list is frozen.
#[derive(Clone, Debug, Default)]
pub struct AllowList {
    pub(crate) tags: BTreeMap<String, TagRule>,
}

impl AllowList {
    /// Create an empty allow-list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Permit everything the selector describes.
    ///
    /// Entries merge: allowing `span.math` and later `span.spoiler` permits
    /// both classes.
    pub fn allow(&mut self, selector: &str) -> Result<(), SanitizeError> {
        let selector = Selector::parse(selector)?;
        if FORBIDDEN_TAGS.contains(&selector.tag.as_str()) {
            return Err(SanitizeError::ForbiddenTag(selector.tag));
        }

        let rule = self.tags.entry(selector.tag).or_default();
        for class in selector.classes {
            rule.allow_class(class);
        }
        for attr in selector.attrs {
            match attr {
                AttrPattern::DataWildcard => rule.data_attributes = true,
                AttrPattern::Any(name) if name == "class" => rule.classes = ClassRule::Any,
                AttrPattern::Any(name) => {
                    rule.values.remove(&name);
                    rule.attributes.insert(name);
                }
                AttrPattern::Value(name, value) if name == "class" => rule.allow_class(value),
                AttrPattern::Value(name, value) => {
                    if !rule.attributes.contains(&name) {
                        rule.values.entry(name).or_default().insert(value);
                    }
                }
            }
        }
        Ok(())
    }

    /// Permit every selector in order, stopping at the first invalid one.
    pub fn allow_all<I, S>(&mut self, selectors: I) -> Result<(), SanitizeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        selectors
            .into_iter()
            .try_for_each(|selector| self.allow(selector.as_ref()))
    }

    /// Check whether an element is permitted at all.
    #[must_use]
    pub fn permits_tag(&self, tag: &str) -> bool {
        self.tags.contains_key(&tag.to_ascii_lowercase())
    }

    /// Check whether an attribute (any value) is permitted on an element.
    #[must_use]
    pub fn permits_attribute(&self, tag: &str, attribute: &str) -> bool {
        self.tags.get(tag).is_some_and(|rule| {
            rule.attributes.contains(attribute)
                || rule.values.contains_key(attribute)
                || (attribute == "class" && rule.classes != ClassRule::None)
                || (rule.data_attributes && attribute.starts_with("data-"))
        })
    }

    /// Number of permitted elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Check if nothing is permitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl TagRule {
    fn allow_class(&mut self, class: String) {
        match &mut self.classes {
            ClassRule::Any => {}
            ClassRule::Listed(classes) => {
                classes.insert(class);
            }
            ClassRule::None => self.classes = ClassRule::Listed(BTreeSet::from([class])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_tag() {
        let selector = Selector::parse("p").unwrap();
        assert_eq!(selector.tag, "p");
        assert!(selector.classes.is_empty());
        assert!(selector.attrs.is_empty());
    }

    #[test]
    fn test_parse_class_and_attrs() {
        let selector = Selector::parse("div.poll.open[data-*][role=region]").unwrap();
        assert_eq!(selector.tag, "div");
        assert_eq!(selector.classes, vec!["poll", "open"]);
        assert_eq!(
            selector.attrs,
            vec![
                AttrPattern::DataWildcard,
                AttrPattern::Value("role".to_owned(), "region".to_owned())
            ]
        );
    }

    #[test]
    fn test_parse_quoted_value() {
        let selector = Selector::parse(r#"img[role="presentation"]"#).unwrap();
        assert_eq!(
            selector.attrs,
            vec![AttrPattern::Value(
                "role".to_owned(),
                "presentation".to_owned()
            )]
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("span.").is_err());
        assert!(Selector::parse("a[href").is_err());
        assert!(Selector::parse("a[]").is_err());
        assert!(Selector::parse("a href").is_err());
        assert!(Selector::parse("1a").is_err());
    }

    #[test]
    fn test_forbidden_tags() {
        let mut list = AllowList::new();
        assert_eq!(
            list.allow("script"),
            Err(SanitizeError::ForbiddenTag("script".to_owned()))
        );
        assert!(list.allow("STYLE").is_err());
        assert!(list.is_empty());
    }

    #[test]
    fn test_entries_merge() {
        let mut list = AllowList::new();
        list.allow_all(["span.math", "span.spoiler", "a[href]", "a[data-*]"])
            .unwrap();

        assert_eq!(list.len(), 2);
        assert!(list.permits_tag("span"));
        assert!(list.permits_attribute("span", "class"));
        assert!(list.permits_attribute("a", "href"));
        assert!(list.permits_attribute("a", "data-download"));
        assert!(!list.permits_attribute("span", "data-x"));

        let span = &list.tags["span"];
        assert_eq!(
            span.classes,
            ClassRule::Listed(BTreeSet::from(["math".to_owned(), "spoiler".to_owned()]))
        );
    }

    #[test]
    fn test_any_class_absorbs_listed() {
        let mut list = AllowList::new();
        list.allow("div.poll").unwrap();
        list.allow("div[class]").unwrap();
        list.allow("div.other").unwrap();
        assert_eq!(list.tags["div"].classes, ClassRule::Any);
    }

    #[test]
    fn test_any_value_absorbs_listed_values() {
        let mut list = AllowList::new();
        list.allow("img[role=presentation]").unwrap();
        list.allow("img[role]").unwrap();
        list.allow("img[role=img]").unwrap();

        let img = &list.tags["img"];
        assert!(img.attributes.contains("role"));
        assert!(img.values.is_empty());
    }
}
