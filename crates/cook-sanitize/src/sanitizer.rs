//! HTML sanitizer built on `ammonia`.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use ammonia::{Builder, UrlRelative};

use crate::allow_list::{AllowList, ClassRule, FORBIDDEN_TAGS};

/// URL schemes kept in `href`/`src` style attributes. Relative URLs always pass.
const URL_SCHEMES: &[&str] = &["http", "https", "mailto", "upload"];

/// Strips everything not permitted by an [`AllowList`].
///
/// A sanitizer is either backed by an allow-list or, when sanitization was
/// switched off by configuration, an identity pass-through. There is no
/// implicit default; callers must pick one.
#[derive(Clone, Debug)]
pub struct Sanitizer {
    mode: Mode,
}

#[derive(Clone)]
enum Mode {
    Enforce {
        allow_list: AllowList,
        cleaner: Arc<Builder<'static>>,
    },
    PassThrough,
}

impl fmt::Debug for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enforce { allow_list, .. } => f
                .debug_struct("Enforce")
                .field("allow_list", allow_list)
                .finish_non_exhaustive(),
            Self::PassThrough => f.write_str("PassThrough"),
        }
    }
}

/// Keeps `data-*` attributes only where they are permitted.
///
/// `ammonia` only knows global attribute prefixes, so per-element `data-*`
/// permissions are enforced by an attribute filter.
#[derive(Debug, Default)]
struct DataAttributeFilter {
    wildcard_tags: HashSet<String>,
    explicit: HashMap<String, HashSet<String>>,
}

impl DataAttributeFilter {
    fn from_allow_list(allow_list: &AllowList) -> Self {
        let mut filter = Self::default();
        for (tag, rule) in &allow_list.tags {
            if rule.data_attributes {
                filter.wildcard_tags.insert(tag.clone());
            }
            let explicit: HashSet<String> = rule
                .attributes
                .iter()
                .chain(rule.values.keys())
                .filter(|name| name.starts_with("data-"))
                .cloned()
                .collect();
            if !explicit.is_empty() {
                filter.explicit.insert(tag.clone(), explicit);
            }
        }
        filter
    }

    fn keeps(&self, element: &str, attribute: &str) -> bool {
        !attribute.starts_with("data-")
            || self.wildcard_tags.contains(element)
            || self
                .explicit
                .get(element)
                .is_some_and(|names| names.contains(attribute))
    }
}

impl Sanitizer {
    /// Create a sanitizer enforcing the given allow-list.
    #[must_use]
    pub fn new(allow_list: AllowList) -> Self {
        let data_filter = DataAttributeFilter::from_allow_list(&allow_list);
        tracing::debug!(
            tags = allow_list.len(),
            data_tags = data_filter.wildcard_tags.len(),
            "Sanitizer allow-list frozen"
        );
        let cleaner = Arc::new(build_cleaner(&allow_list, data_filter));
        Self {
            mode: Mode::Enforce {
                allow_list,
                cleaner,
            },
        }
    }

    /// Create an identity sanitizer.
    ///
    /// Only for trusted, server-side contexts where sanitization has been
    /// explicitly disabled in configuration.
    #[must_use]
    pub fn pass_through() -> Self {
        tracing::warn!("HTML sanitization disabled by configuration");
        Self {
            mode: Mode::PassThrough,
        }
    }

    /// Check whether this sanitizer leaves HTML untouched.
    #[must_use]
    pub fn is_pass_through(&self) -> bool {
        matches!(self.mode, Mode::PassThrough)
    }

    /// The allow-list being enforced, if any.
    #[must_use]
    pub fn allow_list(&self) -> Option<&AllowList> {
        match &self.mode {
            Mode::Enforce { allow_list, .. } => Some(allow_list),
            Mode::PassThrough => None,
        }
    }

    /// Sanitize rendered HTML.
    #[must_use]
    pub fn sanitize(&self, html: &str) -> String {
        match &self.mode {
            Mode::PassThrough => html.to_owned(),
            Mode::Enforce { cleaner, .. } => cleaner.clean(html).to_string(),
        }
    }
}

/// Intern a name for the life of the process.
///
/// `ammonia` borrows tag and attribute names for as long as its builder
/// lives. Names come from feature setup and configuration, never from cooked
/// markup.
fn intern(name: &str) -> &'static str {
    static NAMES: OnceLock<Mutex<HashSet<&'static str>>> = OnceLock::new();
    let mut names = NAMES
        .get_or_init(Mutex::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(&interned) = names.get(name) {
        return interned;
    }
    let interned: &'static str = Box::leak(name.to_owned().into_boxed_str());
    names.insert(interned);
    interned
}

fn build_cleaner(allow_list: &AllowList, data_filter: DataAttributeFilter) -> Builder<'static> {
    let mut tags = HashSet::new();
    let mut tag_attributes: HashMap<&str, HashSet<&str>> = HashMap::new();
    let mut tag_attribute_values: HashMap<&str, HashMap<&str, HashSet<&str>>> = HashMap::new();
    let mut allowed_classes: HashMap<&str, HashSet<&str>> = HashMap::new();

    for (tag, rule) in &allow_list.tags {
        let tag = intern(tag);
        tags.insert(tag);

        let mut attributes: HashSet<&str> =
            rule.attributes.iter().map(String::as_str).map(intern).collect();
        match &rule.classes {
            ClassRule::None => {}
            ClassRule::Any => {
                attributes.insert("class");
            }
            ClassRule::Listed(classes) => {
                let classes = classes.iter().map(String::as_str).map(intern).collect();
                allowed_classes.insert(tag, classes);
            }
        }
        if !attributes.is_empty() {
            tag_attributes.insert(tag, attributes);
        }

        if !rule.values.is_empty() {
            let values = rule
                .values
                .iter()
                .map(|(name, values)| {
                    let values = values.iter().map(String::as_str).map(intern).collect();
                    (intern(name), values)
                })
                .collect();
            tag_attribute_values.insert(tag, values);
        }
    }

    let mut builder = Builder::empty();
    builder
        .tags(tags)
        .clean_content_tags(FORBIDDEN_TAGS.iter().copied().collect())
        .tag_attributes(tag_attributes)
        .tag_attribute_values(tag_attribute_values)
        .allowed_classes(allowed_classes)
        .url_schemes(URL_SCHEMES.iter().copied().collect())
        .url_relative(UrlRelative::PassThrough)
        .link_rel(None)
        .strip_comments(true);

    if !data_filter.wildcard_tags.is_empty() {
        builder
            .generic_attribute_prefixes(HashSet::from(["data-"]))
            .attribute_filter(move |element, attribute, value| {
                data_filter
                    .keeps(element, attribute)
                    .then_some(Cow::Borrowed(value))
            });
    }

    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sanitizer(selectors: &[&str]) -> Sanitizer {
        let mut allow_list = AllowList::new();
        allow_list.allow_all(selectors).unwrap();
        Sanitizer::new(allow_list)
    }

    #[test]
    fn test_keeps_allowed_span_and_drops_script() {
        let s = sanitizer(&["span.math"]);
        assert_eq!(
            s.sanitize(r#"<span class="math">x</span><script>evil()</script>"#),
            r#"<span class="math">x</span>"#
        );
    }

    #[test]
    fn test_unlisted_class_removed() {
        let s = sanitizer(&["span.math"]);
        assert_eq!(
            s.sanitize(r#"<span class="math evil">x</span>"#),
            r#"<span class="math">x</span>"#
        );
    }

    #[test]
    fn test_unlisted_tag_unwrapped() {
        let s = sanitizer(&["p"]);
        assert_eq!(s.sanitize("<p><blink>hi</blink></p>"), "<p>hi</p>");
    }

    #[test]
    fn test_unlisted_attribute_removed() {
        let s = sanitizer(&["a[href]"]);
        assert_eq!(
            s.sanitize(r#"<a href="/t/1" onclick="evil()">x</a>"#),
            r#"<a href="/t/1">x</a>"#
        );
    }

    #[test]
    fn test_dangerous_scheme_removed() {
        let s = sanitizer(&["a[href]"]);
        assert_eq!(
            s.sanitize(r#"<a href="javascript:alert(1)">x</a>"#),
            "<a>x</a>"
        );
    }

    #[test]
    fn test_upload_scheme_kept() {
        let s = sanitizer(&["img[src]"]);
        assert_eq!(
            s.sanitize(r#"<img src="upload://abc.png">"#),
            r#"<img src="upload://abc.png">"#
        );
    }

    #[test]
    fn test_data_wildcard_is_per_tag() {
        let s = sanitizer(&["a[href][data-*]", "span"]);
        assert_eq!(
            s.sanitize(r#"<a href="/f" data-download="1">f</a><span data-x="1">s</span>"#),
            r#"<a href="/f" data-download="1">f</a><span>s</span>"#
        );
    }

    #[test]
    fn test_explicit_data_attribute_without_wildcard() {
        let s = sanitizer(&["img[src][data-orig-src]", "a[data-*]"]);
        assert_eq!(
            s.sanitize(r#"<img src="/a.png" data-orig-src="upload://a.png" data-other="x">"#),
            r#"<img src="/a.png" data-orig-src="upload://a.png">"#
        );
    }

    #[test]
    fn test_attribute_value_restriction() {
        let s = sanitizer(&["img[src][role=presentation]"]);
        assert_eq!(
            s.sanitize(r#"<img src="/a.png" role="presentation">"#),
            r#"<img src="/a.png" role="presentation">"#
        );
        assert_eq!(
            s.sanitize(r#"<img src="/a.png" role="button">"#),
            r#"<img src="/a.png">"#
        );
    }

    #[test]
    fn test_comments_stripped() {
        let s = sanitizer(&["p"]);
        assert_eq!(s.sanitize("<p>a<!-- hidden -->b</p>"), "<p>ab</p>");
    }

    #[test]
    fn test_pass_through_is_identity() {
        let s = Sanitizer::pass_through();
        let html = "<script>trusted()</script><p onclick=\"x\">y</p>";
        assert!(s.is_pass_through());
        assert!(s.allow_list().is_none());
        assert_eq!(s.sanitize(html), html);
    }

    #[test]
    fn test_intern_reuses_names() {
        let owned = String::from("data-orig-src");
        assert!(std::ptr::eq(intern("data-orig-src"), intern(&owned)));
    }

    #[test]
    fn test_clones_share_cleaner() {
        let s = sanitizer(&["span.math"]);
        let clone = s.clone();
        for _ in 0..3 {
            assert_eq!(
                clone.sanitize(r#"<span class="math">x</span><b>y</b>"#),
                s.sanitize(r#"<span class="math">x</span><b>y</b>"#)
            );
        }
        let cleaner = |s: &Sanitizer| match &s.mode {
            Mode::Enforce { cleaner, .. } => Arc::clone(cleaner),
            Mode::PassThrough => panic!("enforcing sanitizer expected"),
        };
        assert!(Arc::ptr_eq(&cleaner(&s), &cleaner(&clone)));
    }

    #[test]
    fn test_plain_text_untouched() {
        let s = sanitizer(&["p"]);
        assert_eq!(
            s.sanitize("hoisted0123456789abcdef0123456789abcdef"),
            "hoisted0123456789abcdef0123456789abcdef"
        );
    }
}
