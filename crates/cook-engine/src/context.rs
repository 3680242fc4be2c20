//! Render context: the typed settings an engine is built from.

use std::collections::{BTreeSet, HashMap};

/// Set of enabled feature names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Features(BTreeSet<String>);

impl Features {
    /// No features enabled.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Enable a feature.
    pub fn enable(&mut self, name: impl Into<String>) {
        self.0.insert(name.into());
    }

    /// Disable a feature.
    pub fn disable(&mut self, name: &str) {
        self.0.remove(name);
    }

    /// Check whether a feature is enabled.
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    /// Enabled feature names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Features {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Typographic quote characters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quotes {
    pub double_open: String,
    pub double_close: String,
    pub single_open: String,
    pub single_close: String,
}

impl Default for Quotes {
    fn default() -> Self {
        Self {
            double_open: "\u{201c}".to_owned(),
            double_close: "\u{201d}".to_owned(),
            single_open: "\u{2018}".to_owned(),
            single_close: "\u{2019}".to_owned(),
        }
    }
}

impl Quotes {
    /// Parse a pipe-delimited quote setting: `“|”|‘|’`.
    ///
    /// Returns `None` unless there are exactly four non-empty entries.
    #[must_use]
    pub fn parse(setting: &str) -> Option<Self> {
        let parts: Vec<&str> = setting.split('|').collect();
        match parts.as_slice() {
            [double_open, double_close, single_open, single_close]
                if parts.iter().all(|part| !part.is_empty()) =>
            {
                Some(Self {
                    double_open: (*double_open).to_owned(),
                    double_close: (*double_close).to_owned(),
                    single_open: (*single_open).to_owned(),
                    single_close: (*single_close).to_owned(),
                })
            }
            _ => None,
        }
    }
}

/// Math delimiter options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MathOptions {
    /// Recognise `%…%` as AsciiMath.
    pub asciimath: bool,
    /// Recognise `\(…\)` inline and `\[…\]` block delimiters.
    pub bracket_delimiters: bool,
}

impl Default for MathOptions {
    fn default() -> Self {
        Self {
            asciimath: false,
            bracket_delimiters: true,
        }
    }
}

/// Settings an engine is built from.
///
/// One engine is built per distinct context and reused for every cook call
/// with that configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderContext {
    /// Enabled features.
    pub features: Features,
    /// Quote characters used by the typographer.
    pub quotes: Quotes,
    /// Top-level domains bare links are recognised for.
    pub linkify_tlds: Vec<String>,
    /// Math delimiter options.
    pub math: MathOptions,
    /// Link modifiers that become a CSS class (`[file.pdf|attachment](…)`).
    pub attachment_classes: Vec<String>,
    /// Sanitize rendered HTML. Only trusted server-side contexts turn this off.
    pub sanitize: bool,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            features: Features::none(),
            quotes: Quotes::default(),
            linkify_tlds: ["com", "net", "org", "io", "dev", "edu", "gov"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            math: MathOptions::default(),
            attachment_classes: vec!["attachment".to_owned()],
            sanitize: true,
        }
    }
}

impl RenderContext {
    /// Replace the enabled features.
    #[must_use]
    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = features.into_iter().collect();
        self
    }

    /// Replace the linkify TLD list from a pipe-delimited setting (`com|net`).
    #[must_use]
    pub fn with_linkify_tlds(mut self, setting: &str) -> Self {
        self.linkify_tlds = parse_tlds(setting);
        self
    }
}

/// Split a pipe-delimited TLD setting, dropping empty entries and leading dots.
#[must_use]
pub fn parse_tlds(setting: &str) -> Vec<String> {
    setting
        .split('|')
        .map(|tld| tld.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|tld| !tld.is_empty())
        .collect()
}

/// Per-call cook settings.
#[derive(Clone, Debug, Default)]
pub struct CookEnv {
    /// Rendering for the live composer preview.
    pub previewing: bool,
    /// Host-supplied link previews keyed by URL. Trusted HTML.
    pub link_previews: HashMap<String, String>,
    /// Resolved locations for `upload://` short URLs.
    pub upload_urls: HashMap<String, String>,
}

impl CookEnv {
    /// Settings for the composer preview.
    #[must_use]
    pub fn preview() -> Self {
        Self {
            previewing: true,
            ..Self::default()
        }
    }
}
