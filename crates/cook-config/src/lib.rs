//! Configuration management for the cook pipeline.
//!
//! Parses `cook.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories. A loaded
//! [`Config`] turns into the [`RenderContext`] an engine is built from.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ```toml
//! [markdown]
//! features = ["math", "spoiler"]
//! typographer_quotes = "“|”|‘|’"
//! linkify_tlds = "com|net|org"
//! attachment_classes = ["attachment"]
//! sanitize = true
//!
//! [math]
//! asciimath = false
//! bracket_delimiters = true
//! ```

use std::path::{Path, PathBuf};

use cook_engine::{MathOptions, Quotes, RenderContext, parse_tlds};
use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// Only non-empty / non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Features enabled in addition to the configured ones.
    pub features: Vec<String>,
    /// Override the sanitize switch.
    pub sanitize: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "cook.toml";

/// Features enabled when the config does not list any.
const DEFAULT_FEATURES: &[&str] = &["details", "linkify", "math", "spoiler"];

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Markup configuration.
    pub markdown: MarkdownConfig,
    /// Math delimiter configuration.
    pub math: MathConfig,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Markup configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MarkdownConfig {
    /// Enabled feature names.
    pub features: Vec<String>,
    /// Pipe-delimited typographer quotes: double open, double close,
    /// single open, single close.
    pub typographer_quotes: String,
    /// Pipe-delimited top-level domains for bare links.
    pub linkify_tlds: String,
    /// Link modifiers that become a CSS class.
    pub attachment_classes: Vec<String>,
    /// Sanitize cooked HTML.
    pub sanitize: bool,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        let context = RenderContext::default();
        Self {
            features: DEFAULT_FEATURES.iter().map(|&name| name.to_owned()).collect(),
            typographer_quotes: "\u{201c}|\u{201d}|\u{2018}|\u{2019}".to_owned(),
            linkify_tlds: context.linkify_tlds.join("|"),
            attachment_classes: context.attachment_classes,
            sanitize: true,
        }
    }
}

/// Math delimiter configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MathConfig {
    /// Recognise `%…%` AsciiMath spans.
    pub asciimath: bool,
    /// Recognise `\(…\)` and `\[…\]`.
    pub bracket_delimiters: bool,
}

impl Default for MathConfig {
    fn default() -> Self {
        let options = MathOptions::default();
        Self {
            asciimath: options.asciimath,
            bracket_delimiters: options.bracket_delimiters,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
}

/// Require every entry of a list to be a plain identifier.
fn require_identifiers(values: &[String], field: &str) -> Result<(), ConfigError> {
    for value in values {
        let valid = value.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ConfigError::Validation(format!(
                "{field} entry `{value}` must start with a letter and contain only letters, digits, `-` or `_`"
            )));
        }
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `cook.toml` in current directory and parents,
    /// falling back to defaults when none exists.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails
    /// or validation fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        for feature in &settings.features {
            if !self.markdown.features.contains(feature) {
                self.markdown.features.push(feature.clone());
            }
        }
        if let Some(sanitize) = settings.sanitize {
            self.markdown.sanitize = sanitize;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let cwd = std::env::current_dir().ok()?;
        discover_from(&cwd)
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let markdown = &self.markdown;
        require_identifiers(&markdown.features, "markdown.features")?;
        require_identifiers(&markdown.attachment_classes, "markdown.attachment_classes")?;

        if Quotes::parse(&markdown.typographer_quotes).is_none() {
            return Err(ConfigError::Validation(
                "markdown.typographer_quotes must have exactly four non-empty entries separated by `|`"
                    .to_owned(),
            ));
        }

        if let Some(tld) = parse_tlds(&markdown.linkify_tlds)
            .into_iter()
            .find(|tld| !tld.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
        {
            return Err(ConfigError::Validation(format!(
                "markdown.linkify_tlds entry `{tld}` is not a domain label"
            )));
        }

        Ok(())
    }

    /// Build the render context an engine is created from.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the configuration is invalid.
    pub fn render_context(&self) -> Result<RenderContext, ConfigError> {
        self.validate()?;
        let markdown = &self.markdown;
        let quotes = Quotes::parse(&markdown.typographer_quotes).unwrap_or_default();

        Ok(RenderContext {
            features: markdown.features.iter().cloned().collect(),
            quotes,
            linkify_tlds: parse_tlds(&markdown.linkify_tlds),
            math: MathOptions {
                asciimath: self.math.asciimath,
                bracket_delimiters: self.math.bracket_delimiters,
            },
            attachment_classes: markdown.attachment_classes.clone(),
            sanitize: markdown.sanitize,
        })
    }
}

/// Search `start` and its parents for a config file.
fn discover_from(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(CONFIG_FILENAME);
        if candidate.exists() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}
