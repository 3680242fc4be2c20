//! Image and link label modifiers.
//!
//! Labels carry pipe-separated modifiers after the visible text:
//!
//! - `![alt|300x150](…)` - display size, optionally refined (`, 50%`,
//!   `, 200x`, `, x100`)
//! - `![alt|video](…)`, `![alt|audio](…)` - playable media
//! - `![alt|key=value](…)` - `data-key` attribute
//! - `![alt|thumbnail](…)` - `data-thumbnail="true"`
//! - `[file.pdf|attachment](…)` - link class from the configured markers
//!
//! Segments nothing recognises stay part of the visible text.

use std::borrow::Cow;
use std::sync::OnceLock;

use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::context::CookEnv;
use crate::render::{RenderEnv, escape_html, render_as_text, render_attrs};
use crate::token::{Token, TokenKind};

/// Scheme of host-managed upload short URLs.
pub const UPLOAD_SCHEME: &str = "upload://";

fn size_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([1-9][0-9]*)x([1-9][0-9]*)(\s*,\s*(x?)([1-9][0-9]{0,2})([%x]?))?$")
            .expect("valid regex")
    })
}

fn data_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z]+[\w\-:.]*$").expect("valid regex"))
}

/// Display size parsed from a `WxH` segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
    /// The composer may offer resize controls.
    pub resizable: bool,
}

/// Attributes collected from an image label.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MediaAttributes {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub class: Option<String>,
    /// `data-*` attributes in label order.
    pub data: Vec<(String, String)>,
    /// Alt text; `None` marks a presentational image.
    pub alt: Option<String>,
}

/// What an image label asks for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageLabel {
    Video,
    Audio,
    Image(MediaAttributes),
}

/// Visible text and attributes of a link label.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkLabel {
    pub text: String,
    pub class: Option<String>,
    pub data: Vec<(String, String)>,
}

/// Parse a size segment such as `300x150` or `300x150, 50%`.
///
/// # Example
///
/// ```
/// use cook_engine::media::parse_size;
///
/// let size = parse_size("300x150, 50%", false).unwrap();
/// assert_eq!((size.width, size.height), (150, 75));
/// assert!(parse_size("300", false).is_none());
/// ```
#[must_use]
pub fn parse_size(segment: &str, previewing: bool) -> Option<ImageSize> {
    let caps = size_regex().captures(segment)?;
    let mut width: u64 = caps[1].parse().ok()?;
    let mut height: u64 = caps[2].parse().ok()?;

    let prefix = caps.get(4).map_or("", |m| m.as_str());
    let suffix = caps.get(6).map_or("", |m| m.as_str());
    if let Some(amount) = caps.get(5) {
        let amount: u64 = amount.as_str().parse().ok()?;
        if suffix == "%" {
            width = width.checked_mul(amount)? / 100;
            height = height.checked_mul(amount)? / 100;
        } else if suffix == "x" {
            height = height.checked_mul(amount)?.checked_div(width)?;
            width = amount;
        } else if prefix == "x" {
            width = width.checked_mul(amount)?.checked_div(height)?;
            height = amount;
        }
    }

    Some(ImageSize {
        width: u32::try_from(width).ok()?,
        height: u32::try_from(height).ok()?,
        resizable: previewing && suffix != "x" && prefix != "x",
    })
}

/// Parse a `key=value` segment into a `data-key` attribute.
///
/// The key is lower-cased and must start with letters; anything else is
/// not a data attribute.
#[must_use]
pub fn parse_data_attribute(segment: &str) -> Option<(String, String)> {
    let (key, value) = segment.split_once('=')?;
    let key = key.trim();
    if !data_key_regex().is_match(key) {
        return None;
    }
    Some((format!("data-{}", key.to_ascii_lowercase()), value.trim().to_owned()))
}

/// Parse an image label.
///
/// # Example
///
/// ```
/// use cook_engine::media::{ImageLabel, parse_image_label};
///
/// let ImageLabel::Image(attrs) = parse_image_label("cat|300x150|thumbnail", false) else {
///     panic!("expected an image");
/// };
/// assert_eq!(attrs.width, Some(300));
/// assert_eq!(attrs.alt.as_deref(), Some("cat"));
/// assert_eq!(attrs.data, vec![("data-thumbnail".to_owned(), "true".to_owned())]);
/// ```
#[must_use]
pub fn parse_image_label(label: &str, previewing: bool) -> ImageLabel {
    let mut segments = label.split('|');
    let first = segments.next().unwrap_or_default();
    let rest: Vec<&str> = segments.collect();

    match rest.first().copied() {
        Some("video") => return ImageLabel::Video,
        Some("audio") => return ImageLabel::Audio,
        _ => {}
    }

    let mut attrs = MediaAttributes::default();
    let mut alt = vec![first];
    for segment in rest {
        if let Some(size) = parse_size(segment, previewing) {
            if attrs.width.is_none() && attrs.height.is_none() {
                attrs.width = Some(size.width);
                attrs.height = Some(size.height);
                if size.resizable {
                    attrs.class = Some("resizable".to_owned());
                }
            }
        } else if let Some(data) = parse_data_attribute(segment) {
            attrs.data.push(data);
        } else if segment == "thumbnail" {
            attrs.data.push(("data-thumbnail".to_owned(), "true".to_owned()));
        } else {
            alt.push(segment);
        }
    }

    let alt = alt.join("|");
    let alt = alt.trim();
    attrs.alt = (!alt.is_empty()).then(|| alt.to_owned());
    ImageLabel::Image(attrs)
}

/// Parse a link label, lifting marker classes and data attributes out of it.
#[must_use]
pub fn parse_link_label(label: &str, marker_classes: &[String]) -> LinkLabel {
    let mut parsed = LinkLabel::default();
    let mut text = Vec::new();
    for (idx, segment) in label.split('|').enumerate() {
        if idx > 0
            && parsed.class.is_none()
            && marker_classes.iter().any(|class| class == segment)
        {
            parsed.class = Some(segment.to_owned());
        } else if idx > 0
            && let Some(data) = parse_data_attribute(segment)
        {
            parsed.data.push(data);
        } else {
            text.push(segment);
        }
    }
    parsed.text = text.join("|");
    parsed
}

/// Resolve an upload short URL, returning the URL to use and the original.
fn resolve_upload<'a>(url: &'a str, cook: &'a CookEnv) -> (&'a str, Option<&'a str>) {
    if !url.starts_with(UPLOAD_SCHEME) {
        return (url, None);
    }
    let resolved = cook.upload_urls.get(url).map_or(url, String::as_str);
    (resolved, Some(url))
}

/// Final path segment of a URL without its extension.
fn media_id(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let name = path.rsplit('/').next().unwrap_or_default();
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}

/// Placeholder the client replaces with a video player.
#[must_use]
pub fn video_html(src: &str, orig_src: Option<&str>) -> String {
    let orig = orig_src.map_or_else(String::new, |orig| {
        format!(r#" data-orig-src="{}""#, escape_html(orig))
    });
    format!(
        r#"<div class="video-placeholder-container" data-video-src="{}"{orig}></div>"#,
        escape_html(src)
    )
}

/// Lightweight placeholder used while previewing a video.
#[must_use]
pub fn video_preview_html(src: &str, orig_src: Option<&str>) -> String {
    format!(
        r#"<div class="onebox-placeholder-container" data-orig-src-id="{}"><span class="placeholder-icon video"></span></div>"#,
        escape_html(media_id(orig_src.unwrap_or(src)))
    )
}

/// Audio player with a plain link fallback.
#[must_use]
pub fn audio_html(src: &str, orig_src: Option<&str>) -> String {
    let src = escape_html(src);
    let orig = orig_src.map_or_else(String::new, |orig| {
        format!(r#" data-orig-src="{}""#, escape_html(orig))
    });
    format!(
        r#"<audio preload="metadata" controls><source src="{src}"{orig}><a href="{src}">{src}</a></audio>"#
    )
}

/// Render an image token, honouring label modifiers and upload URLs.
pub fn render_image(token: &Token, env: &mut RenderEnv<'_>) -> String {
    let label = render_as_text(&token.children);
    let cook = env.cook_env();
    let (src, orig_src) = resolve_upload(token.attr("src").unwrap_or_default(), cook);

    let attrs = match parse_image_label(&label, env.previewing()) {
        ImageLabel::Video if env.previewing() => return video_preview_html(src, orig_src),
        ImageLabel::Video => return video_html(src, orig_src),
        ImageLabel::Audio => return audio_html(src, orig_src),
        ImageLabel::Image(attrs) => attrs,
    };

    let mut out: Vec<(String, String)> = vec![("src".to_owned(), src.to_owned())];
    match attrs.alt {
        Some(alt) => out.push(("alt".to_owned(), alt)),
        None => out.push(("role".to_owned(), "presentation".to_owned())),
    }
    if let Some(title) = token.attr("title") {
        out.push(("title".to_owned(), title.to_owned()));
    }
    if let Some(width) = attrs.width {
        out.push(("width".to_owned(), width.to_string()));
    }
    if let Some(height) = attrs.height {
        out.push(("height".to_owned(), height.to_string()));
    }
    if let Some(class) = attrs.class {
        out.push(("class".to_owned(), class));
    }
    if let Some(orig) = orig_src {
        out.push(("data-orig-src".to_owned(), orig.to_owned()));
    }
    out.extend(attrs.data);

    format!("<img{}>", render_attrs(&out))
}

/// Render a link token: attachment markers, data attributes, upload URLs and
/// decoded autolink text.
pub fn render_link(token: &Token, env: &mut RenderEnv<'_>) -> String {
    let cook = env.cook_env();
    let (href, orig_href) = resolve_upload(token.attr("href").unwrap_or_default(), cook);

    let mut attrs: Vec<(String, String)> = vec![("href".to_owned(), href.to_owned())];
    if let Some(title) = token.attr("title") {
        attrs.push(("title".to_owned(), title.to_owned()));
    }
    if let Some(orig) = orig_href {
        attrs.push(("data-orig-href".to_owned(), orig.to_owned()));
    }

    let body = match token.children.as_slice() {
        _ if !token.info.is_empty() => escape_html(&decode_url_text(&token.content)),
        [only] if only.kind == TokenKind::Text && only.content.contains('|') => {
            let label = parse_link_label(&only.content, &env.context().attachment_classes);
            if let Some(class) = label.class {
                attrs.insert(0, ("class".to_owned(), class));
            }
            attrs.extend(label.data);
            escape_html(&label.text)
        }
        children => env.render(children),
    };

    format!("<a{}>{body}</a>", render_attrs(&attrs))
}

/// Percent-decode link text for display, keeping it as-is when not UTF-8.
fn decode_url_text(text: &str) -> Cow<'_, str> {
    percent_decode_str(text)
        .decode_utf8()
        .unwrap_or(Cow::Borrowed(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn image(label: &str) -> MediaAttributes {
        match parse_image_label(label, false) {
            ImageLabel::Image(attrs) => attrs,
            other => panic!("expected image, got {other:?}"),
        }
    }

    #[test]
    fn test_size_plain() {
        let size = parse_size("300x150", false).unwrap();
        assert_eq!((size.width, size.height, size.resizable), (300, 150, false));
    }

    #[test]
    fn test_size_refinements() {
        let size = |s| parse_size(s, false).map(|size| (size.width, size.height));
        assert_eq!(size("300x150, 50%"), Some((150, 75)));
        assert_eq!(size("300x150,200x"), Some((200, 100)));
        assert_eq!(size("300x150, x50"), Some((100, 50)));
        assert_eq!(size("333x111, 33%"), Some((109, 36)));
        assert_eq!(size("300x150, 50"), Some((300, 150)));
    }

    #[test]
    fn test_size_rejects() {
        assert!(parse_size("0x150", false).is_none());
        assert!(parse_size("300x", false).is_none());
        assert!(parse_size("300x150, 1000%", false).is_none());
        assert!(parse_size("big", false).is_none());
    }

    #[test]
    fn test_size_overflow_rejects() {
        assert!(parse_size("1000000000000000000x2, 50%", false).is_none());
        assert!(parse_size("2x100000000000000000000, 50x", false).is_none());
        assert!(parse_size("99999999999x2", false).is_none());
    }

    #[test]
    fn test_size_resizable_in_preview() {
        assert!(parse_size("300x150", true).unwrap().resizable);
        assert!(parse_size("300x150, 50%", true).unwrap().resizable);
        assert!(!parse_size("300x150, 200x", true).unwrap().resizable);
        assert!(!parse_size("300x150, x50", true).unwrap().resizable);
    }

    #[test]
    fn test_data_attribute() {
        assert_eq!(
            parse_data_attribute("Foo=Bar"),
            Some(("data-foo".to_owned(), "Bar".to_owned()))
        );
        assert_eq!(
            parse_data_attribute("x.y:z=1"),
            Some(("data-x.y:z".to_owned(), "1".to_owned()))
        );
        assert!(parse_data_attribute("1a=b").is_none());
        assert!(parse_data_attribute("no value").is_none());
    }

    #[test]
    fn test_image_label_alt_and_size() {
        let attrs = image("a|300x150");
        assert_eq!(attrs.alt.as_deref(), Some("a"));
        assert_eq!((attrs.width, attrs.height), (Some(300), Some(150)));
    }

    #[test]
    fn test_image_label_first_size_wins() {
        let attrs = image("a|300x150|20x10");
        assert_eq!((attrs.width, attrs.height), (Some(300), Some(150)));
        assert_eq!(attrs.alt.as_deref(), Some("a"));
    }

    #[test]
    fn test_image_label_unknown_segments_rejoin_alt() {
        assert_eq!(image("a|b| c ").alt.as_deref(), Some("a|b| c"));
    }

    #[test]
    fn test_image_label_empty_alt_is_presentational() {
        assert_eq!(image("").alt, None);
        assert_eq!(image(" |300x150").alt, None);
    }

    #[test]
    fn test_image_label_media_kinds() {
        assert_eq!(parse_image_label("clip|video", false), ImageLabel::Video);
        assert_eq!(parse_image_label("song|audio", true), ImageLabel::Audio);
        assert!(matches!(parse_image_label("clip|300x150|video", false), ImageLabel::Image(_)));
    }

    #[test]
    fn test_link_label() {
        let classes = vec!["attachment".to_owned()];
        let label = parse_link_label("report.pdf|attachment|id=7", &classes);
        assert_eq!(label.text, "report.pdf");
        assert_eq!(label.class.as_deref(), Some("attachment"));
        assert_eq!(label.data, vec![("data-id".to_owned(), "7".to_owned())]);

        let plain = parse_link_label("a|b", &classes);
        assert_eq!(plain.text, "a|b");
        assert_eq!(plain.class, None);
    }

    #[test]
    fn test_media_id() {
        assert_eq!(media_id("upload://abc123.mp4"), "abc123");
        assert_eq!(media_id("/uploads/x/clip.final.webm?v=2"), "clip.final");
        assert_eq!(media_id("noext"), "noext");
    }

    #[test]
    fn test_media_html() {
        assert_eq!(
            video_html("/v.mp4", Some("upload://v.mp4")),
            r#"<div class="video-placeholder-container" data-video-src="/v.mp4" data-orig-src="upload://v.mp4"></div>"#
        );
        assert_eq!(
            video_preview_html("/v.mp4", Some("upload://abc.mp4")),
            r#"<div class="onebox-placeholder-container" data-orig-src-id="abc"><span class="placeholder-icon video"></span></div>"#
        );
        assert_eq!(
            audio_html("/a.mp3", None),
            r#"<audio preload="metadata" controls><source src="/a.mp3"><a href="/a.mp3">/a.mp3</a></audio>"#
        );
    }

    #[test]
    fn test_decode_url_text() {
        assert_eq!(decode_url_text("https://x.org/caf%C3%A9"), "https://x.org/café");
        assert_eq!(decode_url_text("https://x.org/%FF"), "https://x.org/%FF");
    }
}
