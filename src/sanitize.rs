//! Reduce feed markup to a small, well-formed XHTML fragment.
//!
//! Feed bodies are arbitrary HTML: unclosed tags, scripts, tracking pixels,
//! named entities XHTML doesn't know.  [`clean`] walks the `tl` parse tree and
//! re-emits only an allow-listed subset, so the result can be dropped
//! straight into an XHTML chapter.

use std::borrow::Cow;

use quick_xml::escape::{escape, resolve_html5_entity, unescape_with};

use crate::error::SanitizeError;

/// Kept as-is (minus attributes).
const ALLOWED: &[&str] = &[
    "p", "br", "hr", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "blockquote", "pre",
    "code", "em", "strong", "b", "i", "u", "s", "sub", "sup", "a", "dl", "dt", "dd", "table",
    "thead", "tbody", "tr", "th", "td", "figure", "figcaption",
];

/// Dropped together with everything inside them.
const DROPPED: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "form", "input", "button", "noscript",
    "template", "svg", "math", "head", "img", "video", "audio", "canvas",
];

const VOID: &[&str] = &["br", "hr"];

/// Longest `&...;` span worth trying as an entity reference.
const MAX_REFERENCE_LEN: usize = 40;

/// Clean `html` into simplified XHTML.
///
/// Tags outside the allow-list are unwrapped: their text survives, the tag
/// itself doesn't.
pub fn clean(html: &str) -> Result<String, SanitizeError> {
    let dom = tl::parse(html, tl::ParserOptions::default())
        .map_err(|e| SanitizeError::Parse(format!("{e:?}")))?;
    let parser = dom.parser();

    let mut out = String::with_capacity(html.len());
    for handle in dom.children() {
        render(*handle, parser, &mut out);
    }
    Ok(out.trim().to_string())
}

/// Escape `text` as a single plain paragraph.
pub fn plain_paragraph(text: &str) -> String {
    format!("<p>{}</p>", escape(text.trim()))
}

fn render(handle: tl::NodeHandle, parser: &tl::Parser, out: &mut String) {
    let Some(node) = handle.get(parser) else {
        return;
    };

    match node {
        tl::Node::Tag(tag) => {
            let name = tag.name().as_utf8_str().to_lowercase();
            if DROPPED.contains(&name.as_str()) {
                return;
            }

            let allowed = ALLOWED.contains(&name.as_str());
            let void = VOID.contains(&name.as_str());

            if allowed && void {
                out.push('<');
                out.push_str(&name);
                out.push_str("/>");
            } else if allowed {
                out.push('<');
                out.push_str(&name);
                if name == "a" {
                    if let Some(href) = safe_href(tag) {
                        out.push_str(" href=\"");
                        out.push_str(&escape(href.as_str()));
                        out.push('"');
                    }
                }
                out.push('>');
            }

            // Lenient parsers may hang siblings off a void tag; keep them.
            for child in tag.children().top().iter() {
                render(*child, parser, out);
            }

            if allowed && !void {
                out.push_str("</");
                out.push_str(&name);
                out.push('>');
            }
        }
        tl::Node::Raw(bytes) => {
            let raw = bytes.as_utf8_str();
            out.push_str(&escape(decode_entities(&raw)));
        }
        tl::Node::Comment(_) => {}
    }
}

/// `href` of an anchor, if it points somewhere a reader can follow.
fn safe_href(tag: &tl::HTMLTag) -> Option<String> {
    for (key, value) in tag.attributes().iter() {
        let key: &str = key.as_ref();
        if !key.eq_ignore_ascii_case("href") {
            continue;
        }
        let value = decode_entities(&value?).trim().to_string();
        let lower = value.to_ascii_lowercase();
        let ok = ["http://", "https://", "mailto:"]
            .iter()
            .any(|scheme| lower.starts_with(scheme));
        return ok.then_some(value);
    }
    None
}

/// Resolve HTML5 named and numeric entities one reference at a time.
///
/// A bare `&` or an unknown reference stays literal without affecting the
/// references around it.
fn decode_entities(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        let reference = tail
            .find(';')
            .filter(|&end| end <= MAX_REFERENCE_LEN)
            .map(|end| &tail[..=end]);
        let decoded = reference.and_then(|r| {
            unescape_with(r, resolve_html5_entity)
                .ok()
                .map(|text| (r.len(), text))
        });

        match decoded {
            Some((len, text)) => {
                out.push_str(&text);
                rest = &tail[len..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}
