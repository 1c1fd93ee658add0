//! Scraping helpers for the conversion site's HTML pages.
//!
//! The pages are small and server-rendered, so tag-level regular expressions
//! are enough. Attribute values may be double-quoted, single-quoted or bare.

use regex_lite::Regex;

/// Body of the first `<form>` element.
pub fn first_form(html: &str) -> Option<&str> {
    let re = Regex::new(r"(?is)<form\b[^>]*>(.*?)</form\s*>").ok()?;
    re.captures(html).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// `(name, value)` of every named `<input>` in document order. Missing values are empty.
pub fn input_fields(form: &str) -> Vec<(String, String)> {
    let Ok(re) = Regex::new(r"(?is)<input\b[^>]*>") else {
        return Vec::new();
    };
    re.find_iter(form)
        .filter_map(|tag| {
            let tag = tag.as_str();
            let name = attribute(tag, "name")?;
            let value = attribute(tag, "value").unwrap_or_default();
            Some((name, value))
        })
        .collect()
}

/// `src` of the first `<source>` inside a `<video>` element.
pub fn video_source(html: &str) -> Option<String> {
    let re = Regex::new(r"(?is)<video\b[^>]*>.*?(<source\b[^>]*>)").ok()?;
    let tag = re.captures(html)?.get(1)?.as_str();
    attribute(tag, "src")
}

/// `src` of the first `<img>` after the element with `id="output"`.
pub fn output_image(html: &str) -> Option<String> {
    let anchor = Regex::new(r#"(?is)\bid\s*=\s*["']?output\b"#).ok()?;
    let start = anchor.find(html)?.end();
    let img = Regex::new(r"(?is)<img\b[^>]*>").ok()?;
    let tag = img.find(&html[start..])?.as_str();
    attribute(tag, "src")
}

/// Value of attribute `name` inside a single tag, entity-decoded.
pub fn attribute(tag: &str, name: &str) -> Option<String> {
    let re = Regex::new(r#"(?is)\s([a-z_:][-a-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .ok()?;
    let value = re.captures_iter(tag).find_map(|c| {
        let key = c.get(1)?.as_str();
        if !key.eq_ignore_ascii_case(name) {
            return None;
        }
        let raw = c.get(2).or_else(|| c.get(3)).or_else(|| c.get(4))?.as_str();
        Some(decode_entities(raw))
    });
    value
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
