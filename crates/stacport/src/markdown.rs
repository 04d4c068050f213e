//! README handling: YAML front matter and the few markdown constructs the
//! STAC layer cares about (headings, images, absolute links).

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(#{1,6})\s+(?P<title>.*)").expect("valid regex"));
static IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[(?P<alt>.*?)\]\((?P<src>.*?)\)").expect("valid regex"));
static LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(?P<text>[^\]]*)\]\((?P<href>https?://[^)]+)\)").expect("valid regex")
});
static EMPTY_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

const FRONT_MATTER_DELIMITER: &str = "---";

/// Split a README into its body and its front matter.
///
/// Front matter that is not a YAML mapping, or not valid YAML at all, yields
/// empty metadata; the body is still stripped of it.
#[must_use]
pub fn parse(content: &str) -> (String, Map<String, Value>) {
    let Some(rest) = content.strip_prefix(FRONT_MATTER_DELIMITER) else {
        return (content.to_string(), Map::new());
    };

    let (yaml, doc) = match rest.split_once(FRONT_MATTER_DELIMITER) {
        Some((yaml, doc)) => (yaml, doc),
        None => ("", rest),
    };

    let metadata = match serde_yaml_ng::from_str::<Value>(yaml) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Map::new(),
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unreadable README front matter");
            Map::new()
        }
    };

    (doc.trim_start().to_string(), metadata)
}

/// `(alt, src)` of every image with both parts non-empty.
#[must_use]
pub fn get_images(content: &str) -> Vec<(String, String)> {
    IMAGE
        .captures_iter(content)
        .filter_map(|caps| {
            let alt = caps.name("alt")?.as_str().trim();
            let src = caps.name("src")?.as_str().trim();
            (!alt.is_empty() && !src.is_empty()).then(|| (alt.to_string(), src.to_string()))
        })
        .collect()
}

/// Absolute-URL links that are not images.
fn link_captures(content: &str) -> impl Iterator<Item = Captures<'_>> {
    LINK.captures_iter(content).filter(|caps| {
        let start = caps.get(0).map_or(0, |m| m.start());
        !content[..start].ends_with('!')
    })
}

/// `(text, href)` of every absolute link with both parts non-empty.
#[must_use]
pub fn get_links(content: &str) -> Vec<(String, String)> {
    link_captures(content)
        .filter_map(|caps| {
            let text = caps.name("text")?.as_str().trim();
            let href = caps.name("href")?.as_str().trim();
            (!text.is_empty() && !href.is_empty()).then(|| (text.to_string(), href.to_string()))
        })
        .collect()
}

/// Rewrite every image with `f(alt, src)`.
pub fn replace_images<F>(content: &str, mut f: F) -> String
where
    F: FnMut(&str, &str) -> String,
{
    IMAGE
        .replace_all(content, |caps: &Captures<'_>| {
            let alt = caps.name("alt").map_or("", |m| m.as_str());
            let src = caps.name("src").map_or("", |m| m.as_str());
            f(alt, src)
        })
        .into_owned()
}

#[must_use]
pub fn remove_images(content: &str) -> String {
    IMAGE.replace_all(content, "").into_owned()
}

#[must_use]
pub fn remove_headings(content: &str) -> String {
    HEADING.replace_all(content, "").into_owned()
}

/// Replace absolute links by their text.
#[must_use]
pub fn remove_links(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    for caps in link_captures(content) {
        let (Some(whole), Some(text)) = (caps.get(0), caps.name("text")) else {
            continue;
        };
        out.push_str(&content[last..whole.start()]);
        out.push_str(text.as_str());
        last = whole.end();
    }
    out.push_str(&content[last..]);
    out
}

/// Drop the content up to and including the first heading.
#[must_use]
pub fn remove_everything_before_first_heading(content: &str) -> &str {
    match HEADING.find(content) {
        Some(m) => &content[m.end()..],
        None => content,
    }
}

/// Collapse runs of blank lines and trim.
#[must_use]
pub fn clean_new_lines(content: &str) -> String {
    EMPTY_LINES.replace_all(content, "\n\n").trim().to_string()
}
