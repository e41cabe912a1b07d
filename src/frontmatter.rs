//! Front-matter extraction.
//!
//! reStructuredText sources start with a YAML header block, either fenced by
//! `---` lines or ending at the first blank line. Markdown sources take a
//! `---` fenced YAML block or leading `Key: value` lines.

use crate::{config::Layer, error::Error};
use serde_json::Value;
use std::path::Path;

/// A source split into its header and the remaining body.
#[derive(Debug, PartialEq, Eq)]
pub struct Split<'a> {
    pub header: Option<&'a str>,
    pub body: &'a str,
}

/// Offset just past the line starting at `start`, and the line itself.
fn line_at(text: &str, start: usize) -> (&str, usize) {
    match text[start..].find('\n') {
        Some(end) => (&text[start..start + end], start + end + 1),
        None => (&text[start..], text.len()),
    }
}

fn is_fence(line: &str) -> bool {
    line.trim_end() == "---"
}

/// Split a `---` fenced header off `text`, if it has one.
fn split_fenced(text: &str) -> Option<Split<'_>> {
    let (first, mut pos) = line_at(text, 0);
    if !is_fence(first) {
        return None;
    }
    let header_start = pos;
    while pos < text.len() {
        let (line, next) = line_at(text, pos);
        if is_fence(line) {
            return Some(Split {
                header: Some(&text[header_start..pos]),
                body: &text[next..],
            });
        }
        pos = next;
    }
    None
}

/// Split reStructuredText: a fenced header, or the first block up to a
/// blank line. A leading blank line means there is no header.
pub fn split_rst(text: &str) -> Split<'_> {
    if let Some(split) = split_fenced(text) {
        return split;
    }

    let mut pos = 0;
    while pos < text.len() {
        let (line, next) = line_at(text, pos);
        if line.trim().is_empty() {
            return Split {
                header: (pos > 0).then(|| &text[..pos]),
                body: &text[next..],
            };
        }
        pos = next;
    }
    Split {
        header: (!text.is_empty()).then_some(text),
        body: "",
    }
}

/// Split Markdown: a fenced YAML header, or leading `Key: value` lines
/// (continuation lines indented by four spaces) up to a blank line.
pub fn split_markdown(text: &str) -> (Layer, &str) {
    if let Some(split) = split_fenced(text) {
        return (parse_yaml_lenient(split.header.unwrap_or_default()), split.body);
    }

    let mut meta = Layer::new();
    let mut current: Option<String> = None;
    let mut pos = 0;
    while pos < text.len() {
        let (line, next) = line_at(text, pos);
        if line.trim().is_empty() {
            return (meta, if current.is_some() { &text[next..] } else { text });
        }
        if let Some(key) = &current
            && line.starts_with("    ")
        {
            push_meta(&mut meta, key, line.trim());
        } else if let Some((key, value)) = line.split_once(':')
            && is_meta_key(key)
        {
            let key = key.trim().to_lowercase();
            push_meta(&mut meta, &key, value.trim());
            current = Some(key);
        } else {
            break;
        }
        pos = next;
    }

    if current.is_some() && pos >= text.len() {
        return (meta, "");
    }
    (Layer::new(), text)
}

fn is_meta_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Repeated keys collect into a list.
fn push_meta(meta: &mut Layer, key: &str, value: &str) {
    let value = Value::String(value.to_owned());
    match meta.get_mut(key) {
        None => {
            meta.insert(key.to_owned(), value);
        }
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

fn parse_yaml_lenient(header: &str) -> Layer {
    match serde_yaml::from_str::<Value>(header) {
        Ok(Value::Object(map)) => map,
        _ => Layer::new(),
    }
}

/// Parse a header block as YAML. An empty header yields an empty mapping;
/// anything other than a mapping is an [`Error::Config`].
pub fn parse_header(header: &str, path: &Path) -> anyhow::Result<Layer> {
    if header.trim().is_empty() {
        return Ok(Layer::new());
    }
    let value: Value = serde_yaml::from_str(header).map_err(|err| {
        anyhow::Error::new(err).context(format!("invalid front-matter in `{}`", path.display()))
    })?;
    match value {
        Value::Null => Ok(Layer::new()),
        Value::Object(map) => Ok(map),
        other => Err(Error::config(path, &other).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_rst_blank_line_header() {
        let text = "tags: [rst]\nsummary: Lists\n\nLists\n=====\n\nBody.\n";
        let split = split_rst(text);
        assert_eq!(split.header, Some("tags: [rst]\nsummary: Lists\n"));
        assert_eq!(split.body, "Lists\n=====\n\nBody.\n");
    }

    #[test]
    fn test_split_rst_fenced_header() {
        let text = "---\ntitle: About\n\npublic: true\n---\nAbout me\n========\n";
        let split = split_rst(text);
        assert_eq!(split.header, Some("title: About\n\npublic: true\n"));
        assert_eq!(split.body, "About me\n========\n");
    }

    #[test]
    fn test_split_rst_without_header() {
        let split = split_rst("\nTitle\n=====\n");
        assert_eq!(split.header, None);
        assert_eq!(split.body, "Title\n=====\n");
    }

    #[test]
    fn test_parse_header_mapping() {
        let layer = parse_header("title: Hello\ntags: [a, b]\npub_date: 2022-02-21", Path::new("x.rst")).unwrap();
        assert_eq!(layer["title"], json!("Hello"));
        assert_eq!(layer["tags"], json!(["a", "b"]));
        assert_eq!(layer["pub_date"], json!("2022-02-21"));
    }

    #[test]
    fn test_parse_header_rejects_non_mapping() {
        let err = parse_header("Just a title\n============", Path::new("post.rst")).unwrap_err();
        let err = err.downcast_ref::<Error>().unwrap();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("post.rst"));
    }

    #[test]
    fn test_markdown_meta_lines() {
        let text = "Title: Hello World\nTags: one\n    two\n\n# Heading\n";
        let (meta, body) = split_markdown(text);
        assert_eq!(meta["title"], json!("Hello World"));
        assert_eq!(meta["tags"], json!(["one", "two"]));
        assert_eq!(body, "# Heading\n");
    }

    #[test]
    fn test_markdown_without_meta() {
        let text = "# Heading\n\nSome text: with a colon\n";
        let (meta, body) = split_markdown(text);
        assert!(meta.is_empty());
        assert_eq!(body, text);
    }

    #[test]
    fn test_markdown_yaml_fence() {
        let (meta, body) = split_markdown("---\ntitle: Fenced\n---\ntext\n");
        assert_eq!(meta["title"], json!("Fenced"));
        assert_eq!(body, "text\n");
    }
}
