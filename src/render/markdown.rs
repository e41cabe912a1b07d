//! Markdown rendering with pulldown-cmark.
//!
//! Fenced code blocks go through the shared [`Highlighter`] when one is
//! configured; otherwise they are emitted as escaped `<pre><code>` blocks.

use super::highlight::{HighlightOptions, Highlighter, escape_html};
use anyhow::Result;
use pulldown_cmark::{CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};

/// Rendered Markdown body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub html: String,
    /// Plain text of the first level-one heading.
    pub first_heading: Option<String>,
}

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    options
}

pub fn render(text: &str, highlighter: Option<&Highlighter>) -> Result<Rendered> {
    let mut events = Vec::new();
    let mut first_heading: Option<String> = None;
    let mut in_h1 = false;
    let mut code: Option<(Option<String>, String)> = None;

    for event in Parser::new_ext(text, options()) {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(str::to_owned),
                    CodeBlockKind::Indented => None,
                };
                code = Some((lang, String::new()));
            }
            Event::End(TagEnd::CodeBlock) => {
                let Some((lang, body)) = code.take() else {
                    continue;
                };
                let html = match highlighter {
                    Some(hl) => hl.highlight(&body, lang.as_deref(), &HighlightOptions::default())?,
                    None => format!("<pre><code>{}</code></pre>", escape_html(&body)),
                };
                events.push(Event::Html(CowStr::from(html + "\n")));
            }
            Event::Text(text) if code.is_some() => {
                if let Some((_, body)) = code.as_mut() {
                    body.push_str(&text);
                }
            }
            Event::Start(Tag::Heading { level: HeadingLevel::H1, .. }) if first_heading.is_none() => {
                in_h1 = true;
                first_heading = Some(String::new());
                events.push(event);
            }
            Event::End(TagEnd::Heading(HeadingLevel::H1)) if in_h1 => {
                in_h1 = false;
                events.push(event);
            }
            Event::Text(ref text) | Event::Code(ref text) if in_h1 => {
                if let Some(heading) = first_heading.as_mut() {
                    heading.push_str(text);
                }
                events.push(event);
            }
            other => events.push(other),
        }
    }

    let mut out = String::new();
    html::push_html(&mut out, events.into_iter());
    Ok(Rendered {
        html: out,
        first_heading: first_heading.map(|h| h.trim().to_owned()).filter(|h| !h.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::highlight::DEFAULT_STYLE;

    #[test]
    fn test_first_heading() {
        let out = render("# Hello `code`\n\nText\n\n# Second\n", None).unwrap();
        assert_eq!(out.first_heading.as_deref(), Some("Hello code"));
        assert!(out.html.contains("<h1>Hello <code>code</code></h1>"));
    }

    #[test]
    fn test_code_block_without_highlighter() {
        let out = render("```rust\nlet x = 1 < 2;\n```\n", None).unwrap();
        assert!(out.html.contains("<pre><code>let x = 1 &lt; 2;\n</code></pre>"));
        assert_eq!(out.first_heading, None);
    }

    #[test]
    fn test_code_block_highlighted() {
        let hl = Highlighter::new(DEFAULT_STYLE).unwrap();
        let out = render("```python\nprint('hi')\n```\n", Some(&hl)).unwrap();
        assert!(out.html.contains("<div class=\"highlight\"><pre>"));
        assert!(out.html.contains("print"));
    }
}
