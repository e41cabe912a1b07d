//! Syntax highlighting for code blocks.
//!
//! One [`Highlighter`] is configured at setup from
//! `modules.highlight.style` and shared by reference with the directive
//! handlers and the Markdown renderer.

use crate::error::Error;
use anyhow::{Result, bail};
use std::{fmt::Write, ops::RangeInclusive};
use syntect::{
    easy::HighlightLines,
    highlighting::{Color, Theme, ThemeSet},
    html::{IncludeBackground, styled_line_to_highlighted_html},
    parsing::SyntaxSet,
    util::LinesWithEndings,
};

pub const DEFAULT_STYLE: &str = "InspiredGitHub";

/// Background for emphasized lines when the theme has none.
const FALLBACK_LINE_HIGHLIGHT: &str = "#ffffcc";

/// Per-block formatting options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightOptions {
    pub linenos: bool,
    pub lineno_start: usize,
    pub lineno_step: usize,
    /// 1-based line numbers within the block.
    pub emphasize: LineSpec,
    pub caption: Option<String>,
}

impl Default for HighlightOptions {
    fn default() -> Self {
        Self {
            linenos: false,
            lineno_start: 1,
            lineno_step: 1,
            emphasize: LineSpec::default(),
            caption: None,
        }
    }
}

pub struct Highlighter {
    syntax_set: SyntaxSet,
    theme: Theme,
}

impl Highlighter {
    /// Load the bundled syntaxes and the named theme.
    pub fn new(style: &str) -> Result<Self> {
        let mut themes = ThemeSet::load_defaults();
        let Some(theme) = themes.themes.remove(style) else {
            let mut known: Vec<_> = themes.themes.keys().cloned().collect();
            known.sort();
            bail!("unknown highlight style `{style}`, available: {}", known.join(", "));
        };
        Ok(Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme,
        })
    }

    /// Highlighted `<pre>` block, in a line-number table when requested.
    /// Unknown languages fall back to plain text.
    pub fn highlight(&self, code: &str, language: Option<&str>, options: &HighlightOptions) -> Result<String> {
        let syntax = language
            .and_then(|lang| self.syntax_set.find_syntax_by_token(lang))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());
        let mut lines = HighlightLines::new(syntax, &self.theme);

        let mut body = String::from("<div class=\"highlight\"><pre>");
        let mut count = 0;
        for (index, line) in LinesWithEndings::from(code).enumerate() {
            let regions = lines.highlight_line(line, &self.syntax_set)?;
            let html = styled_line_to_highlighted_html(&regions, IncludeBackground::No)?;
            if options.emphasize.contains(index + 1) {
                write!(body, "<span class=\"hll\">{html}</span>")?;
            } else {
                body.push_str(&html);
            }
            count += 1;
        }
        body.push_str("</pre></div>");

        if !options.linenos {
            return Ok(body);
        }

        let step = options.lineno_step.max(1);
        let numbers: Vec<String> = (options.lineno_start..options.lineno_start + count)
            .map(|n| if n % step == 0 { n.to_string() } else { String::new() })
            .collect();
        Ok(format!(
            "<table class=\"highlighttable\"><tr><td class=\"linenos\"><pre>{}</pre></td><td class=\"code\">{body}</td></tr></table>",
            numbers.join("\n")
        ))
    }

    /// [`Self::highlight`] inside the captioned wrapper used by directives.
    pub fn block(&self, code: &str, language: Option<&str>, options: &HighlightOptions) -> Result<String> {
        let caption = options.caption.as_deref().filter(|c| !c.is_empty());
        let classes = [
            "literal-block-wrapper",
            if options.linenos { "with_linenos" } else { "without_linenos" },
            if caption.is_some() { "with_caption" } else { "without_caption" },
        ];

        let mut out = format!("<div class=\"{} container\">\n", classes.join(" "));
        if let Some(caption) = caption {
            writeln!(out, "<p class=\"caption\">{}</p>", escape_html(caption))?;
        }
        out.push_str(&self.highlight(code, language, options)?);
        out.push_str("\n</div>\n");
        Ok(out)
    }

    /// Stylesheet for the wrapper, emphasized lines and line numbers.
    pub fn stylesheet(&self) -> String {
        let settings = &self.theme.settings;
        let background = settings.background.map_or_else(|| "#ffffff".into(), hex);
        let foreground = settings.foreground.map_or_else(|| "#000000".into(), hex);
        let emphasis = settings
            .line_highlight
            .map_or_else(|| FALLBACK_LINE_HIGHLIGHT.into(), hex);
        let gutter = settings.gutter_foreground.map_or_else(|| "#999999".into(), hex);

        format!(
            ".highlight {{ background: {background}; color: {foreground}; }}\n\
             .highlight pre {{ margin: 0; line-height: 125%; }}\n\
             .highlight .hll {{ background-color: {emphasis}; display: block; }}\n\
             .highlighttable td.linenos pre {{ color: {gutter}; padding-right: 0.5em; text-align: right; }}\n\
             .literal-block-wrapper .caption {{ font-style: italic; }}\n"
        )
    }
}

fn hex(color: Color) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r, color.g, color.b)
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Line numbers selected by a spec such as `1,2,4-6`, kept as ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineSpec {
    ranges: Vec<RangeInclusive<usize>>,
}

impl LineSpec {
    pub fn contains(&self, line: usize) -> bool {
        self.ranges.iter().any(|range| range.contains(&line))
    }
}

/// Parse a line number spec such as `1,2,4-6`.
pub fn parse_line_spec(spec: &str) -> Result<LineSpec, Error> {
    let invalid = || Error::LineSpec(spec.to_owned());
    let number = |s: &str| s.trim().parse::<usize>().map_err(|_| invalid());

    let mut ranges = Vec::new();
    for part in spec.split(',') {
        let (start, end) = match part.split_once('-') {
            Some((start, end)) => (number(start)?, number(end)?),
            None => {
                let line = number(part)?;
                (line, line)
            }
        };
        if end < start {
            return Err(invalid());
        }
        ranges.push(start..=end);
    }
    Ok(LineSpec { ranges })
}
