//! reStructuredText rendering.
//!
//! Covers the subset blog posts use: section titles (underlined, or over-
//! and underlined), paragraphs, bullet and enumerated lists, block quotes,
//! `::` literal blocks, transitions, hyperlink targets, comments, inline
//! markup and directives. Directives other than a few builtins are looked
//! up in a [`Directives`] registry that modules fill at setup.
//!
//! A lone leading section title whose adornment is not reused becomes the
//! document title and is left out of the fragment; the remaining sections
//! start at `initial_header_level`.

use super::highlight::escape_html;
use crate::{log, utils::slug::slugify};
use anyhow::{Result, bail};
use regex::{Captures, Regex};
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt::Write,
    fs,
    path::Path,
    rc::Rc,
    sync::LazyLock,
};

pub const DEFAULT_HEADER_LEVEL: usize = 2;

const ADORNMENT_CHARS: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

static RE_ENUMERATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+|#)\.(?: +|$)").unwrap());

static RE_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9][A-Za-z0-9_+.-]*)::(?:\s+(.*?))?\s*$").unwrap());

static RE_OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:([A-Za-z0-9_-]+):(?:\s+(.*?))?\s*$").unwrap());

static RE_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^_(?:`([^`]+)`|([^:`]+)):\s*(.*?)\s*$").unwrap());

static RE_INLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"``(?P<literal>.+?)``",
        r"|\*\*(?P<strong>[^*\s](?:[^*]*[^*\s])?)\*\*",
        r"|\*(?P<em>[^*\s](?:[^*]*[^*\s])?)\*",
        r"|`(?P<link_text>[^`<]*?)\s*<(?P<link_url>[^`>]+)>`__?",
        r"|:(?P<role>[A-Za-z][A-Za-z0-9-]*):`(?P<role_text>[^`]+)`",
        r"|`(?P<reference>[^`]+)`__?",
        r"|`(?P<interpreted>[^`]+)`",
        r#"|(?P<url>https?://[^\s<>"]*[^\s<>".,;:!?)'])"#,
        r"|\b(?P<word>[A-Za-z0-9][A-Za-z0-9-]*)_\b",
    ))
    .unwrap()
});

// ============================================================================
// Directives
// ============================================================================

/// A parsed `.. name:: arguments` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub arguments: Vec<String>,
    pub options: BTreeMap<String, String>,
    pub content: Vec<String>,
}

impl Directive {
    pub fn argument(&self, index: usize) -> Option<&str> {
        self.arguments.get(index).map(String::as_str)
    }

    /// Option value; flag options have an empty value.
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    pub fn has_option(&self, name: &str) -> bool {
        self.options.contains_key(name)
    }

    /// Content lines joined back into text.
    pub fn content_text(&self) -> String {
        let mut text = self.content.join("\n");
        text.push('\n');
        text
    }
}

/// What a directive handler may know about the document being rendered.
pub struct DirectiveEnv<'a> {
    /// Directory of the source file, for includes.
    pub source_dir: &'a Path,
}

pub type DirectiveHandler = Rc<dyn Fn(&Directive, &DirectiveEnv<'_>) -> Result<String>>;

/// Directive handlers by name.
#[derive(Clone, Default)]
pub struct Directives {
    handlers: HashMap<String, DirectiveHandler>,
}

impl Directives {
    pub fn register(
        &mut self,
        name: &str,
        handler: impl Fn(&Directive, &DirectiveEnv<'_>) -> Result<String> + 'static,
    ) {
        self.handlers.insert(name.to_owned(), Rc::new(handler));
    }

    pub fn get(&self, name: &str) -> Option<&DirectiveHandler> {
        self.handlers.get(name)
    }
}

/// Read a file named by a directive, relative to the source directory.
/// Only UTF-8 and Latin-1 encodings are understood.
pub fn read_include(env: &DirectiveEnv<'_>, name: &str, encoding: &str) -> Result<String> {
    let path = env.source_dir.join(name);
    let bytes = fs::read(&path)
        .map_err(|err| anyhow::anyhow!("cannot include `{}`: {err}", path.display()))?;
    match encoding.to_ascii_lowercase().replace('_', "-").as_str() {
        "utf-8" | "utf8" => Ok(String::from_utf8(bytes)?),
        "latin-1" | "latin1" | "iso-8859-1" => Ok(bytes.into_iter().map(char::from).collect()),
        other => bail!("unsupported include encoding `{other}`"),
    }
}

// ============================================================================
// Block structure
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Adornment {
    ch: char,
    overline: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Block {
    Section { title: String, style: Adornment },
    Paragraph(String),
    Literal(String),
    BulletList(Vec<Vec<Block>>),
    EnumList(Vec<Vec<Block>>),
    Quote(Vec<Block>),
    Directive(Directive),
    Target { name: String, url: String },
    Transition,
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn adornment_char(line: &str) -> Option<char> {
    let line = line.trim_end();
    let first = line.chars().next()?;
    (line.len() >= 2 && ADORNMENT_CHARS.contains(first) && line.chars().all(|c| c == first))
        .then_some(first)
}

/// Lines from `start` while blank or indented, dedented by their common
/// indentation, trailing blanks dropped. Returns the lines and the index
/// after the block.
fn indented_block(lines: &[String], start: usize) -> (Vec<String>, usize) {
    let mut end = start;
    while end < lines.len() && (is_blank(&lines[end]) || indent_of(&lines[end]) > 0) {
        end += 1;
    }
    let mut block: Vec<&String> = lines[start..end].iter().collect();
    while block.last().is_some_and(|l| is_blank(l)) {
        block.pop();
    }
    let common = block
        .iter()
        .filter(|l| !is_blank(l))
        .map(|l| indent_of(l))
        .min()
        .unwrap_or(0);
    let dedented = block
        .into_iter()
        .map(|l| if is_blank(l) { String::new() } else { l[common..].to_owned() })
        .collect();
    (dedented, end)
}

fn bullet_width(line: &str, bullet: Option<char>) -> Option<usize> {
    let mut chars = line.chars();
    let first = chars.next()?;
    if !"-*+".contains(first) || bullet.is_some_and(|b| b != first) {
        return None;
    }
    match chars.next() {
        None => Some(1),
        Some(' ') => Some(1 + line[1..].len() - line[1..].trim_start().len()),
        Some(_) => None,
    }
}

fn enumerator_width(line: &str) -> Option<usize> {
    RE_ENUMERATOR.find(line).map(|m| m.end())
}

/// Collect list items starting at `start`; `marker` gives the text offset
/// of an item's first line.
fn list_items(
    lines: &[String],
    start: usize,
    marker: impl Fn(&str) -> Option<usize>,
) -> (Vec<Vec<String>>, usize) {
    let mut items = Vec::new();
    let mut i = start;

    while let Some(width) = lines.get(i).and_then(|l| marker(l)) {
        let first = lines[i].get(width..).unwrap_or_default().to_owned();
        let mut item = vec![first];
        i += 1;
        while i < lines.len() && (is_blank(&lines[i]) || indent_of(&lines[i]) >= width) {
            let line = &lines[i];
            item.push(if is_blank(line) { String::new() } else { line[width..].to_owned() });
            i += 1;
        }
        while item.last().is_some_and(|l| is_blank(l)) {
            item.pop();
        }
        items.push(item);
    }

    (items, i)
}

fn parse_blocks(lines: &[String]) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = &lines[i];
        if is_blank(line) {
            i += 1;
            continue;
        }

        if indent_of(line) > 0 {
            let (inner, next) = indented_block(lines, i);
            blocks.push(Block::Quote(parse_blocks(&inner)));
            i = next;
            continue;
        }

        if let Some(ch) = adornment_char(line) {
            let overlined = lines.get(i + 2).and_then(|l| adornment_char(l)) == Some(ch)
                && lines.get(i + 1).is_some_and(|l| !is_blank(l));
            if overlined {
                blocks.push(Block::Section {
                    title: lines[i + 1].trim().to_owned(),
                    style: Adornment { ch, overline: true },
                });
                i += 3;
                continue;
            }
            let alone = lines.get(i + 1).is_none_or(|l| is_blank(l));
            if alone && line.trim_end().len() >= 4 {
                blocks.push(Block::Transition);
                i += 1;
                continue;
            }
        }

        if let Some(ch) = lines.get(i + 1).and_then(|l| adornment_char(l)) {
            let title = line.trim();
            let underline = lines[i + 1].trim_end().chars().count();
            if underline >= title.chars().count() || underline >= 4 {
                blocks.push(Block::Section {
                    title: title.to_owned(),
                    style: Adornment { ch, overline: false },
                });
                i += 2;
                continue;
            }
        }

        if line.trim_end() == ".." || line.starts_with(".. ") {
            let head = line.get(3..).unwrap_or_default().trim_end();
            let (body, next) = indented_block(lines, i + 1);
            blocks.extend(parse_explicit(head, body));
            i = next;
            continue;
        }

        if let Some(bullet) = bullet_width(line, None).and_then(|_| line.chars().next()) {
            let (items, next) = list_items(lines, i, |l| bullet_width(l, Some(bullet)));
            blocks.push(Block::BulletList(items.iter().map(|it| parse_blocks(it)).collect()));
            i = skip_blank_between(lines, next, |l| bullet_width(l, Some(bullet)).is_some(), &mut blocks);
            continue;
        }

        if enumerator_width(line).is_some() {
            let (items, next) = list_items(lines, i, enumerator_width);
            blocks.push(Block::EnumList(items.iter().map(|it| parse_blocks(it)).collect()));
            i = skip_blank_between(lines, next, |l| enumerator_width(l).is_some(), &mut blocks);
            continue;
        }

        let start = i;
        while i < lines.len() && !is_blank(&lines[i]) {
            i += 1;
        }
        let mut text = lines[start..i]
            .iter()
            .map(|l| l.trim())
            .collect::<Vec<_>>()
            .join("\n");

        let expects_literal = text.ends_with("::");
        if expects_literal {
            text.truncate(text.len() - 1);
            if text == ":" {
                text.clear();
            } else if text.ends_with(" :") || text.ends_with("\n:") {
                text.truncate(text.len() - 2);
            }
        }
        if !text.trim().is_empty() {
            blocks.push(Block::Paragraph(text));
        }

        if expects_literal {
            let mut j = i;
            while j < lines.len() && is_blank(&lines[j]) {
                j += 1;
            }
            if j < lines.len() && indent_of(&lines[j]) > 0 {
                let (literal, next) = indented_block(lines, j);
                blocks.push(Block::Literal(literal.join("\n")));
                i = next;
            }
        }
    }

    blocks
}

/// Lists of the same kind separated only by blank lines were split by
/// `list_items`; merge them back into the last list block.
fn skip_blank_between(
    lines: &[String],
    mut next: usize,
    continues: impl Fn(&str) -> bool,
    blocks: &mut [Block],
) -> usize {
    loop {
        let mut j = next;
        while j < lines.len() && is_blank(&lines[j]) {
            j += 1;
        }
        if j >= lines.len() || !continues(&lines[j]) {
            return next;
        }
        let (items, after) = match blocks.last() {
            Some(Block::BulletList(_)) => {
                let bullet = lines[j].chars().next();
                list_items(lines, j, |l| bullet_width(l, bullet))
            }
            _ => list_items(lines, j, enumerator_width),
        };
        if let Some(Block::BulletList(existing) | Block::EnumList(existing)) = blocks.last_mut() {
            existing.extend(items.iter().map(|it| parse_blocks(it)));
        }
        next = after;
    }
}

/// Explicit markup: directive, hyperlink target or comment.
fn parse_explicit(head: &str, body: Vec<String>) -> Option<Block> {
    if let Some(caps) = RE_TARGET.captures(head) {
        let name = caps.get(1).or(caps.get(2))?.as_str();
        let mut url = caps[3].to_owned();
        for line in &body {
            url.push_str(line.trim());
        }
        return Some(Block::Target {
            name: normalize_name(name),
            url,
        });
    }

    let caps = RE_DIRECTIVE.captures(head)?;
    let mut directive = Directive {
        name: caps[1].to_ascii_lowercase(),
        arguments: caps
            .get(2)
            .map(|m| m.as_str().split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default(),
        ..Default::default()
    };

    let mut lines = body.into_iter().peekable();
    while let Some(line) = lines.peek() {
        let Some(opt) = RE_OPTION.captures(line) else {
            break;
        };
        directive.options.insert(
            opt[1].to_ascii_lowercase(),
            opt.get(2).map_or_else(String::new, |m| m.as_str().to_owned()),
        );
        lines.next();
    }
    directive.content = lines.skip_while(|l| is_blank(l)).collect();
    Some(Block::Directive(directive))
}

fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn to_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|l| l.replace('\t', "        ").trim_end().to_owned())
        .collect()
}

/// Index of the promoted document title, if any.
fn title_index(blocks: &[Block]) -> Option<usize> {
    let (index, style) = blocks.iter().enumerate().find_map(|(i, b)| match b {
        Block::Target { .. } => None,
        Block::Section { style, .. } => Some(Some((i, *style))),
        _ => Some(None),
    })??;
    let reused = blocks
        .iter()
        .skip(index + 1)
        .any(|b| matches!(b, Block::Section { style: s, .. } if *s == style));
    (!reused).then_some(index)
}

// ============================================================================
// Rendering
// ============================================================================

/// A rendered document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Document {
    /// Plain-text title.
    pub title: Option<String>,
    pub html_title: Option<String>,
    pub fragment: String,
}

pub struct RenderOptions<'a> {
    pub initial_header_level: usize,
    pub directives: &'a Directives,
    pub source_dir: &'a Path,
}

/// The document title, without rendering anything else.
pub fn document_title(text: &str) -> Option<String> {
    let blocks = parse_blocks(&to_lines(text));
    let index = title_index(&blocks)?;
    match &blocks[index] {
        Block::Section { title, .. } => Some(plain_inline(title)),
        _ => None,
    }
}

pub fn render(text: &str, options: &RenderOptions<'_>) -> Result<Document> {
    let mut blocks = parse_blocks(&to_lines(text));

    let targets = collect_targets(&blocks);
    let title = title_index(&blocks).map(|index| blocks.remove(index));

    let mut renderer = Renderer {
        options,
        targets,
        styles: Vec::new(),
        title_promoted: false,
        open_sections: Vec::new(),
        ids: HashSet::new(),
    };

    let mut document = Document::default();
    if let Some(Block::Section { title, style }) = title {
        renderer.styles.push(style);
        renderer.title_promoted = true;
        let html = renderer.inline(&title);
        document.html_title = Some(format!("<h1 class=\"title\">{html}</h1>"));
        document.title = Some(plain_inline(&title));
    }

    let mut out = String::new();
    renderer.blocks(&blocks, &mut out)?;
    renderer.close_sections(0, &mut out);
    document.fragment = out;
    Ok(document)
}

fn collect_targets(blocks: &[Block]) -> HashMap<String, String> {
    let mut targets = HashMap::new();
    for block in blocks {
        match block {
            Block::Target { name, url } => {
                targets.insert(name.clone(), url.clone());
            }
            Block::Quote(inner) => targets.extend(collect_targets(inner)),
            Block::BulletList(items) | Block::EnumList(items) => {
                for item in items {
                    targets.extend(collect_targets(item));
                }
            }
            _ => {}
        }
    }
    targets
}

/// Inline markup reduced to its text.
fn plain_inline(text: &str) -> String {
    RE_INLINE
        .replace_all(text, |caps: &Captures<'_>| {
            [
                "literal", "strong", "em", "link_text", "role_text", "reference",
                "interpreted", "url", "word",
            ]
            .iter()
            .find_map(|name| caps.name(name))
            .map(|m| m.as_str().to_owned())
            .unwrap_or_default()
        })
        .replace('\n', " ")
}

struct Renderer<'a, 'b> {
    options: &'a RenderOptions<'b>,
    targets: HashMap<String, String>,
    /// Adornment styles in order of first appearance.
    styles: Vec<Adornment>,
    /// The first style belongs to the document title.
    title_promoted: bool,
    /// Depths of the currently open sections.
    open_sections: Vec<usize>,
    ids: HashSet<String>,
}

impl Renderer<'_, '_> {
    fn blocks(&mut self, blocks: &[Block], out: &mut String) -> Result<()> {
        for block in blocks {
            match block {
                Block::Section { title, style } => self.section(title, *style, out)?,
                Block::Paragraph(text) => writeln!(out, "<p>{}</p>", self.inline(text))?,
                Block::Literal(text) => {
                    writeln!(out, "<pre class=\"literal-block\">\n{}\n</pre>", escape_html(text))?;
                }
                Block::BulletList(items) => {
                    out.push_str("<ul class=\"simple\">\n");
                    self.list_items(items, out)?;
                    out.push_str("</ul>\n");
                }
                Block::EnumList(items) => {
                    out.push_str("<ol class=\"arabic simple\">\n");
                    self.list_items(items, out)?;
                    out.push_str("</ol>\n");
                }
                Block::Quote(inner) => {
                    out.push_str("<blockquote>\n");
                    self.blocks(inner, out)?;
                    out.push_str("</blockquote>\n");
                }
                Block::Directive(directive) => self.directive(directive, out)?,
                Block::Transition => out.push_str("<hr class=\"docutils\" />\n"),
                Block::Target { .. } => {}
            }
        }
        Ok(())
    }

    fn list_items(&mut self, items: &[Vec<Block>], out: &mut String) -> Result<()> {
        for item in items {
            match item.as_slice() {
                [Block::Paragraph(text)] => writeln!(out, "<li>{}</li>", self.inline(text))?,
                blocks => {
                    out.push_str("<li>");
                    self.blocks(blocks, out)?;
                    out.push_str("</li>\n");
                }
            }
        }
        Ok(())
    }

    fn section(&mut self, title: &str, style: Adornment, out: &mut String) -> Result<()> {
        let index = match self.styles.iter().position(|s| *s == style) {
            Some(index) => index,
            None => {
                self.styles.push(style);
                self.styles.len() - 1
            }
        };
        let depth = index.saturating_sub(usize::from(self.title_promoted));
        let level = (self.options.initial_header_level + depth).clamp(1, 6);

        self.close_sections(depth, out);
        let id = self.unique_id(title);
        writeln!(out, "<div class=\"section\" id=\"{id}\">")?;
        writeln!(out, "<h{level}>{}</h{level}>", self.inline(title))?;
        self.open_sections.push(depth);
        Ok(())
    }

    fn close_sections(&mut self, depth: usize, out: &mut String) {
        while self.open_sections.last().is_some_and(|d| *d >= depth) {
            self.open_sections.pop();
            out.push_str("</div>\n");
        }
    }

    fn unique_id(&mut self, title: &str) -> String {
        let base = slugify(&plain_inline(title));
        let mut id = base.clone();
        let mut n = 1;
        while !self.ids.insert(id.clone()) {
            id = format!("{base}-{n}");
            n += 1;
        }
        id
    }

    fn directive(&mut self, directive: &Directive, out: &mut String) -> Result<()> {
        if let Some(handler) = self.options.directives.get(&directive.name) {
            let env = DirectiveEnv {
                source_dir: self.options.source_dir,
            };
            out.push_str(&handler(directive, &env)?);
            return Ok(());
        }

        match directive.name.as_str() {
            "note" | "warning" | "tip" | "important" | "hint" | "caution" | "attention"
            | "danger" | "error" => {
                let mut lines = Vec::new();
                if !directive.arguments.is_empty() {
                    lines.push(directive.arguments.join(" "));
                    lines.push(String::new());
                }
                lines.extend(directive.content.iter().cloned());

                let name = &directive.name;
                let mut label = name.clone();
                if let Some(first) = label.get_mut(..1) {
                    first.make_ascii_uppercase();
                }
                writeln!(out, "<div class=\"admonition {name}\">")?;
                writeln!(out, "<p class=\"admonition-title\">{label}</p>")?;
                self.blocks(&parse_blocks(&lines), out)?;
                out.push_str("</div>\n");
            }
            "image" => {
                let Some(src) = directive.argument(0) else {
                    bail!("image directive needs a target");
                };
                let alt = directive.option("alt").unwrap_or(src);
                writeln!(out, "<img alt=\"{}\" src=\"{}\" />", escape_html(alt), escape_html(src))?;
            }
            "raw" if directive.argument(0) == Some("html") => {
                out.push_str(&directive.content_text());
            }
            "code" | "code-block" | "sourcecode" => {
                writeln!(out, "<pre class=\"literal-block\">\n{}</pre>", escape_html(&directive.content_text()))?;
            }
            name => log!("rst"; "unknown directive `{name}`, skipped"),
        }
        Ok(())
    }

    fn inline(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in RE_INLINE.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            out.push_str(&escape_html(&text[last..whole.start()]));
            out.push_str(&self.inline_markup(&caps));
            last = whole.end();
        }
        out.push_str(&escape_html(&text[last..]));
        out
    }

    fn inline_markup(&self, caps: &Captures<'_>) -> String {
        let text = |name: &str| caps.name(name).map(|m| m.as_str());

        if let Some(code) = text("literal") {
            return format!("<code>{}</code>", escape_html(code));
        }
        if let Some(strong) = text("strong") {
            return format!("<strong>{}</strong>", escape_html(strong));
        }
        if let Some(em) = text("em") {
            return format!("<em>{}</em>", escape_html(em));
        }
        if let Some(url) = text("link_url") {
            let label = text("link_text").filter(|t| !t.trim().is_empty()).unwrap_or(url);
            return link(url, label);
        }
        if let (Some(role), Some(body)) = (text("role"), text("role_text")) {
            return match role {
                "code" | "literal" => format!("<code>{}</code>", escape_html(body)),
                "strong" => format!("<strong>{}</strong>", escape_html(body)),
                "emphasis" => format!("<em>{}</em>", escape_html(body)),
                _ => format!("<span class=\"{}\">{}</span>", escape_html(role), escape_html(body)),
            };
        }
        if let Some(name) = text("reference").or_else(|| text("word")) {
            return match self.targets.get(&normalize_name(name)) {
                Some(url) => link(url, name),
                None => escape_html(name),
            };
        }
        if let Some(interpreted) = text("interpreted") {
            return format!("<cite>{}</cite>", escape_html(interpreted));
        }
        if let Some(url) = text("url") {
            return link(url, url);
        }
        String::new()
    }
}

fn link(url: &str, label: &str) -> String {
    format!(
        "<a class=\"reference external\" href=\"{}\">{}</a>",
        escape_html(url),
        escape_html(label)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn render_plain(text: &str) -> Document {
        let directives = Directives::default();
        let dir = PathBuf::from(".");
        render(
            text,
            &RenderOptions {
                initial_header_level: DEFAULT_HEADER_LEVEL,
                directives: &directives,
                source_dir: &dir,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_title_promoted_and_sections() {
        let doc = render_plain("Code Blocks\n===========\n\nIntro.\n\nFirst\n-----\n\nText.\n\nSecond\n------\n");
        assert_eq!(doc.title.as_deref(), Some("Code Blocks"));
        assert_eq!(doc.html_title.as_deref(), Some("<h1 class=\"title\">Code Blocks</h1>"));
        assert!(!doc.fragment.contains("Code Blocks"));
        assert!(doc.fragment.contains("<div class=\"section\" id=\"first\">\n<h2>First</h2>"));
        assert_eq!(doc.fragment.matches("<div class=\"section\"").count(), 2);
        assert_eq!(doc.fragment.matches("</div>").count(), 2);
    }

    #[test]
    fn test_reused_style_is_not_a_title() {
        let doc = render_plain("One\n===\n\nText.\n\nTwo\n===\n");
        assert_eq!(doc.title, None);
        assert!(doc.fragment.contains("<h2>One</h2>"));
        assert!(doc.fragment.contains("<h2>Two</h2>"));
    }

    #[test]
    fn test_overlined_title() {
        assert_eq!(document_title("=====\nAbout\n=====\n\nMe.\n").as_deref(), Some("About"));
        assert_eq!(document_title("Just text.\n"), None);
    }

    #[test]
    fn test_lists() {
        let doc = render_plain("- one\n- two\n  continued\n\n- three\n\n1. first\n2. second\n");
        assert!(doc.fragment.contains("<ul class=\"simple\">\n<li>one</li>\n<li>two\ncontinued</li>\n<li>three</li>\n</ul>"));
        assert!(doc.fragment.contains("<ol class=\"arabic simple\">\n<li>first</li>\n<li>second</li>\n</ol>"));
    }

    #[test]
    fn test_nested_list() {
        let doc = render_plain("- outer\n\n  - inner\n");
        assert!(doc.fragment.contains("<li><p>outer</p>\n<ul class=\"simple\">\n<li>inner</li>"));
    }

    #[test]
    fn test_literal_block() {
        let doc = render_plain("Example::\n\n    if a < b:\n        pass\n\nAfter.\n");
        assert!(doc.fragment.contains("<p>Example:</p>"));
        assert!(doc.fragment.contains("<pre class=\"literal-block\">\nif a &lt; b:\n    pass\n</pre>"));
        assert!(doc.fragment.contains("<p>After.</p>"));

        let expanded = render_plain("Shell ::\n\n  ls\n");
        assert!(expanded.fragment.contains("<p>Shell</p>"));
    }

    #[test]
    fn test_inline_markup() {
        let doc = render_plain("Some *em*, **strong**, ``a<b`` and `Rust <https://rust-lang.org>`_.\n");
        assert!(doc.fragment.contains("<em>em</em>"));
        assert!(doc.fragment.contains("<strong>strong</strong>"));
        assert!(doc.fragment.contains("<code>a&lt;b</code>"));
        assert!(doc.fragment.contains("<a class=\"reference external\" href=\"https://rust-lang.org\">Rust</a>"));
    }

    #[test]
    fn test_named_references() {
        let doc = render_plain("See Python_ and `the docs`_.\n\n.. _python: https://python.org\n.. _the docs: https://docs.python.org\n");
        assert!(doc.fragment.contains("href=\"https://python.org\">Python</a>"));
        assert!(doc.fragment.contains("href=\"https://docs.python.org\">the docs</a>"));
        assert!(!doc.fragment.contains(".. _"));
    }

    #[test]
    fn test_bare_url() {
        let doc = render_plain("Visit https://example.com/a.\n");
        assert!(doc.fragment.contains("href=\"https://example.com/a\">https://example.com/a</a>."));
    }

    #[test]
    fn test_directive_dispatch() {
        let mut directives = Directives::default();
        directives.register("shout", |d: &Directive, _: &DirectiveEnv<'_>| {
            Ok(format!(
                "<b>{}|{}|{}</b>\n",
                d.argument(0).unwrap_or_default(),
                d.option("times").unwrap_or_default(),
                d.content.join("+")
            ))
        });
        let dir = PathBuf::from(".");
        let doc = render(
            ".. shout:: hey\n   :times: 3\n\n   a\n   b\n\nDone.\n",
            &RenderOptions {
                initial_header_level: 2,
                directives: &directives,
                source_dir: &dir,
            },
        )
        .unwrap();
        assert!(doc.fragment.contains("<b>hey|3|a+b</b>"));
        assert!(doc.fragment.contains("<p>Done.</p>"));
    }

    #[test]
    fn test_directive_error_propagates() {
        let mut directives = Directives::default();
        directives.register("fail", |_: &Directive, _: &DirectiveEnv<'_>| bail!("nope"));
        let dir = PathBuf::from(".");
        let err = render(
            ".. fail::\n",
            &RenderOptions {
                initial_header_level: 2,
                directives: &directives,
                source_dir: &dir,
            },
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }

    #[test]
    fn test_comments_and_admonitions() {
        let doc = render_plain(".. a comment\n   spanning lines\n\n.. note:: Be careful.\n");
        assert!(!doc.fragment.contains("comment"));
        assert!(doc.fragment.contains("<p class=\"admonition-title\">Note</p>"));
        assert!(doc.fragment.contains("<p>Be careful.</p>"));
    }

    #[test]
    fn test_read_include_relative() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("dlc.sh"), "echo hi\n").unwrap();
        let env = DirectiveEnv { source_dir: dir.path() };

        assert_eq!(read_include(&env, "dlc.sh", "utf-8").unwrap(), "echo hi\n");
        assert!(read_include(&env, "missing.sh", "utf-8").is_err());
        assert!(read_include(&env, "dlc.sh", "shift-jis").is_err());
    }
}
