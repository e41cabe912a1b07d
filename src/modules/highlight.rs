//! Syntax highlighting for reStructuredText code directives.
//!
//! One [`Highlighter`] is built from `modules.highlight.style` and shared by
//! the builder (Markdown fences) and the directive handlers registered here.

use super::Module;
use crate::{
    builder::Builder,
    render::{
        highlight::{DEFAULT_STYLE, HighlightOptions, Highlighter, LineSpec, parse_line_spec},
        rst::{Directive, DirectiveEnv, read_include},
    },
    signals::BEFORE_FILE_PROCESSED,
};
use anyhow::{Context as _, Result, anyhow};
use std::{io::Write, path::Path, rc::Rc};

const STYLESHEET: &str = "_pygments.css";

pub struct Highlight;

impl Module for Highlight {
    fn name(&self) -> &str {
        "highlight"
    }

    fn setup(&self, builder: &mut Builder) -> Result<()> {
        let style = builder
            .config()
            .root_get_str("modules.highlight.style")
            .unwrap_or_else(|| DEFAULT_STYLE.to_owned());
        let highlighter = Rc::new(Highlighter::new(&style)?);
        builder.set_highlighter(Rc::clone(&highlighter));

        let directives = builder.directives_mut();
        for name in ["code-block", "sourcecode"] {
            let hl = Rc::clone(&highlighter);
            directives.register(name, move |directive, _| code_block(&hl, directive));
        }
        let hl = Rc::clone(&highlighter);
        directives.register("literalinclude", move |directive, env| literal_include(&hl, directive, env));

        builder.connect(BEFORE_FILE_PROCESSED, |builder, id| {
            builder.context_mut(*id)?.add_stylesheet(STYLESHEET);
            Ok(())
        });
        builder.connect_build_finished(move |builder, _| {
            let mut file = builder.open_static_file(STYLESHEET)?;
            file.write_all(highlighter.stylesheet().as_bytes())?;
            file.finish()
        });
        Ok(())
    }
}

fn options(directive: &Directive) -> Result<HighlightOptions> {
    let number = |name: &str, default: usize| -> Result<usize> {
        match directive.option(name) {
            Some(value) => value
                .trim()
                .parse()
                .with_context(|| format!("`:{name}:` of `{}` expects a number", directive.name)),
            None => Ok(default),
        }
    };

    Ok(HighlightOptions {
        linenos: ["linenos", "lineno-start", "lineno-step"]
            .iter()
            .any(|name| directive.has_option(name)),
        lineno_start: number("lineno-start", 1)?,
        lineno_step: number("lineno-step", 1)?,
        emphasize: match directive.option("emphasize-lines") {
            Some(spec) => parse_line_spec(spec)?,
            None => LineSpec::default(),
        },
        caption: directive.option("caption").map(str::to_owned),
    })
}

fn code_block(highlighter: &Highlighter, directive: &Directive) -> Result<String> {
    let language = directive
        .argument(0)
        .ok_or_else(|| anyhow!("`{}` needs a language argument", directive.name))?;
    let mut code = directive.content.join("\n");
    code.push('\n');
    highlighter.block(&code, Some(language), &options(directive)?)
}

fn literal_include(highlighter: &Highlighter, directive: &Directive, env: &DirectiveEnv<'_>) -> Result<String> {
    let filename = directive
        .argument(0)
        .ok_or_else(|| anyhow!("`literalinclude` needs a file name"))?;
    let encoding = directive.option("encoding").unwrap_or("utf-8");
    let text = read_include(env, filename, encoding)?;
    let mut options = options(directive)?;

    let mut lines: Vec<&str> = text.split_inclusive('\n').collect();
    if let Some(cut) = directive.option("lines") {
        let (start, stop) = cut
            .split_once('-')
            .ok_or_else(|| anyhow!("`:lines:` expects `start-stop`, got `{cut}`"))?;
        let start = match start.trim() {
            "" => 0,
            s => s.parse::<usize>()?.saturating_sub(1),
        };
        let stop = match stop.trim() {
            "" => lines.len(),
            s => s.parse::<usize>()?.min(lines.len()),
        };
        lines = lines.get(start..stop.max(start)).unwrap_or_default().to_vec();
        if options.linenos && !directive.has_option("lineno-start") {
            options.lineno_start = start + 1;
        }
    }

    if options.caption.as_deref() == Some("") {
        options.caption = Path::new(filename)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
    }

    highlighter.block(&lines.concat(), directive.option("language"), &options)
}
