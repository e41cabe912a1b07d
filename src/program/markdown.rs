use super::{Program, templated};
use crate::{
    builder::Builder,
    config::Layer,
    context::ContextId,
    frontmatter::split_markdown,
    render::markdown::{Rendered, render},
};
use anyhow::Result;
use serde_json::Value;

const DEFAULT_TEMPLATE: &str = "md_display.html";

/// Renders a Markdown file into a template.
///
/// The whole file is converted during `prepare`: metadata and body come out
/// of the same pass.
pub struct MarkdownProgram {
    id: ContextId,
    rendered: Rendered,
}

impl MarkdownProgram {
    pub fn new(id: ContextId) -> Self {
        Self {
            id,
            rendered: Rendered::default(),
        }
    }
}

impl Program for MarkdownProgram {
    fn prepare(&mut self, builder: &mut Builder) -> Result<()> {
        let text = builder.read_source(self.id)?;
        let (meta, body) = split_markdown(&text);

        let highlighter = builder.highlighter();
        self.rendered = render(body, highlighter.as_deref())?;

        let title = self.rendered.first_heading.clone();
        templated::apply_front_matter(builder, self.id, meta, title)
    }

    fn run(&mut self, builder: &mut Builder) -> Result<()> {
        let context = builder.context(self.id)?;
        let title = context.title.clone().map_or(Value::Null, Value::String);
        let summary = context.summary.clone().map_or(Value::Null, Value::String);

        let mut md = Layer::new();
        md.insert("fragment".into(), Value::String(self.rendered.html.clone()));
        md.insert("title".into(), title.clone());
        md.insert("html_title".into(), title);
        md.insert("summary".into(), summary);

        let mut extra = Layer::new();
        extra.insert("md".into(), Value::Object(md));
        templated::publish(builder, self.id, DEFAULT_TEMPLATE, extra)
    }

    fn render_contents(&mut self, _builder: &Builder) -> Result<String> {
        Ok(self.rendered.html.clone())
    }
}
