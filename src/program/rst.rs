use super::{Program, templated};
use crate::{
    builder::Builder,
    config::Layer,
    context::ContextId,
    frontmatter::{parse_header, split_rst},
    render::rst::{DEFAULT_HEADER_LEVEL, Document, RenderOptions, document_title, render},
};
use anyhow::Result;
use std::path::Path;

const DEFAULT_TEMPLATE: &str = "rst_display.html";

/// Renders a reStructuredText file into a template.
///
/// `prepare` only reads the header block and the document title; the body
/// is rendered on first use and cached for the feed writers and the page.
pub struct RstProgram {
    id: ContextId,
    body: String,
    fragments: Option<Document>,
}

impl RstProgram {
    pub fn new(id: ContextId) -> Self {
        Self {
            id,
            body: String::new(),
            fragments: None,
        }
    }

    fn fragments(&mut self, builder: &Builder) -> Result<&Document> {
        let document = match self.fragments.take() {
            Some(document) => document,
            None => {
                let context = builder.context(self.id)?;
                let source = builder.full_source(self.id)?;
                let options = RenderOptions {
                    initial_header_level: context
                        .config
                        .get_as("rst_header_level")
                        .unwrap_or(DEFAULT_HEADER_LEVEL),
                    directives: builder.directives(),
                    source_dir: source.parent().unwrap_or(Path::new(".")),
                };
                render(&self.body, &options)?
            }
        };
        Ok(self.fragments.insert(document))
    }
}

impl Program for RstProgram {
    fn prepare(&mut self, builder: &mut Builder) -> Result<()> {
        let text = builder.read_source(self.id)?;
        let path = builder.context(self.id)?.source().to_path_buf();

        let split = split_rst(&text);
        let header = match split.header {
            Some(header) => parse_header(header, &path)?,
            None => Layer::new(),
        };
        self.body = split.body.to_owned();
        self.fragments = None;

        let title = document_title(&self.body);
        templated::apply_front_matter(builder, self.id, header, title)
    }

    fn run(&mut self, builder: &mut Builder) -> Result<()> {
        let document = self.fragments(builder)?;
        let mut extra = Layer::new();
        extra.insert("rst".into(), serde_json::to_value(document)?);
        templated::publish(builder, self.id, DEFAULT_TEMPLATE, extra)
    }

    fn render_contents(&mut self, builder: &Builder) -> Result<String> {
        Ok(self.fragments(builder)?.fragment.clone())
    }
}
