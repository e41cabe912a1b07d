//! Per-source build contexts.
//!
//! The builder owns every [`Context`] of a run in a [`ContextTable`].
//! Programs and signal handlers refer to contexts by [`ContextId`]; an id
//! from an earlier run no longer resolves and yields [`Error::Reference`].

use crate::{config::Config, error::Error, program::Program};
use anyhow::{Result, bail};
use chrono::{DateTime, FixedOffset};
use std::path::{Path, PathBuf};

/// Handle to a context in the current build run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId {
    index: usize,
    generation: u64,
}

pub struct Context {
    /// Source path relative to the source root.
    source: PathBuf,
    /// Destination path relative to the output root.
    destination: PathBuf,
    /// Global config overlaid by module defaults and front-matter.
    pub config: Config,
    pub title: Option<String>,
    pub pub_date: Option<DateTime<FixedOffset>>,
    pub summary: Option<String>,
    /// Stylesheets requested for this page, relative to the static folder.
    pub stylesheets: Vec<String>,
    published: bool,
    /// Taken out while the program is running.
    pub(crate) program: Option<Box<dyn Program>>,
}

impl Context {
    pub fn new(source: PathBuf, destination: PathBuf, config: Config) -> Self {
        Self {
            source,
            destination,
            config,
            title: None,
            pub_date: None,
            summary: None,
            stylesheets: Vec::new(),
            published: false,
            program: None,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    /// Change the destination; only allowed until the context is published.
    pub fn set_destination(&mut self, destination: impl Into<PathBuf>) -> Result<()> {
        if self.published {
            bail!(
                "destination of `{}` cannot change after it was published",
                self.source.display()
            );
        }
        self.destination = destination.into();
        Ok(())
    }

    pub(crate) fn mark_published(&mut self) {
        self.published = true;
    }

    /// Request a stylesheet once.
    pub fn add_stylesheet(&mut self, name: &str) {
        if !self.stylesheets.iter().any(|s| s == name) {
            self.stylesheets.push(name.to_owned());
        }
    }

    /// URL path of the published page.
    ///
    /// `a/b/index.html` becomes `/a/b/`, a bare `index.html` becomes `/`,
    /// any other file keeps its name.
    pub fn slug(&self) -> String {
        let dest = self.destination.to_string_lossy().replace('\\', "/");
        match dest.strip_suffix("index.html") {
            Some(folder) if folder.is_empty() || folder.ends_with('/') => {
                format!("/{}", folder.trim_start_matches('/'))
            }
            _ => format!("/{}", dest.trim_start_matches('/')),
        }
    }

    /// Secondary ordering key for entries sharing a publish date.
    pub fn tie_break(&self) -> i64 {
        self.config.get_as("day-order").unwrap_or(0)
    }
}

/// The contexts of the current build run.
#[derive(Default)]
pub struct ContextTable {
    contexts: Vec<Context>,
    generation: u64,
}

impl ContextTable {
    pub fn insert(&mut self, context: Context) -> ContextId {
        self.contexts.push(context);
        ContextId {
            index: self.contexts.len() - 1,
            generation: self.generation,
        }
    }

    pub fn get(&self, id: ContextId) -> Result<&Context, Error> {
        if id.generation != self.generation {
            return Err(Error::Reference);
        }
        self.contexts.get(id.index).ok_or(Error::Reference)
    }

    pub fn get_mut(&mut self, id: ContextId) -> Result<&mut Context, Error> {
        if id.generation != self.generation {
            return Err(Error::Reference);
        }
        self.contexts.get_mut(id.index).ok_or(Error::Reference)
    }

    /// Ids of the live contexts, in insertion order.
    pub fn ids(&self) -> Vec<ContextId> {
        (0..self.contexts.len())
            .map(|index| ContextId {
                index,
                generation: self.generation,
            })
            .collect()
    }

    /// Destination the context for `source` resolved to, front-matter
    /// overrides included. Outlives the run until the next one starts.
    pub fn destination_of(&self, source: &Path) -> Option<&Path> {
        self.contexts
            .iter()
            .find(|context| context.source == source)
            .map(|context| context.destination.as_path())
    }

    /// Drop every context; outstanding ids stop resolving.
    pub fn clear(&mut self) {
        self.contexts.clear();
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(destination: &str) -> Context {
        Context::new("src.rst".into(), destination.into(), Config::default())
    }

    #[test]
    fn test_slug() {
        assert_eq!(context("index.html").slug(), "/");
        assert_eq!(context("about/index.html").slug(), "/about/");
        assert_eq!(context("2022/02/21/codeblocks/index.html").slug(), "/2022/02/21/codeblocks/");
        assert_eq!(context("2022/02/02/dlc.sh").slug(), "/2022/02/02/dlc.sh");
        assert_eq!(context("notindex.html").slug(), "/notindex.html");
    }

    #[test]
    fn test_destination_frozen_after_publish() {
        let mut ctx = context("a/index.html");
        ctx.set_destination("b/index.html").unwrap();
        assert_eq!(ctx.slug(), "/b/");

        ctx.mark_published();
        assert!(ctx.set_destination("c/index.html").is_err());
        assert_eq!(ctx.destination(), Path::new("b/index.html"));
    }

    #[test]
    fn test_stylesheets_deduplicated() {
        let mut ctx = context("index.html");
        ctx.add_stylesheet("_pygments.css");
        ctx.add_stylesheet("_pygments.css");
        assert_eq!(ctx.stylesheets, ["_pygments.css"]);
    }

    #[test]
    fn test_stale_id_is_reference_error() {
        let mut table = ContextTable::default();
        let id = table.insert(context("index.html"));
        assert!(table.get(id).is_ok());

        table.clear();
        assert!(matches!(table.get(id), Err(Error::Reference)));

        // A new context in the same slot still rejects the old id.
        let fresh = table.insert(context("index.html"));
        assert!(matches!(table.get_mut(id), Err(Error::Reference)));
        assert!(table.get(fresh).is_ok());
    }

    #[test]
    fn test_destination_of_keeps_overrides() {
        let mut table = ContextTable::default();
        let id = table.insert(context("src/index.html"));
        table.get_mut(id).unwrap().set_destination("custom/place.html").unwrap();

        assert_eq!(table.destination_of(Path::new("src.rst")), Some(Path::new("custom/place.html")));
        assert_eq!(table.destination_of(Path::new("other.rst")), None);

        table.clear();
        assert_eq!(table.destination_of(Path::new("src.rst")), None);
    }

    #[test]
    fn test_tie_break_default() {
        assert_eq!(context("index.html").tie_break(), 0);
    }
}
