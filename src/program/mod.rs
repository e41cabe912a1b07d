//! Build programs.
//!
//! A program is the build strategy attached to one [`Context`] for its
//! lifetime. Programs are registered by name as a [`ProgramKind`]: a pure
//! function giving the destination a source would get, and a constructor.
//! Keeping the first one free of program state lets the freshness check run
//! over the whole source tree without creating anything.
//!
//! [`Context`]: crate::context::Context

mod copy;
mod markdown;
mod rst;
mod templated;

pub use copy::CopyProgram;
pub use markdown::MarkdownProgram;
pub use rst::RstProgram;

use crate::{builder::Builder, context::ContextId};
use anyhow::Result;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

/// Name of the program used for extensions nobody claimed.
pub const DEFAULT_PROGRAM: &str = "copy";

pub trait Program {
    /// Read what the context needs before any signal fires (title, dates,
    /// destination overrides).
    fn prepare(&mut self, _builder: &mut Builder) -> Result<()> {
        Ok(())
    }

    /// Produce the destination file.
    fn run(&mut self, builder: &mut Builder) -> Result<()>;

    /// The rendered body fragment. Rendered at most once per context.
    fn render_contents(&mut self, _builder: &Builder) -> Result<String> {
        Ok(String::new())
    }
}

#[derive(Clone, Copy)]
pub struct ProgramKind {
    /// Destination (relative to the output folder) for a source path
    /// relative to the source folder.
    pub desired_filename: fn(&Path) -> PathBuf,
    pub create: fn(ContextId) -> Box<dyn Program>,
}

impl ProgramKind {
    pub fn desired_filename(&self, source: &Path) -> PathBuf {
        (self.desired_filename)(source)
    }

    pub fn create(&self, id: ContextId) -> Box<dyn Program> {
        (self.create)(id)
    }
}

pub fn builtin() -> HashMap<String, ProgramKind> {
    HashMap::from([
        (
            "copy".to_owned(),
            ProgramKind {
                desired_filename: Path::to_path_buf,
                create: |id| Box::new(CopyProgram::new(id)),
            },
        ),
        (
            "rst".to_owned(),
            ProgramKind {
                desired_filename: page_filename,
                create: |id| Box::new(RstProgram::new(id)),
            },
        ),
        (
            "markdown".to_owned(),
            ProgramKind {
                desired_filename: page_filename,
                create: |id| Box::new(MarkdownProgram::new(id)),
            },
        ),
    ])
}

/// Pretty destination for a rendered page: `about.rst` becomes
/// `about/index.html`, an `index` source stays the folder's index.
pub fn page_filename(source: &Path) -> PathBuf {
    let folder = source.parent().unwrap_or(Path::new(""));
    match source.file_stem().and_then(|stem| stem.to_str()) {
        Some("index") | None => folder.join("index.html"),
        Some(stem) => folder.join(stem).join("index.html"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_filename() {
        assert_eq!(page_filename(Path::new("about.rst")), PathBuf::from("about/index.html"));
        assert_eq!(
            page_filename(Path::new("2022/02/21/codeblocks.rst")),
            PathBuf::from("2022/02/21/codeblocks/index.html")
        );
        assert_eq!(page_filename(Path::new("index.md")), PathBuf::from("index.html"));
        assert_eq!(page_filename(Path::new("docs/index.rst")), PathBuf::from("docs/index.html"));
    }

    #[test]
    fn test_builtin_kinds() {
        let kinds = builtin();
        let copy = kinds[DEFAULT_PROGRAM];
        assert_eq!(
            copy.desired_filename(Path::new("2022/02/02/dlc.sh")),
            PathBuf::from("2022/02/02/dlc.sh")
        );
        assert_eq!(
            kinds["markdown"].desired_filename(Path::new("notes.md")),
            PathBuf::from("notes/index.html")
        );
        assert!(kinds.contains_key("rst"));
    }
}
