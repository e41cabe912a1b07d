use super::Program;
use crate::{builder::Builder, context::ContextId};
use anyhow::{Context as _, Result};
use std::fs;

/// Copies the source over unchanged.
pub struct CopyProgram {
    id: ContextId,
}

impl CopyProgram {
    pub fn new(id: ContextId) -> Self {
        Self { id }
    }
}

impl Program for CopyProgram {
    fn run(&mut self, builder: &mut Builder) -> Result<()> {
        let source = builder.full_source(self.id)?;
        let destination = builder.full_destination(self.id)?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&source, &destination).with_context(|| {
            format!("failed to copy {} to {}", source.display(), destination.display())
        })?;
        Ok(())
    }
}
