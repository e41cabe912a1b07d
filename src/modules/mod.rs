//! Build modules.
//!
//! A module hooks into a [`Builder`] once, at setup: it registers URL
//! endpoints, connects signal handlers, and may add template variables,
//! directives or programs. Modules are enabled by name in
//! `[build] modules`.

pub mod blog;
pub mod highlight;
pub mod tags;

use crate::builder::Builder;
use anyhow::Result;

pub trait Module {
    fn name(&self) -> &str;

    fn setup(&self, builder: &mut Builder) -> Result<()>;
}

/// The module shipped under `name`, if any.
pub fn builtin(name: &str) -> Option<Box<dyn Module>> {
    match name {
        "blog" => Some(Box::new(blog::Blog)),
        "highlight" => Some(Box::new(highlight::Highlight)),
        "tags" => Some(Box::new(tags::Tags)),
        _ => None,
    }
}
