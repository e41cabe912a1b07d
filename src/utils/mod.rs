//! Helpers shared across the build.

pub mod atom;
pub mod date;
pub mod log;
pub mod minify;
pub mod slug;
