//! Source formats and their HTML output.

pub mod highlight;
pub mod markdown;
pub mod rst;
pub mod template;
