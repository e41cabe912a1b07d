//! Build error taxonomy.
//!
//! Every variant here aborts the build. The "no match" outcome of route
//! matching is an `Option::None`, never one of these.

use std::path::PathBuf;
use thiserror::Error;

/// Maximum number of characters of an offending value kept in messages.
const REPR_LIMIT: usize = 40;

/// Errors raised by the build core.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed route pattern (duplicate or misplaced placeholder).
    #[error("invalid route pattern `{pattern}`: {reason}")]
    Pattern { pattern: String, reason: String },

    /// A link could not be built (missing value or no matching variant).
    #[error("cannot build route: {0}")]
    RouteBuild(String),

    /// Front-matter did not parse to a mapping.
    #[error("expected a mapping as front-matter in `{path}`, got: {value}")]
    Config { path: PathBuf, value: String },

    /// A context was looked up after its build run went away.
    #[error("context went away, program is invalid")]
    Reference,

    /// Malformed line-number specification in a highlight directive.
    #[error("invalid line number spec: {0:?}")]
    LineSpec(String),
}

impl Error {
    pub fn pattern(pattern: &str, reason: impl Into<String>) -> Self {
        Self::Pattern {
            pattern: pattern.to_owned(),
            reason: reason.into(),
        }
    }

    pub fn route_build(message: impl Into<String>) -> Self {
        Self::RouteBuild(message.into())
    }

    /// Front-matter error carrying a truncated debug representation of `value`.
    pub fn config(path: impl Into<PathBuf>, value: &impl std::fmt::Debug) -> Self {
        let repr = format!("{value:?}");
        let value = match repr.char_indices().nth(REPR_LIMIT) {
            Some((end, _)) => repr[..end].to_owned(),
            None => repr,
        };
        Self::Config {
            path: path.into(),
            value,
        }
    }
}
