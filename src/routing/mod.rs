//! URL routing: compiled path templates and the endpoint registry.

mod pattern;
mod registry;

pub use pattern::{RoutePattern, RouteValue, RouteValues};
pub use registry::{PatternSource, UrlRegistry};
