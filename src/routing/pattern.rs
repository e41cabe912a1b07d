//! Path template engine.
//!
//! A route pattern is a `/`-delimited list of segments. A segment of the form
//! `<converter:name>` or `<name>` is a typed placeholder, anything else is a
//! literal. Compiled patterns both match concrete paths and build them back
//! from values.
//!
//! | Converter | Matches                         | Builds            |
//! |-----------|---------------------------------|-------------------|
//! | `int`     | `\d+`                           | plain decimal     |
//! | `string`  | one non-empty segment           | url-encoded text  |
//! | `path`    | remaining segments (greedy)     | text, `/` kept    |

use crate::error::Error;
use regex::Regex;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
    sync::LazyLock,
};

/// Values bound to placeholder names.
pub type RouteValues = BTreeMap<String, RouteValue>;

/// Placeholder syntax: `<name>` or `<converter:name>`.
static RE_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<(?:([A-Za-z_]+):)?([A-Za-z_][A-Za-z0-9_]*)>$").unwrap()
});

// ============================================================================
// Values
// ============================================================================

/// A typed placeholder value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RouteValue {
    Int(u64),
    Str(String),
}

impl RouteValue {
    pub fn as_int(&self) -> Option<u64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Str(s) => s.parse().ok(),
        }
    }
}

impl fmt::Display for RouteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<u64> for RouteValue {
    fn from(value: u64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for RouteValue {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<usize> for RouteValue {
    fn from(value: usize) -> Self {
        Self::Int(value as u64)
    }
}

impl From<i32> for RouteValue {
    fn from(value: i32) -> Self {
        match u64::try_from(value) {
            Ok(n) => Self::Int(n),
            Err(_) => Self::Str(value.to_string()),
        }
    }
}

impl From<&str> for RouteValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for RouteValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Build a [`RouteValues`] map from `name => value` pairs.
#[macro_export]
macro_rules! route_values {
    () => { $crate::routing::RouteValues::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut values = $crate::routing::RouteValues::new();
        $( values.insert($name.to_string(), $crate::routing::RouteValue::from($value)); )+
        values
    }};
}

// ============================================================================
// Pattern
// ============================================================================

/// How a placeholder converts between path text and values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    Int,
    String,
    Path,
}

impl Converter {
    fn parse(name: Option<&str>) -> Option<Self> {
        match name.unwrap_or("string") {
            "int" => Some(Self::Int),
            "string" | "default" => Some(Self::String),
            "path" => Some(Self::Path),
            _ => None,
        }
    }

    const fn is_greedy(self) -> bool {
        matches!(self, Self::Path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder { name: String, converter: Converter },
}

/// A compiled route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    source: String,
    segments: Vec<Segment>,
    trailing_slash: bool,
}

impl RoutePattern {
    /// Compile a pattern string.
    pub fn compile(pattern: &str) -> Result<Self, Error> {
        let body = pattern.trim_start_matches('/');
        let trailing_slash = body.ends_with('/');
        let body = body.trim_end_matches('/');

        let mut segments = Vec::new();
        let mut seen = BTreeSet::new();
        let parts: Vec<&str> = if body.is_empty() {
            Vec::new()
        } else {
            body.split('/').collect()
        };

        for (index, part) in parts.iter().enumerate() {
            let Some(caps) = RE_PLACEHOLDER.captures(part) else {
                segments.push(Segment::Literal((*part).to_owned()));
                continue;
            };

            let name = caps[2].to_owned();
            let converter = Converter::parse(caps.get(1).map(|m| m.as_str())).ok_or_else(|| {
                Error::pattern(pattern, format!("unknown converter in `{part}`"))
            })?;

            if !seen.insert(name.clone()) {
                return Err(Error::pattern(
                    pattern,
                    format!("duplicate placeholder `{name}`"),
                ));
            }
            if converter.is_greedy() && index + 1 != parts.len() {
                return Err(Error::pattern(
                    pattern,
                    format!("greedy placeholder `{name}` must be the last segment"),
                ));
            }

            segments.push(Segment::Placeholder { name, converter });
        }

        Ok(Self {
            source: pattern.to_owned(),
            segments,
            trailing_slash,
        })
    }

    /// The pattern string this was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder names in declaration order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|seg| match seg {
            Segment::Placeholder { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    fn is_greedy(&self) -> bool {
        matches!(
            self.segments.last(),
            Some(Segment::Placeholder { converter, .. }) if converter.is_greedy()
        )
    }

    /// Match a concrete path, returning the typed placeholder values.
    ///
    /// `None` is an expected outcome, not an error.
    pub fn matches(&self, path: &str) -> Option<RouteValues> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let body = path.trim_start_matches('/');
        let trailing_slash = body.ends_with('/');
        let body = body.trim_end_matches('/');
        let parts: Vec<&str> = if body.is_empty() {
            Vec::new()
        } else {
            body.split('/').collect()
        };

        let greedy = self.is_greedy();
        if !greedy {
            if parts.len() != self.segments.len() {
                return None;
            }
            if !self.segments.is_empty() && trailing_slash != self.trailing_slash {
                return None;
            }
        }

        let mut values = RouteValues::new();
        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(literal) => {
                    if parts.get(index) != Some(&literal.as_str()) {
                        return None;
                    }
                }
                Segment::Placeholder { name, converter } => {
                    let value = match converter {
                        Converter::Int => {
                            let part = parts.get(index)?;
                            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                                return None;
                            }
                            RouteValue::Int(part.parse().ok()?)
                        }
                        Converter::String => {
                            let part = parts.get(index).filter(|p| !p.is_empty())?;
                            RouteValue::Str(decode(part)?)
                        }
                        Converter::Path => {
                            let rest = parts.get(index..).filter(|r| !r.is_empty())?;
                            if rest.iter().any(|p| p.is_empty()) {
                                return None;
                            }
                            let decoded: Option<Vec<String>> =
                                rest.iter().map(|p| decode(p)).collect();
                            RouteValue::Str(decoded?.join("/"))
                        }
                    };
                    values.insert(name.clone(), value);
                }
            }
        }

        Some(values)
    }

    /// Build a path from values, substituting every placeholder.
    pub fn build(&self, values: &RouteValues) -> Result<String, Error> {
        let mut parts = Vec::with_capacity(self.segments.len());

        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => parts.push(literal.clone()),
                Segment::Placeholder { name, converter } => {
                    let value = values.get(name).ok_or_else(|| {
                        Error::route_build(format!(
                            "missing value for `{name}` in `{}`",
                            self.source
                        ))
                    })?;
                    parts.push(self.render(name, *converter, value)?);
                }
            }
        }

        if parts.is_empty() {
            return Ok("/".to_owned());
        }

        let mut path = format!("/{}", parts.join("/"));
        if self.trailing_slash {
            path.push('/');
        }
        Ok(path)
    }

    fn render(&self, name: &str, converter: Converter, value: &RouteValue) -> Result<String, Error> {
        let invalid = |what: &str| {
            Error::route_build(format!(
                "value `{value}` for `{name}` in `{}` {what}",
                self.source
            ))
        };

        match converter {
            Converter::Int => value
                .as_int()
                .map(|n| n.to_string())
                .ok_or_else(|| invalid("is not a non-negative integer")),
            Converter::String => {
                let text = value.to_string();
                if text.is_empty() || text.contains('/') {
                    return Err(invalid("is not a single path segment"));
                }
                Ok(urlencoding::encode(&text).into_owned())
            }
            Converter::Path => {
                let text = value.to_string();
                let text = text.trim_matches('/');
                if text.is_empty() {
                    return Err(invalid("is empty"));
                }
                Ok(text
                    .split('/')
                    .map(|p| urlencoding::encode(p).into_owned())
                    .collect::<Vec<_>>()
                    .join("/"))
            }
        }
    }
}

impl FromStr for RoutePattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn decode(part: &str) -> Option<String> {
    urlencoding::decode(part).ok().map(|s| s.into_owned())
}
