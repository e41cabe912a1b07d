//! Template environment.
//!
//! Templates are looked up in the site's template folder first and fall back
//! to the set compiled into the binary. Every template sees:
//!
//! - `config`: the merged global configuration
//! - `link_to(endpoint, **values)`: reverse routing through the registry
//! - `|format_date(fmt)`: locale-aware date formatting of RFC 3339 strings
//!
//! `.html` templates auto-escape `& < > " '` only, so links come out as
//! written (`/page/2/`, not `&#x2f;page&#x2f;2&#x2f;`).

use crate::{
    config::Layer,
    routing::{RouteValue, RouteValues, UrlRegistry},
    utils::date,
};
use chrono::DateTime;
use minijinja::{
    AutoEscape, Environment, Error, ErrorKind, Output, State, escape_formatter,
    value::{Kwargs, Value},
};
use quick_xml::escape::escape;
use std::{
    fs,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

/// Templates compiled into the binary.
const BUILTIN: &[(&str, &str)] = &[
    ("layout.html", include_str!("../embed/templates/layout.html")),
    ("rst_display.html", include_str!("../embed/templates/rst_display.html")),
    ("md_display.html", include_str!("../embed/templates/md_display.html")),
    ("_entry.html", include_str!("../embed/templates/_entry.html")),
    ("blog/index.html", include_str!("../embed/templates/blog/index.html")),
    ("blog/archive.html", include_str!("../embed/templates/blog/archive.html")),
    ("blog/year_archive.html", include_str!("../embed/templates/blog/year_archive.html")),
    ("blog/month_archive.html", include_str!("../embed/templates/blog/month_archive.html")),
    ("tags/cloud.html", include_str!("../embed/templates/tags/cloud.html")),
    ("tags/tag.html", include_str!("../embed/templates/tags/tag.html")),
];

const DEFAULT_DATE_FORMAT: &str = "%B %-d, %Y";

pub fn builtin(name: &str) -> Option<&'static str> {
    BUILTIN
        .iter()
        .find_map(|(builtin, source)| (*builtin == name).then_some(*source))
}

/// Build the environment. `urls` is a snapshot taken after module setup.
pub fn environment(
    template_dir: &Path,
    urls: Arc<UrlRegistry>,
    config: &Layer,
    locale: &str,
) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_formatter(html_formatter);

    let dir = template_dir.to_path_buf();
    env.set_loader(move |name| load(&dir, name));

    env.add_function("link_to", move |endpoint: String, kwargs: Kwargs| {
        link_to(&urls, &endpoint, &kwargs)
    });

    let locale = locale.to_owned();
    env.add_filter("format_date", move |value: Value, fmt: Option<String>| {
        format_date(&value, fmt.as_deref(), &locale)
    });

    env.add_global("config", Value::from_serialize(config));
    env
}

fn html_formatter(out: &mut Output, state: &State, value: &Value) -> Result<(), Error> {
    match (state.auto_escape(), value.as_str()) {
        (AutoEscape::Html, Some(text)) if !value.is_safe() => out
            .write_str(&escape(text))
            .map_err(|_| Error::new(ErrorKind::WriteFailure, "failed to write template output")),
        _ => escape_formatter(out, state, value),
    }
}

fn load(dir: &Path, name: &str) -> Result<Option<String>, Error> {
    if let Some(path) = safe_join(dir, name)
        && path.is_file()
    {
        return fs::read_to_string(&path).map(Some).map_err(|err| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("cannot read template `{}`", path.display()),
            )
            .with_source(err)
        });
    }
    Ok(builtin(name).map(str::to_owned))
}

/// `dir/name`, refusing names that climb out of `dir`.
fn safe_join(dir: &Path, name: &str) -> Option<PathBuf> {
    let mut path = dir.to_path_buf();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(path)
}

fn link_to(urls: &UrlRegistry, endpoint: &str, kwargs: &Kwargs) -> Result<String, Error> {
    let mut values = RouteValues::new();
    for key in kwargs.args() {
        let value: Value = kwargs.get(key)?;
        values.insert(key.to_owned(), route_value(&value));
    }
    kwargs.assert_all_used()?;

    urls.build_link(endpoint, &values)
        .map_err(|err| Error::new(ErrorKind::InvalidOperation, err.to_string()))
}

fn route_value(value: &Value) -> RouteValue {
    if let Some(n) = value.as_i64().and_then(|n| u64::try_from(n).ok()) {
        return RouteValue::Int(n);
    }
    match value.as_str() {
        Some(s) => RouteValue::Str(s.to_owned()),
        None => RouteValue::Str(value.to_string()),
    }
}

fn format_date(value: &Value, fmt: Option<&str>, locale: &str) -> Result<String, Error> {
    if value.is_undefined() || value.is_none() {
        return Ok(String::new());
    }
    let text = value.as_str().ok_or_else(|| {
        Error::new(ErrorKind::InvalidOperation, "format_date expects a date string")
    })?;
    let parsed = DateTime::parse_from_rfc3339(text).map_err(|err| {
        Error::new(ErrorKind::InvalidOperation, format!("invalid date `{text}`")).with_source(err)
    })?;
    Ok(date::format_date(&parsed, fmt.unwrap_or(DEFAULT_DATE_FORMAT), locale))
}
