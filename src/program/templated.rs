//! Pieces shared by the programs that render into a template.

use crate::{
    builder::Builder,
    config::Layer,
    context::ContextId,
    utils::date::parse_pub_date,
};
use anyhow::{Result, bail};
use serde_json::Value;

/// Front-matter keys with a typed home on the context. Everything else only
/// lives in the context's layered configuration.
const DESTINATION_FILENAME: &str = "destination_filename";
const TITLE: &str = "title";
const PUB_DATE: &str = "pub_date";
const SUMMARY: &str = "summary";

/// Text of a front-matter value; lists (repeated Markdown meta keys) are
/// joined with spaces.
pub fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(text_value).collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        }
        _ => None,
    }
}

/// Merge `front_matter` into the context and apply the typed overrides.
/// `derived_title` is used when the front-matter has no title.
pub fn apply_front_matter(
    builder: &mut Builder,
    id: ContextId,
    front_matter: Layer,
    derived_title: Option<String>,
) -> Result<()> {
    let tz = builder.timezone();
    let context = builder.context_mut(id)?;

    if let Some(destination) = front_matter.get(DESTINATION_FILENAME).and_then(text_value) {
        context.set_destination(destination)?;
    }

    context.title = front_matter
        .get(TITLE)
        .and_then(text_value)
        .or(derived_title)
        .or(context.title.take());

    if let Some(value) = front_matter.get(PUB_DATE).filter(|v| !v.is_null()) {
        match parse_pub_date(value, tz) {
            Some(date) => context.pub_date = Some(date),
            None => bail!(
                "invalid pub_date {value} in `{}`",
                context.source().display()
            ),
        }
    }

    if let Some(summary) = front_matter.get(SUMMARY).and_then(text_value) {
        context.summary = Some(summary);
    }

    if !front_matter.is_empty() {
        context.config = context.config.with_layer(front_matter);
    }
    Ok(())
}

/// Render the context's template and write it to the destination.
///
/// The template is the `template` configuration value, else `default`.
pub fn publish(builder: &mut Builder, id: ContextId, default: &str, extra: Layer) -> Result<()> {
    let template = builder
        .context(id)?
        .config
        .get_str("template")
        .unwrap_or_else(|| default.to_owned());
    let html = builder.render_template(&template, extra, Some(id))?;
    builder.write_destination(id, &html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_value() {
        assert_eq!(text_value(&json!("Hello")).as_deref(), Some("Hello"));
        assert_eq!(text_value(&json!(["Hello", "World"])).as_deref(), Some("Hello World"));
        assert_eq!(text_value(&json!(3)).as_deref(), Some("3"));
        assert_eq!(text_value(&json!([])), None);
        assert_eq!(text_value(&json!({ "a": 1 })), None);
    }
}
