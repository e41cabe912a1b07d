//! Layered configuration lookup.
//!
//! A [`Config`] is a stack of JSON-like maps. The bottom layer is the global
//! site configuration, further layers are added for module defaults and for
//! per-file front-matter. Keys are dotted paths into nested maps:
//! `modules.blog.per_page` reads `{"modules": {"blog": {"per_page": ..}}}`.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;

/// A JSON object, the unit of one configuration layer.
pub type Layer = Map<String, Value>;

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Bottom-most first.
    layers: Vec<Arc<Layer>>,
}

impl Config {
    /// Create a configuration with a single (global) layer.
    pub fn new(root: Layer) -> Self {
        Self {
            layers: vec![Arc::new(root)],
        }
    }

    /// Return a new configuration with `layer` on top of this one.
    pub fn with_layer(&self, layer: Layer) -> Self {
        let mut layers = self.layers.clone();
        layers.push(Arc::new(layer));
        Self { layers }
    }

    /// The global layer.
    pub fn root(&self) -> Option<&Layer> {
        self.layers.first().map(AsRef::as_ref)
    }

    /// Look a key up in the global layer only.
    pub fn root_get(&self, key: &str) -> Option<&Value> {
        self.root().and_then(|layer| lookup(layer, key))
    }

    /// Look a key up, top-most layer first.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.layers.iter().rev().find_map(|layer| lookup(layer, key))
    }

    /// Typed lookup through all layers; `None` if absent or of the wrong shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| T::deserialize(v).ok())
    }

    /// Typed lookup in the global layer.
    pub fn root_get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.root_get(key).and_then(|v| T::deserialize(v).ok())
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(value_to_string)
    }

    pub fn root_get_str(&self, key: &str) -> Option<String> {
        self.root_get(key).and_then(value_to_string)
    }

    /// A list of strings; a single scalar is treated as a one-item list.
    pub fn get_str_list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::Array(items)) => items.iter().filter_map(value_to_string).collect(),
            Some(value) => value_to_string(value).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// All layers merged into one map, upper layers winning.
    pub fn merged(&self) -> Layer {
        let mut merged = Layer::new();
        for layer in &self.layers {
            merge_into(&mut merged, layer);
        }
        merged
    }
}

fn lookup<'a>(layer: &'a Layer, key: &str) -> Option<&'a Value> {
    if let Some(value) = layer.get(key) {
        return Some(value);
    }

    let mut parts = key.split('.');
    let mut current = layer.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn merge_into(target: &mut Layer, source: &Layer) {
    for (key, value) in source {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_into(existing, incoming);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layer(value: Value) -> Layer {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_dotted_lookup() {
        let config = Config::new(layer(json!({
            "modules": { "blog": { "per_page": 5 } }
        })));
        assert_eq!(config.get_as::<i64>("modules.blog.per_page"), Some(5));
        assert!(config.get("modules.blog.missing").is_none());
        assert!(config.get("modules.blog.per_page.deeper").is_none());
    }

    #[test]
    fn test_literal_key_with_dots() {
        let config = Config::new(layer(json!({ "feed.name": "Posts" })));
        assert_eq!(config.get_str("feed.name").as_deref(), Some("Posts"));
    }

    #[test]
    fn test_top_layer_wins_and_root_get_ignores_it() {
        let global = Config::new(layer(json!({ "title": "Site", "timezone": "UTC" })));
        let local = global.with_layer(layer(json!({ "title": "Post" })));

        assert_eq!(local.get_str("title").as_deref(), Some("Post"));
        assert_eq!(local.root_get_str("title").as_deref(), Some("Site"));
        assert_eq!(local.get_str("timezone").as_deref(), Some("UTC"));
        // Adding a layer never touches the original.
        assert_eq!(global.get_str("title").as_deref(), Some("Site"));
    }

    #[test]
    fn test_str_list() {
        let config = Config::new(layer(json!({ "tags": ["rst", 3], "one": "single" })));
        assert_eq!(config.get_str_list("tags"), ["rst", "3"]);
        assert_eq!(config.get_str_list("one"), ["single"]);
        assert!(config.get_str_list("none").is_empty());
    }

    #[test]
    fn test_merged_is_deep() {
        let config = Config::new(layer(json!({ "a": { "x": 1, "y": 2 } })))
            .with_layer(layer(json!({ "a": { "y": 3 }, "b": true })));
        let merged = Value::Object(config.merged());
        assert_eq!(merged, json!({ "a": { "x": 1, "y": 3 }, "b": true }));
    }

    #[test]
    fn test_default_is_empty() {
        let config = Config::default();
        assert!(config.get("anything").is_none());
        assert!(config.root().is_none());
    }
}
