//! Namespaced aggregation storage for modules.
//!
//! Each module owns a tree of [`Node`]s under its namespace, e.g. the blog
//! module files entries under `blog / 2022 / 02`. Storage lives for the
//! process and is cleared when a new build run starts.

use crate::context::ContextId;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default, Clone)]
pub struct Node {
    items: Vec<ContextId>,
    children: BTreeMap<String, Node>,
}

impl Node {
    /// Child node under `key`, created on first use.
    pub fn entry(&mut self, key: impl Into<String>) -> &mut Node {
        self.children.entry(key.into()).or_default()
    }

    pub fn child(&self, key: &str) -> Option<&Node> {
        self.children.get(key)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn push(&mut self, id: ContextId) {
        self.items.push(id);
    }

    pub fn items(&self) -> &[ContextId] {
        &self.items
    }

    /// Every id in this subtree, own items first, then children by key.
    pub fn flatten(&self) -> Vec<ContextId> {
        let mut out = self.items.clone();
        for child in self.children.values() {
            out.extend(child.flatten());
        }
        out
    }
}

#[derive(Debug, Default)]
pub struct ModuleStorage {
    namespaces: HashMap<String, Node>,
}

impl ModuleStorage {
    /// The root node of `namespace`, created lazily.
    pub fn namespace(&mut self, namespace: &str) -> &mut Node {
        self.namespaces.entry(namespace.to_owned()).or_default()
    }

    pub fn get(&self, namespace: &str) -> Option<&Node> {
        self.namespaces.get(namespace)
    }

    pub fn clear(&mut self) {
        self.namespaces.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, context::{Context, ContextTable}};

    #[test]
    fn test_nested_entries_and_flatten() {
        let mut table = ContextTable::default();
        let ids: Vec<_> = (0..3)
            .map(|i| {
                table.insert(Context::new(
                    format!("{i}.rst").into(),
                    format!("{i}/index.html").into(),
                    Config::default(),
                ))
            })
            .collect();

        let mut storage = ModuleStorage::default();
        storage.namespace("blog").entry("2022").entry("02").push(ids[0]);
        storage.namespace("blog").entry("2022").entry("01").push(ids[1]);
        storage.namespace("blog").entry("2021").entry("12").push(ids[2]);

        let blog = storage.get("blog").unwrap();
        assert_eq!(blog.children().map(|(k, _)| k).collect::<Vec<_>>(), ["2021", "2022"]);
        assert_eq!(blog.flatten(), [ids[2], ids[1], ids[0]]);
        assert_eq!(blog.child("2022").unwrap().child("02").unwrap().items(), [ids[0]]);
    }

    #[test]
    fn test_clear_and_lazy_namespace() {
        let mut storage = ModuleStorage::default();
        assert!(storage.get("tags").is_none());
        assert!(storage.namespace("tags").items().is_empty());
        assert!(storage.get("tags").is_some());

        storage.clear();
        assert!(storage.get("tags").is_none());
    }
}
