//! Tag pages: a weighted tag cloud, one listing and one feed per tag.

use super::{
    Module,
    blog::{build_feed, sort_newest_first},
};
use crate::{
    builder::Builder,
    config::Layer,
    context::ContextId,
    log, route_values,
    routing::PatternSource,
    signals::AFTER_FILE_PUBLISHED,
    utils::slug::is_safe_segment,
};
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

const NAMESPACE: &str = "tags";
const MAX_WEIGHT: usize = 5;

pub struct Tags;

impl Module for Tags {
    fn name(&self) -> &str {
        "tags"
    }

    fn setup(&self, builder: &mut Builder) -> Result<()> {
        builder.register_url(
            "tag_cloud",
            PatternSource::config("modules.tags.cloud_url", "/tags/"),
            route_values!(),
        )?;
        builder.register_url(
            "tag",
            PatternSource::config("modules.tags.tag_url", "/tags/<tag>/"),
            route_values!(),
        )?;
        builder.register_url(
            "tag_feed",
            PatternSource::config("modules.tags.feed_url", "/tags/<tag>/feed.atom"),
            route_values!(),
        )?;

        builder.connect(AFTER_FILE_PUBLISHED, |builder, id| index_tags(builder, *id));
        builder.connect_build_finished(|builder, _| write_tag_files(builder));
        builder.add_context_processor(tag_links);
        Ok(())
    }
}

/// Tags of a context that can be used as a path segment.
fn usable_tags(builder: &Builder, id: ContextId) -> Result<Vec<String>> {
    let context = builder.context(id)?;
    let mut tags = Vec::new();
    for tag in context.config.get_str_list("tags") {
        if is_safe_segment(&tag) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        } else {
            log!("tags"; "skipping tag {tag:?} of {}", context.source().display());
        }
    }
    Ok(tags)
}

fn index_tags(builder: &mut Builder, id: ContextId) -> Result<()> {
    for tag in usable_tags(builder, id)? {
        builder.get_storage(NAMESPACE).entry(tag).push(id);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
struct TagLink {
    name: String,
    link: String,
}

/// `tag_links` for the page being rendered.
fn tag_links(builder: &mut Builder, page: Option<ContextId>) -> Result<Layer> {
    let mut layer = Layer::new();
    let Some(id) = page else {
        return Ok(layer);
    };

    let mut links = Vec::new();
    for name in usable_tags(builder, id)? {
        let link = builder.link_to("tag", &route_values!("tag" => name.as_str()))?;
        links.push(TagLink { name, link });
    }
    layer.insert("tag_links".into(), serde_json::to_value(links)?);
    Ok(layer)
}

#[derive(Debug, Clone, Serialize)]
pub struct TagSummary {
    pub name: String,
    pub count: usize,
    /// 1 for the rarest tag up to 5 for the most used one.
    pub weight: usize,
    pub link: String,
}

/// Every tag with its entry count, sorted by name.
pub fn get_tag_summary(builder: &Builder) -> Result<Vec<TagSummary>> {
    let Some(root) = builder.storage(NAMESPACE) else {
        return Ok(Vec::new());
    };

    let counts: Vec<(&str, usize)> = root.children().map(|(name, node)| (name, node.items().len())).collect();
    let max = counts.iter().map(|(_, count)| *count).max().unwrap_or(1);

    let mut tags = Vec::with_capacity(counts.len());
    for (name, count) in counts {
        tags.push(TagSummary {
            name: name.to_owned(),
            count,
            weight: weight(count, max),
            link: builder.link_to("tag", &route_values!("tag" => name))?,
        });
    }
    Ok(tags)
}

fn weight(count: usize, max: usize) -> usize {
    if max <= 1 {
        return 1;
    }
    1 + (count.saturating_sub(1) * (MAX_WEIGHT - 1)) / (max - 1)
}

fn write_tag_files(builder: &mut Builder) -> Result<()> {
    let tags = get_tag_summary(builder)?;

    let mut extra = Layer::new();
    extra.insert("tags".into(), serde_json::to_value(&tags)?);
    builder.write_page("tag_cloud", &route_values!(), "tags/cloud.html", extra)?;

    for tag in &tags {
        let ids = builder
            .storage(NAMESPACE)
            .and_then(|root| root.child(&tag.name))
            .map(|node| node.items().to_vec())
            .unwrap_or_default();
        let ids = sort_newest_first(builder, ids)?;
        let values = route_values!("tag" => tag.name.as_str());

        let entries = ids
            .iter()
            .map(|id| builder.entry_view(*id))
            .collect::<Result<Vec<_>>>()?;
        let feed_link = builder.link_to("tag_feed", &values)?;

        let mut extra = Layer::new();
        extra.insert("tag".into(), Value::String(tag.name.clone()));
        extra.insert("entries".into(), serde_json::to_value(entries)?);
        extra.insert("tag_feed_url".into(), Value::String(feed_link.clone()));
        builder.write_page("tag", &values, "tags/tag.html", extra)?;

        let title = format!("Posts tagged {}", tag.name);
        let feed = build_feed(builder, &ids, title, None, &feed_link)?;
        builder.write_feed("tag_feed", &values, &feed.to_xml()?)?;
    }
    Ok(())
}
