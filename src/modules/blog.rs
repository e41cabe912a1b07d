//! The blog: date-bucketed entries, paginated index, archives and a feed.
//!
//! A context without a front-matter `pub_date` gets one from its slug, when
//! the slug matches `modules.blog.pub_date_match`, before it is rendered.
//! Entries are filed under `storage("blog")[year][month]` once published.

use super::Module;
use crate::{
    builder::{Builder, EntryView},
    config::Layer,
    context::ContextId,
    pagination::Pagination,
    route_values,
    routing::{PatternSource, RoutePattern},
    signals::{AFTER_FILE_PUBLISHED, BEFORE_FILE_PROCESSED},
    utils::{
        atom::{Feed, FeedEntry, join_url},
        date::{midnight, month_name, parse_timezone},
    },
};
use anyhow::{Result, anyhow};
use chrono::Datelike;
use serde::Serialize;
use serde_json::Value;

const NAMESPACE: &str = "blog";
const DEFAULT_DATE_MATCH: &str = "/<int:year>/<int:month>/<int:day>/";
const DEFAULT_PER_PAGE: usize = 10;
const RECENT_ENTRIES: usize = 10;
const FALLBACK_URL: &str = "http://localhost/";

pub struct Blog;

impl Module for Blog {
    fn name(&self) -> &str {
        "blog"
    }

    fn setup(&self, builder: &mut Builder) -> Result<()> {
        builder.register_url(
            "blog_index",
            PatternSource::config("modules.blog.index_url", "/"),
            route_values!("page" => 1u64),
        )?;
        builder.register_url(
            "blog_index",
            PatternSource::config("modules.blog.paged_index_url", "/page/<page>/"),
            route_values!(),
        )?;
        builder.register_url(
            "blog_archive",
            PatternSource::config("modules.blog.archive_url", "/archive/"),
            route_values!(),
        )?;
        builder.register_url(
            "blog_archive",
            PatternSource::config("modules.blog.year_archive_url", "/<year>/"),
            route_values!(),
        )?;
        builder.register_url(
            "blog_archive",
            PatternSource::config("modules.blog.month_archive_url", "/<year>/<month>/"),
            route_values!(),
        )?;
        builder.register_url(
            "blog_feed",
            PatternSource::config("modules.blog.feed_url", "/feed.atom"),
            route_values!(),
        )?;

        builder.connect(BEFORE_FILE_PROCESSED, |builder, id| infer_pub_date(builder, *id));
        builder.connect(AFTER_FILE_PUBLISHED, |builder, id| process_entry(builder, *id));
        builder.connect_build_finished(|builder, _| write_blog_files(builder));
        builder.add_context_processor(template_globals);
        Ok(())
    }
}

// ============================================================================
// Indexing
// ============================================================================

/// `(year, month, day)` encoded in `slug` according to `pattern`.
pub fn date_from_slug(slug: &str, pattern: &str) -> Result<Option<(i32, u32, u32)>> {
    let pattern = RoutePattern::compile(&format!("/{}/<path:extra>", pattern.trim_matches('/')))?;
    let Some(values) = pattern.matches(&format!("/{}", slug.trim_matches('/'))) else {
        return Ok(None);
    };

    let part = |name: &str| values.get(name).and_then(|v| v.as_int());
    let date = match (part("year"), part("month"), part("day")) {
        (Some(year), Some(month), Some(day)) => {
            i32::try_from(year).ok().zip(u32::try_from(month).ok()).zip(u32::try_from(day).ok())
        }
        _ => None,
    };
    Ok(date.map(|((year, month), day)| (year, month, day)))
}

/// Date a context from its slug unless the front-matter already did.
/// The day starts at midnight in the context's `timezone`.
fn infer_pub_date(builder: &mut Builder, id: ContextId) -> Result<()> {
    let fallback = builder.timezone();
    let context = builder.context_mut(id)?;
    if context.pub_date.is_some() {
        return Ok(());
    }

    let pattern = context
        .config
        .get_str("modules.blog.pub_date_match")
        .unwrap_or_else(|| DEFAULT_DATE_MATCH.to_owned());
    let Some((year, month, day)) = date_from_slug(&context.slug(), &pattern)? else {
        return Ok(());
    };

    let tz = match context.config.get_str("timezone") {
        Some(name) => parse_timezone(&name).ok_or_else(|| {
            anyhow!("invalid timezone `{name}` in `{}`", context.source().display())
        })?,
        None => fallback,
    };
    context.pub_date = midnight(tz, year, month, day);
    Ok(())
}

fn process_entry(builder: &mut Builder, id: ContextId) -> Result<()> {
    let context = builder.context(id)?;
    let (Some(date), Some(_)) = (context.pub_date, context.title.as_ref()) else {
        return Ok(());
    };

    builder
        .get_storage(NAMESPACE)
        .entry(date.year().to_string())
        .entry(format!("{:02}", date.month()))
        .push(id);
    Ok(())
}

/// Every stored entry, newest first; equal dates are ordered by
/// `day-order`, highest first.
pub fn get_all_entries(builder: &Builder) -> Result<Vec<ContextId>> {
    let ids = builder.storage(NAMESPACE).map(|node| node.flatten()).unwrap_or_default();
    sort_newest_first(builder, ids)
}

/// Sort by `(pub_date, day-order)` descending; undated entries go last.
pub fn sort_newest_first(builder: &Builder, ids: Vec<ContextId>) -> Result<Vec<ContextId>> {
    let mut keyed = Vec::with_capacity(ids.len());
    for id in ids {
        let context = builder.context(id)?;
        keyed.push(((context.pub_date, context.tie_break()), id));
    }
    keyed.sort_by(|(a, _), (b, _)| b.cmp(a));
    Ok(keyed.into_iter().map(|(_, id)| id).collect())
}

// ============================================================================
// Archive views
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct MonthArchive {
    pub year: i32,
    /// Two digits, as used in archive links.
    pub month: String,
    pub month_name: String,
    pub count: usize,
    pub entries: Vec<EntryView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct YearArchive {
    pub year: i32,
    pub count: usize,
    pub months: Vec<MonthArchive>,
}

/// Years newest first, months newest first within a year.
pub fn get_archive_summary(builder: &mut Builder) -> Result<Vec<YearArchive>> {
    let mut buckets: Vec<(i32, Vec<(String, Vec<ContextId>)>)> = Vec::new();
    if let Some(root) = builder.storage(NAMESPACE) {
        for (year, months) in root.children() {
            let Ok(year) = year.parse::<i32>() else {
                continue;
            };
            let months = months
                .children()
                .map(|(month, node)| (month.to_owned(), node.flatten()))
                .collect();
            buckets.push((year, months));
        }
    }
    buckets.sort_by(|a, b| b.0.cmp(&a.0));

    let locale = builder.site().base.locale.clone();
    let mut years = Vec::with_capacity(buckets.len());
    for (year, mut months) in buckets {
        months.sort_by_key(|(month, _)| std::cmp::Reverse(month.parse::<u32>().unwrap_or(0)));

        let mut archives = Vec::with_capacity(months.len());
        for (month, ids) in months {
            let ids = sort_newest_first(builder, ids)?;
            let entries = ids
                .into_iter()
                .map(|id| builder.entry_view(id))
                .collect::<Result<Vec<_>>>()?;
            archives.push(MonthArchive {
                year,
                month_name: month_name(month.parse().unwrap_or(1), &locale),
                month,
                count: entries.len(),
                entries,
            });
        }

        years.push(YearArchive {
            year,
            count: archives.iter().map(|m| m.count).sum(),
            months: archives,
        });
    }
    Ok(years)
}

// ============================================================================
// Output
// ============================================================================

/// `feed_url` everywhere. `recent_blog_entries` only on pages written once
/// every entry is stored, so it never depends on discovery order.
fn template_globals(builder: &mut Builder, page: Option<ContextId>) -> Result<Layer> {
    let mut layer = Layer::new();
    layer.insert("feed_url".into(), Value::String(builder.link_to("blog_feed", &route_values!())?));

    if page.is_none() {
        let mut recent = Vec::new();
        for id in get_all_entries(builder)?.into_iter().take(RECENT_ENTRIES) {
            recent.push(builder.entry_view(id)?);
        }
        layer.insert("recent_blog_entries".into(), serde_json::to_value(recent)?);
    }
    Ok(layer)
}

#[derive(Serialize)]
struct PageView {
    page: usize,
    pages: usize,
    per_page: usize,
    total: usize,
    has_next: bool,
    has_previous: bool,
    next_link: Option<String>,
    previous_link: Option<String>,
    items: Vec<EntryView>,
}

fn page_view(builder: &mut Builder, pagination: &Pagination<'_, ContextId>) -> Result<PageView> {
    let items = pagination
        .slice()
        .iter()
        .map(|id| builder.entry_view(*id))
        .collect::<Result<Vec<_>>>()?;

    let urls = builder.urls();
    Ok(PageView {
        page: pagination.page(),
        pages: pagination.pages(),
        per_page: pagination.per_page(),
        total: pagination.total(),
        has_next: pagination.has_next(),
        has_previous: pagination.has_previous(),
        next_link: match pagination.has_next() {
            true => Some(pagination.next().link(urls)?),
            false => None,
        },
        previous_link: match pagination.has_previous() {
            true => Some(pagination.previous().link(urls)?),
            false => None,
        },
        items,
    })
}

fn write_index_pages(builder: &mut Builder) -> Result<()> {
    let config = builder.config();
    let use_pagination = config.root_get_as("modules.blog.use_pagination").unwrap_or(true);
    let per_page = config.root_get_as("modules.blog.per_page").unwrap_or(DEFAULT_PER_PAGE);

    let entries = get_all_entries(builder)?;
    let mut pagination = Pagination::new(&entries, 1, per_page, "blog_index");
    loop {
        let view = page_view(builder, &pagination)?;
        let mut extra = Layer::new();
        extra.insert("pagination".into(), serde_json::to_value(view)?);
        extra.insert("show_pagination".into(), Value::Bool(use_pagination));

        let values = route_values!("page" => pagination.page());
        builder.write_page("blog_index", &values, "blog/index.html", extra)?;

        if !use_pagination || !pagination.has_next() {
            return Ok(());
        }
        pagination = pagination.next();
    }
}

fn write_archive_pages(builder: &mut Builder) -> Result<()> {
    let archive = get_archive_summary(builder)?;

    let mut extra = Layer::new();
    extra.insert("archive".into(), serde_json::to_value(&archive)?);
    builder.write_page("blog_archive", &route_values!(), "blog/archive.html", extra)?;

    for year in &archive {
        let mut extra = Layer::new();
        extra.insert("entry".into(), serde_json::to_value(year)?);
        builder.write_page(
            "blog_archive",
            &route_values!("year" => year.year),
            "blog/year_archive.html",
            extra,
        )?;

        for month in &year.months {
            let mut extra = Layer::new();
            extra.insert("entry".into(), serde_json::to_value(month)?);
            builder.write_page(
                "blog_archive",
                &route_values!("year" => year.year, "month" => month.month.as_str()),
                "blog/month_archive.html",
                extra,
            )?;
        }
    }
    Ok(())
}

/// An Atom feed over `ids`, newest first. Entries without a date or title
/// are left out.
pub fn build_feed(
    builder: &mut Builder,
    ids: &[ContextId],
    title: String,
    subtitle: Option<String>,
    feed_link: &str,
) -> Result<Feed> {
    let config = builder.config();
    let url = config
        .root_get_str("canonical_url")
        .unwrap_or_else(|| FALLBACK_URL.to_owned());
    let author = config.root_get_str("author");

    let mut entries = Vec::new();
    for &id in ids {
        let context = builder.context(id)?;
        let (Some(updated), Some(entry_title)) = (context.pub_date, context.title.clone()) else {
            continue;
        };
        let link = join_url(&url, &context.slug());
        entries.push(FeedEntry {
            id: link.clone(),
            title: entry_title,
            link,
            updated,
            author: author.clone(),
            content: builder.render_contents(id)?,
        });
    }

    Ok(Feed {
        id: join_url(&url, feed_link),
        title,
        subtitle,
        link: url,
        entries,
    })
}

fn write_feed(builder: &mut Builder) -> Result<()> {
    let config = builder.config();
    let name = config.get_str("feed.name").unwrap_or_else(|| "Recent Blog Posts".to_owned());
    let subtitle = config.get_str("feed.subtitle").unwrap_or_else(|| "Recent blog posts".to_owned());

    let recent: Vec<ContextId> = get_all_entries(builder)?.into_iter().take(RECENT_ENTRIES).collect();
    let feed_link = builder.link_to("blog_feed", &route_values!())?;
    let feed = build_feed(builder, &recent, name, Some(subtitle), &feed_link)?;
    builder.write_feed("blog_feed", &route_values!(), &feed.to_xml()?)
}

fn write_blog_files(builder: &mut Builder) -> Result<()> {
    write_index_pages(builder)?;
    write_archive_pages(builder)?;
    write_feed(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn builder(dir: &TempDir) -> Builder {
        let mut site = SiteConfig::from_str("[build]\nmodules = [\"blog\"]").unwrap();
        site.set_root(dir.path());
        Builder::new(site).unwrap()
    }

    fn write(dir: &TempDir, path: &str, content: &str) {
        let path = dir.path().join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_date_from_slug() {
        assert_eq!(
            date_from_slug("/2022/02/21/codeblocks/", DEFAULT_DATE_MATCH).unwrap(),
            Some((2022, 2, 21))
        );
        assert_eq!(date_from_slug("/about/", DEFAULT_DATE_MATCH).unwrap(), None);
        assert_eq!(date_from_slug("/2022/02/21/", DEFAULT_DATE_MATCH).unwrap(), None);
        assert_eq!(
            date_from_slug("/posts/2021-5-3/x/", "/posts/<int:year>-<int:month>-<int:day>/").unwrap(),
            None
        );
        assert!(date_from_slug("/a/", "/<int:x>/<path:p>/<y>/").is_err());
    }

    #[test]
    fn test_slug_date_is_midnight_in_timezone() {
        let dir = TempDir::new().unwrap();
        write(&dir, "2022/02/21/codeblocks.rst", "\nCode Blocks\n===========\n\nBody.\n");

        let mut site = SiteConfig::from_str("[base]\ntimezone = \"+01:00\"\n[build]\nmodules = [\"blog\"]").unwrap();
        site.set_root(dir.path());
        let mut builder = Builder::new(site).unwrap();
        builder.run().unwrap();

        let ids = get_all_entries(&builder).unwrap();
        assert_eq!(ids.len(), 1);
        let date = builder.context(ids[0]).unwrap().pub_date.unwrap();
        let tz = chrono::FixedOffset::east_opt(3600).unwrap();
        assert_eq!(date, tz.with_ymd_and_hms(2022, 2, 21, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_slug_date_uses_page_timezone() {
        let dir = TempDir::new().unwrap();
        write(&dir, "2022/02/21/local.rst", "timezone: \"+02:00\"\n\nLocal\n=====\n");
        write(&dir, "2022/02/22/global.rst", "\nGlobal\n======\n");

        let mut builder = builder(&dir);
        builder.run().unwrap();

        let dates: Vec<_> = get_all_entries(&builder)
            .unwrap()
            .into_iter()
            .map(|id| builder.context(id).unwrap().pub_date.unwrap())
            .collect();
        let utc = chrono::FixedOffset::east_opt(0).unwrap();
        let plus_two = chrono::FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(dates, [
            utc.with_ymd_and_hms(2022, 2, 22, 0, 0, 0).unwrap(),
            plus_two.with_ymd_and_hms(2022, 2, 21, 0, 0, 0).unwrap(),
        ]);

        write(&dir, "2022/02/23/broken.rst", "timezone: Mars\n\nBroken\n======\n");
        let err = builder.run().unwrap_err();
        assert!(err.to_string().contains("Mars"));
    }

    #[test]
    fn test_pages_independent_of_discovery_order() {
        let dir = TempDir::new().unwrap();
        for (day, title) in [(1, "First"), (2, "Second"), (3, "Third")] {
            write(
                &dir,
                &format!("2022/02/{day:02}/post.rst"),
                &format!("\n{title}\n======\n\nBody.\n"),
            );
        }

        let mut builder = builder(&dir);
        builder.run().unwrap();

        let out = dir.path().join("_build");
        let first = fs::read_to_string(out.join("2022/02/01/post/index.html")).unwrap();
        let last = fs::read_to_string(out.join("2022/02/03/post/index.html")).unwrap();
        assert!(first.contains("written on February 1, 2022"));
        assert!(last.contains("written on February 3, 2022"));
        assert!(!first.contains("class=\"recent\""));
        assert!(!last.contains("class=\"recent\""));

        let index = fs::read_to_string(out.join("index.html")).unwrap();
        let recent = &index[index.find("class=\"recent\"").unwrap()..];
        for title in ["First", "Second", "Third"] {
            assert!(recent.contains(&format!(">{title}</a>")));
        }
    }

    #[test]
    fn test_entries_without_title_are_not_stored() {
        let dir = TempDir::new().unwrap();
        write(&dir, "2022/02/21/untitled.rst", "\nJust a paragraph.\n");
        write(&dir, "2022/02/22/titled.rst", "\nTitled\n======\n\nText.\n");

        let mut builder = builder(&dir);
        builder.run().unwrap();

        let ids = get_all_entries(&builder).unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(builder.context(ids[0]).unwrap().title.as_deref(), Some("Titled"));
        let february = builder.storage(NAMESPACE).unwrap().child("2022").unwrap().child("02").unwrap();
        assert_eq!(february.items().len(), 1);
    }

    #[test]
    fn test_all_entries_newest_first_with_tie_break() {
        let dir = TempDir::new().unwrap();
        write(&dir, "2022/02/05/lists.rst", "\nLists\n=====\n");
        write(&dir, "2022/02/21/codeblocks.rst", "\nCode Blocks\n===========\n");
        write(&dir, "2022/02/21/second.rst", "day-order: 1\n\nSecond\n======\n");

        let mut builder = builder(&dir);
        builder.run().unwrap();

        let titles: Vec<String> = get_all_entries(&builder)
            .unwrap()
            .into_iter()
            .map(|id| builder.context(id).unwrap().title.clone().unwrap())
            .collect();
        assert_eq!(titles, ["Second", "Code Blocks", "Lists"]);
    }

    #[test]
    fn test_archive_summary() {
        let dir = TempDir::new().unwrap();
        write(&dir, "2021/12/24/eve.rst", "\nEve\n===\n");
        write(&dir, "2022/01/10/jan.rst", "\nJanuary\n=======\n");
        write(&dir, "2022/02/05/lists.rst", "\nLists\n=====\n");
        write(&dir, "2022/02/21/codeblocks.rst", "\nCode Blocks\n===========\n");

        let mut builder = builder(&dir);
        builder.run().unwrap();
        let archive = get_archive_summary(&mut builder).unwrap();

        let years: Vec<(i32, usize)> = archive.iter().map(|y| (y.year, y.count)).collect();
        assert_eq!(years, [(2022, 3), (2021, 1)]);

        let months: Vec<(&str, &str, usize)> = archive[0]
            .months
            .iter()
            .map(|m| (m.month.as_str(), m.month_name.as_str(), m.count))
            .collect();
        assert_eq!(months, [("02", "February", 2), ("01", "January", 1)]);
        assert_eq!(archive[0].months[0].entries[0].title.as_deref(), Some("Code Blocks"));
    }

    #[test]
    fn test_blog_files_written() {
        let dir = TempDir::new().unwrap();
        for day in 1..=12 {
            write(
                &dir,
                &format!("2022/03/{day:02}/post.rst"),
                &format!("\nPost {day}\n=======\n\nBody {day}.\n"),
            );
        }

        let mut builder = builder(&dir);
        builder.run().unwrap();

        let out = dir.path().join("_build");
        assert!(out.join("index.html").is_file());
        assert!(out.join("page/2/index.html").is_file());
        assert!(!out.join("page/1/index.html").exists());
        assert!(out.join("archive/index.html").is_file());
        assert!(out.join("2022/index.html").is_file());
        assert!(out.join("2022/03/index.html").is_file());

        let first = fs::read_to_string(out.join("index.html")).unwrap();
        assert!(first.contains("Post 12"));
        assert!(first.contains("href=\"/page/2/\""));
        let second = fs::read_to_string(out.join("page/2/index.html")).unwrap();
        assert!(second.contains("Post 1<"));
        assert!(second.contains("href=\"/\""));

        let feed = fs::read_to_string(out.join("feed.atom")).unwrap();
        assert_eq!(feed.matches("<entry>").count(), 10);
        assert!(feed.contains("<title>Recent Blog Posts</title>"));
        assert!(feed.contains("http://localhost/2022/03/12/post/"));
    }
}
