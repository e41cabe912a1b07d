//! Atom feed serialization.
//!
//! Feeds are written event by event with `quick-xml`, so every text node is
//! escaped by the writer and HTML content travels as escaped text.

use anyhow::Result;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use std::io::Cursor;

type XmlWriter = Writer<Cursor<Vec<u8>>>;

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub id: String,
    pub title: String,
    pub link: String,
    pub updated: DateTime<FixedOffset>,
    pub author: Option<String>,
    /// Rendered HTML body.
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct Feed {
    /// Absolute URL of the feed itself; doubles as the feed id.
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    /// Absolute URL of the site.
    pub link: String,
    pub entries: Vec<FeedEntry>,
}

impl Feed {
    /// Newest entry date, or now for an empty feed.
    pub fn updated(&self) -> DateTime<FixedOffset> {
        self.entries
            .iter()
            .map(|entry| entry.updated)
            .max()
            .unwrap_or_else(|| Utc::now().fixed_offset())
    }

    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

        let mut feed = BytesStart::new("feed");
        feed.push_attribute(("xmlns", ATOM_NS));
        writer.write_event(Event::Start(feed))?;

        write_text(&mut writer, "id", &self.id)?;
        write_text(&mut writer, "title", &self.title)?;
        if let Some(subtitle) = &self.subtitle {
            write_text(&mut writer, "subtitle", subtitle)?;
        }
        write_link(&mut writer, &self.link, None)?;
        write_link(&mut writer, &self.id, Some("self"))?;
        write_text(&mut writer, "updated", &timestamp(&self.updated()))?;
        write_generator(&mut writer)?;

        for entry in &self.entries {
            write_entry(&mut writer, entry)?;
        }

        writer.write_event(Event::End(BytesEnd::new("feed")))?;
        let mut xml = String::from_utf8(writer.into_inner().into_inner())?;
        xml.push('\n');
        Ok(xml)
    }
}

fn write_entry(writer: &mut XmlWriter, entry: &FeedEntry) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("entry")))?;
    write_text(writer, "id", &entry.id)?;
    write_text(writer, "title", &entry.title)?;
    write_link(writer, &entry.link, Some("alternate"))?;
    write_text(writer, "updated", &timestamp(&entry.updated))?;

    if let Some(author) = entry.author.as_deref().filter(|a| !a.is_empty()) {
        writer.write_event(Event::Start(BytesStart::new("author")))?;
        write_text(writer, "name", author)?;
        writer.write_event(Event::End(BytesEnd::new("author")))?;
    }

    let mut content = BytesStart::new("content");
    content.push_attribute(("type", "html"));
    writer.write_event(Event::Start(content))?;
    writer.write_event(Event::Text(BytesText::new(&entry.content)))?;
    writer.write_event(Event::End(BytesEnd::new("content")))?;

    writer.write_event(Event::End(BytesEnd::new("entry")))?;
    Ok(())
}

fn write_text(writer: &mut XmlWriter, tag: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn write_link(writer: &mut XmlWriter, href: &str, rel: Option<&str>) -> Result<()> {
    let mut link = BytesStart::new("link");
    link.push_attribute(("href", href));
    if let Some(rel) = rel {
        link.push_attribute(("rel", rel));
    }
    writer.write_event(Event::Empty(link))?;
    Ok(())
}

fn write_generator(writer: &mut XmlWriter) -> Result<()> {
    let mut generator = BytesStart::new("generator");
    generator.push_attribute(("version", env!("CARGO_PKG_VERSION")));
    writer.write_event(Event::Start(generator))?;
    writer.write_event(Event::Text(BytesText::new(env!("CARGO_PKG_NAME"))))?;
    writer.write_event(Event::End(BytesEnd::new("generator")))?;
    Ok(())
}

fn timestamp(date: &DateTime<FixedOffset>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Resolve `link` against `base` the way a browser would for an
/// absolute-path reference: a leading `/` replaces the base path.
pub fn join_url(base: &str, link: &str) -> String {
    if link.contains("://") {
        return link.to_owned();
    }

    let origin_end = base
        .find("://")
        .map(|scheme| {
            let host_start = scheme + 3;
            base[host_start..]
                .find('/')
                .map_or(base.len(), |slash| host_start + slash)
        })
        .unwrap_or(0);

    if link.starts_with('/') {
        return format!("{}{link}", &base[..origin_end]);
    }

    let dir_end = base.rfind('/').filter(|i| *i >= origin_end).unwrap_or(base.len());
    format!("{}/{link}", &base[..dir_end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(day: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2022, 2, day, 0, 0, 0)
            .unwrap()
    }

    fn feed() -> Feed {
        Feed {
            id: "http://localhost/feed.atom".into(),
            title: "Recent Blog Posts".into(),
            subtitle: Some("Recent blog posts".into()),
            link: "http://localhost/".into(),
            entries: vec![
                FeedEntry {
                    id: "http://localhost/2022/02/21/codeblocks/".into(),
                    title: "Code <Blocks>".into(),
                    link: "http://localhost/2022/02/21/codeblocks/".into(),
                    updated: date(21),
                    author: Some("Jane".into()),
                    content: "<p>Hello &amp; bye</p>".into(),
                },
                FeedEntry {
                    id: "http://localhost/2022/02/05/lists/".into(),
                    title: "Lists".into(),
                    link: "http://localhost/2022/02/05/lists/".into(),
                    updated: date(5),
                    author: None,
                    content: String::new(),
                },
            ],
        }
    }

    #[test]
    fn test_feed_xml() {
        let xml = feed().to_xml().unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains("<feed xmlns=\"http://www.w3.org/2005/Atom\">"));
        assert!(xml.contains("<link href=\"http://localhost/feed.atom\" rel=\"self\"/>"));
        assert!(xml.contains("<title>Code &lt;Blocks&gt;</title>"));
        assert!(xml.contains("<content type=\"html\">&lt;p&gt;Hello &amp;amp; bye&lt;/p&gt;</content>"));
        assert!(xml.contains("<updated>2022-02-21T00:00:00Z</updated>"));
        assert_eq!(xml.matches("<entry>").count(), 2);
        assert_eq!(xml.matches("<author>").count(), 1);
    }

    #[test]
    fn test_feed_updated_is_newest_entry() {
        assert_eq!(feed().updated(), date(21));
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://localhost/", "/feed.atom"), "http://localhost/feed.atom");
        assert_eq!(join_url("https://example.com/blog/", "/2022/"), "https://example.com/2022/");
        assert_eq!(join_url("https://example.com", "/a/"), "https://example.com/a/");
        assert_eq!(join_url("https://example.com/blog/", "post/"), "https://example.com/blog/post/");
        assert_eq!(join_url("https://example.com/", "https://other.org/x"), "https://other.org/x");
    }
}
