//! Output minification for rendered pages and feeds.
//!
//! Disabled unless `[build] minify = true`; when disabled the input is
//! passed through untouched.

use crate::config::SiteConfig;
use std::borrow::Cow;

/// Kind of output being written.
pub enum MinifyType<'a> {
    /// Rendered template output
    Html(&'a str),
    /// Atom feed
    Feed(&'a str),
}

/// Minify content based on type and config.
///
/// Returns `Cow::Borrowed` if minify disabled, `Cow::Owned` if minified.
pub fn minify<'a>(content: MinifyType<'a>, config: &SiteConfig) -> Cow<'a, str> {
    match (config.build.minify, content) {
        (false, MinifyType::Html(text) | MinifyType::Feed(text)) => Cow::Borrowed(text),
        (true, MinifyType::Html(html)) => Cow::Owned(minify_html_inner(html)),
        (true, MinifyType::Feed(xml)) => Cow::Owned(minify_feed_inner(xml)),
    }
}

fn minify_html_inner(html: &str) -> String {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = false;
    let out = minify_html::minify(html.as_bytes(), &cfg);
    String::from_utf8(out).unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
}

/// Line-wise: trim each line and drop blank ones. Keeps `<content>` bodies
/// intact since they are escaped onto a single line by the writer.
fn minify_feed_inner(xml: &str) -> String {
    xml.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_minify(enabled: bool) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.build.minify = enabled;
        config
    }

    #[test]
    fn test_minify_html_basic() {
        let html = "<html>\n  <head>\n  </head>\n  <body>\n    <p>Hello</p>\n  </body>\n</html>";
        let result = minify(MinifyType::Html(html), &config_with_minify(true));

        assert!(!result.contains("\n  "));
        assert!(result.contains("<p>Hello</p>"));
    }

    #[test]
    fn test_minify_disabled_borrows() {
        let html = "<html>\n  <body>\n  </body>\n</html>";
        let result = minify(MinifyType::Html(html), &config_with_minify(false));

        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, html);
    }

    #[test]
    fn test_minify_feed() {
        let xml = "<?xml version=\"1.0\"?>\n<feed>\n  <title>Posts</title>\n\n</feed>\n";
        let result = minify(MinifyType::Feed(xml), &config_with_minify(true));
        assert_eq!(result, "<?xml version=\"1.0\"?><feed><title>Posts</title></feed>");
    }
}
