//! `[base]` section configuration.
//!
//! Contains basic site information like title, author, timezone, etc.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[base]` section in blotter.toml - basic site metadata.
///
/// # Example
/// ```toml
/// [base]
/// title = "My Blog"
/// author = "Alice"
/// url = "https://myblog.com/"
/// timezone = "+01:00"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct BaseConfig {
    /// Site title displayed in headers and feeds.
    #[serde(default)]
    pub title: String,

    /// Site description, used as the feed subtitle fallback.
    #[serde(default)]
    pub description: String,

    /// Author name for feeds.
    #[serde(default = "defaults::base::author")]
    #[educe(Default = defaults::base::author())]
    pub author: String,

    /// Canonical URL used to make feed links absolute.
    #[serde(default = "defaults::base::url")]
    #[educe(Default = defaults::base::url())]
    pub url: Option<String>,

    /// BCP 47 language code for the `lang` attribute.
    #[serde(default = "defaults::base::language")]
    #[educe(Default = defaults::base::language())]
    pub language: String,

    /// POSIX locale for month names (e.g., "de_DE").
    #[serde(default = "defaults::base::locale")]
    #[educe(Default = defaults::base::locale())]
    pub locale: String,

    /// Timezone for publish dates: "UTC" or a fixed offset like "+01:00".
    #[serde(default = "defaults::base::timezone")]
    #[educe(Default = defaults::base::timezone())]
    pub timezone: String,
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;

    #[test]
    fn test_base_config_full() {
        let config = r#"
            [base]
            title = "Pixel Notes"
            description = "Notes on pixels"
            author = "Alice"
            url = "https://pixels.example.com/"
            language = "de"
            locale = "de_DE"
            timezone = "+01:00"
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();

        assert_eq!(config.base.title, "Pixel Notes");
        assert_eq!(config.base.author, "Alice");
        assert_eq!(config.base.url.as_deref(), Some("https://pixels.example.com/"));
        assert_eq!(config.base.locale, "de_DE");
        assert_eq!(config.base.timezone, "+01:00");
    }

    #[test]
    fn test_base_config_defaults() {
        let config: SiteConfig = toml::from_str("[base]\ntitle = \"Test\"").unwrap();

        assert_eq!(config.base.author, "<YOUR_NAME>");
        assert_eq!(config.base.language, "en");
        assert_eq!(config.base.locale, "en_US");
        assert_eq!(config.base.timezone, "UTC");
        assert_eq!(config.base.url, None);
    }

    #[test]
    fn test_unknown_field_rejection() {
        let config = r#"
            [base]
            title = "Test"
            unknown_field = "should_fail"
        "#;
        let result: Result<SiteConfig, _> = toml::from_str(config);

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("unknown field"));
    }
}
