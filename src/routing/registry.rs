//! Endpoint registry.
//!
//! Maps logical endpoint names to one or more route pattern variants. Variants
//! of one endpoint are tried in registration order, so an un-paginated index
//! and a paged index can share the `blog_index` endpoint.

use super::pattern::{RoutePattern, RouteValue, RouteValues};
use crate::{config::Config, error::Error};
use std::collections::BTreeSet;

/// Where a variant's pattern string comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSource {
    /// A fixed pattern.
    Literal(String),
    /// A configuration key, falling back to `default` when unset.
    Config { key: String, default: String },
}

impl PatternSource {
    pub fn config(key: impl Into<String>, default: impl Into<String>) -> Self {
        Self::Config {
            key: key.into(),
            default: default.into(),
        }
    }

    /// Resolve against the global configuration.
    pub fn resolve(&self, config: &Config) -> String {
        match self {
            Self::Literal(pattern) => pattern.clone(),
            Self::Config { key, default } => config
                .root_get_str(key)
                .unwrap_or_else(|| default.clone()),
        }
    }
}

impl From<&str> for PatternSource {
    fn from(pattern: &str) -> Self {
        Self::Literal(pattern.to_owned())
    }
}

#[derive(Debug, Clone)]
struct Variant {
    pattern: RoutePattern,
    defaults: RouteValues,
}

impl Variant {
    /// Every placeholder is filled, and every supplied key is either a
    /// placeholder or agrees with a default.
    fn is_suitable(&self, values: &RouteValues) -> bool {
        let placeholders: BTreeSet<&str> = self.pattern.placeholders().collect();

        let filled = placeholders
            .iter()
            .all(|name| values.contains_key(*name) || self.defaults.contains_key(*name));

        let consistent = values.iter().all(|(key, value)| {
            placeholders.contains(key.as_str()) || self.defaults.get(key) == Some(value)
        });

        filled && consistent
    }

    /// Declared keys (placeholders and defaults) equal the supplied keys.
    fn is_exact(&self, values: &RouteValues) -> bool {
        let declared: BTreeSet<&str> = self
            .pattern
            .placeholders()
            .chain(self.defaults.keys().map(String::as_str))
            .collect();
        let supplied: BTreeSet<&str> = values.keys().map(String::as_str).collect();
        declared == supplied
    }

    fn build(&self, values: &RouteValues) -> Result<String, Error> {
        let mut merged = self.defaults.clone();
        merged.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.pattern.build(&merged)
    }
}

/// Registry of endpoints and their route variants.
#[derive(Debug, Clone, Default)]
pub struct UrlRegistry {
    /// Every variant with its endpoint, in registration order.
    routes: Vec<(String, Variant)>,
}

impl UrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a variant under `endpoint`; the pattern source is resolved
    /// against `config` once, here.
    pub fn register(
        &mut self,
        endpoint: &str,
        source: impl Into<PatternSource>,
        defaults: RouteValues,
        config: &Config,
    ) -> Result<(), Error> {
        let pattern = RoutePattern::compile(&source.into().resolve(config))?;
        self.routes.push((endpoint.to_owned(), Variant { pattern, defaults }));
        Ok(())
    }

    fn variants<'a>(&'a self, endpoint: &'a str) -> impl Iterator<Item = &'a Variant> + 'a {
        self.routes
            .iter()
            .filter(move |(name, _)| name == endpoint)
            .map(|(_, variant)| variant)
    }

    /// Build a link for `endpoint` from `values`.
    ///
    /// A variant whose declared keys exactly match the supplied ones wins;
    /// otherwise the first suitable variant in registration order is used.
    pub fn build_link(&self, endpoint: &str, values: &RouteValues) -> Result<String, Error> {
        let variants: Vec<&Variant> = self.variants(endpoint).collect();
        if variants.is_empty() {
            return Err(Error::route_build(format!("unknown endpoint `{endpoint}`")));
        }

        let suitable: Vec<&Variant> = variants.into_iter().filter(|v| v.is_suitable(values)).collect();

        let chosen = suitable
            .iter()
            .find(|v| v.is_exact(values))
            .or_else(|| suitable.first())
            .ok_or_else(|| {
                Error::route_build(format!("no matching route for `{endpoint}` with {}", describe(values)))
            })?;

        chosen.build(values)
    }

    /// Match `path` against the variants of `endpoint`, or against every
    /// registered variant when `endpoint` is `None`. The first variant
    /// registered wins.
    pub fn match_path(&self, endpoint: Option<&str>, path: &str) -> Option<(String, RouteValues)> {
        self.routes
            .iter()
            .filter(|(name, _)| endpoint.is_none_or(|wanted| name == wanted))
            .find_map(|(name, variant)| {
                variant.pattern.matches(path).map(|mut values| {
                    for (key, value) in &variant.defaults {
                        values.entry(key.clone()).or_insert_with(|| value.clone());
                    }
                    (name.clone(), values)
                })
            })
    }
}

fn describe(values: &RouteValues) -> String {
    if values.is_empty() {
        return "no values".to_owned();
    }
    values
        .iter()
        .map(|(k, v)| match v {
            RouteValue::Int(n) => format!("{k}={n}"),
            RouteValue::Str(s) => format!("{k}={s:?}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route_values;
    use serde_json::json;

    fn blog_registry(config: &Config) -> UrlRegistry {
        let mut urls = UrlRegistry::new();
        urls.register(
            "blog_index",
            PatternSource::config("modules.blog.index_url", "/"),
            route_values!("page" => 1u64),
            config,
        )
        .unwrap();
        urls.register(
            "blog_index",
            PatternSource::config("modules.blog.paged_index_url", "/page/<page>/"),
            RouteValues::new(),
            config,
        )
        .unwrap();
        urls.register("blog_archive", "/archive/", RouteValues::new(), config).unwrap();
        urls.register("blog_archive", "/<year>/", RouteValues::new(), config).unwrap();
        urls.register("blog_archive", "/<year>/<month>/", RouteValues::new(), config).unwrap();
        urls
    }

    #[test]
    fn test_first_page_uses_unpaginated_variant() {
        let urls = blog_registry(&Config::default());
        assert_eq!(urls.build_link("blog_index", &route_values!("page" => 1u64)).unwrap(), "/");
        assert_eq!(urls.build_link("blog_index", &RouteValues::new()).unwrap(), "/");
        assert_eq!(
            urls.build_link("blog_index", &route_values!("page" => 2u64)).unwrap(),
            "/page/2/"
        );
    }

    #[test]
    fn test_archive_variants_by_keys() {
        let urls = blog_registry(&Config::default());
        assert_eq!(urls.build_link("blog_archive", &RouteValues::new()).unwrap(), "/archive/");
        assert_eq!(
            urls.build_link("blog_archive", &route_values!("year" => 2022u64)).unwrap(),
            "/2022/"
        );
        assert_eq!(
            urls.build_link("blog_archive", &route_values!("year" => 2022u64, "month" => "02"))
                .unwrap(),
            "/2022/02/"
        );
    }

    #[test]
    fn test_no_matching_route() {
        let urls = blog_registry(&Config::default());
        let err = urls
            .build_link("blog_archive", &route_values!("day" => 3u64))
            .unwrap_err();
        assert!(err.to_string().contains("no matching route"));
        assert!(urls.build_link("missing", &RouteValues::new()).is_err());
    }

    #[test]
    fn test_config_key_overrides_default_pattern() {
        let config = Config::new(
            json!({ "modules": { "blog": { "paged_index_url": "/p/<int:page>" } } })
                .as_object()
                .cloned()
                .unwrap(),
        );
        let urls = blog_registry(&config);
        assert_eq!(urls.build_link("blog_index", &route_values!("page" => 4u64)).unwrap(), "/p/4");
    }

    #[test]
    fn test_match_path_with_endpoint() {
        let urls = blog_registry(&Config::default());

        let (endpoint, values) = urls.match_path(Some("blog_index"), "/page/3/").unwrap();
        assert_eq!(endpoint, "blog_index");
        assert_eq!(values, route_values!("page" => "3"));

        let (_, values) = urls.match_path(Some("blog_index"), "/").unwrap();
        assert_eq!(values, route_values!("page" => 1u64));

        assert!(urls.match_path(Some("blog_index"), "/2022/").is_none());
    }

    #[test]
    fn test_match_path_global() {
        let urls = blog_registry(&Config::default());
        let (endpoint, values) = urls.match_path(None, "/2022/02/").unwrap();
        assert_eq!(endpoint, "blog_archive");
        assert_eq!(values, route_values!("year" => "2022", "month" => "02"));
        assert!(urls.match_path(None, "/nothing/here/at/all/").is_none());
    }

    #[test]
    fn test_match_path_global_follows_registration_order() {
        let urls = blog_registry(&Config::default());
        // `/<year>/<month>/` matches as well, but was registered later.
        let (endpoint, values) = urls.match_path(None, "/page/3/").unwrap();
        assert_eq!(endpoint, "blog_index");
        assert_eq!(values, route_values!("page" => "3"));
    }
}
