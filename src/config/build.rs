//! `[build]` section configuration.
//!
//! Contains source/output paths, active modules and program selection.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::PathBuf};

/// `[build]` section in blotter.toml - build pipeline configuration.
///
/// # Example
/// ```toml
/// [build]
/// source = "."             # Source tree
/// output = "_build"        # Output directory
/// modules = ["blog", "highlight", "tags"]
///
/// [build.programs]
/// txt = "rst"              # Render .txt files as reStructuredText
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Project root directory (usually set via CLI `--root`).
    #[serde(default = "defaults::build::root")]
    #[educe(Default = defaults::build::root())]
    pub root: Option<PathBuf>,

    /// Source tree, relative to the root.
    #[serde(default = "defaults::build::source")]
    #[educe(Default = defaults::build::source())]
    pub source: PathBuf,

    /// Build output directory.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Template directory; missing templates fall back to the builtin set.
    #[serde(default = "defaults::build::templates")]
    #[educe(Default = defaults::build::templates())]
    pub templates: PathBuf,

    /// Output folder for generated static files, relative to the output.
    #[serde(default = "defaults::build::static_folder")]
    #[educe(Default = defaults::build::static_folder())]
    pub static_folder: PathBuf,

    /// Minify HTML output (removes whitespace).
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub minify: bool,

    /// Modules to load, in setup order.
    #[serde(default = "defaults::build::modules")]
    #[educe(Default = defaults::build::modules())]
    pub modules: Vec<String>,

    /// File-name globs excluded from discovery.
    #[serde(default = "defaults::build::ignore")]
    #[educe(Default = defaults::build::ignore())]
    pub ignore: Vec<String>,

    /// File extension to program name; unlisted extensions are copied.
    #[serde(default = "defaults::build::programs")]
    #[educe(Default = defaults::build::programs())]
    pub programs: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;
    use std::path::PathBuf;

    #[test]
    fn test_build_config_defaults() {
        let config: SiteConfig = toml::from_str("").unwrap();

        assert_eq!(config.build.source, PathBuf::from("."));
        assert_eq!(config.build.output, PathBuf::from("_build"));
        assert_eq!(config.build.templates, PathBuf::from("_templates"));
        assert_eq!(config.build.static_folder, PathBuf::from("static"));
        assert_eq!(config.build.modules, ["blog", "highlight", "tags"]);
        assert!(!config.build.minify);
        assert_eq!(config.build.programs.get("md").map(String::as_str), Some("markdown"));
    }

    #[test]
    fn test_build_config_custom() {
        let config = r#"
            [build]
            output = "public"
            modules = ["blog"]
            minify = true

            [build.programs]
            txt = "rst"
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();

        assert_eq!(config.build.output, PathBuf::from("public"));
        assert_eq!(config.build.modules, ["blog"]);
        assert!(config.build.minify);
        assert_eq!(config.build.programs.get("txt").map(String::as_str), Some("rst"));
        // Overriding the table replaces the defaults entirely.
        assert!(!config.build.programs.contains_key("rst"));
    }

    #[test]
    fn test_unknown_field_rejection() {
        let result: Result<SiteConfig, _> = toml::from_str("[build]\ntailwind = true");
        assert!(result.is_err());
    }
}
