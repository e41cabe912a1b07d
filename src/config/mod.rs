//! Site configuration management for `blotter.toml`.
//!
//! # Sections
//!
//! | Section       | Purpose                                        |
//! |---------------|------------------------------------------------|
//! | `[base]`      | Site metadata (title, author, url, timezone)   |
//! | `[build]`     | Paths, active modules, program selection       |
//! | `[serve]`     | Development server (interface, port)           |
//! | `[modules.*]` | Free-form settings read by individual modules  |
//! | `[extra]`     | User-defined custom fields                     |
//!
//! # Example
//!
//! ```toml
//! [base]
//! title = "My Blog"
//! url = "https://example.com/"
//!
//! [build]
//! output = "public"
//!
//! [modules.blog]
//! per_page = 5
//!
//! [extra.feed]
//! name = "Recent posts"
//! ```
//!
//! The typed sections drive the binary itself. Everything that modules and
//! templates read goes through the layered [`Config`], whose global layer is
//! produced by [`SiteConfig::global_layer`].

mod base;
mod build;
pub mod defaults;
mod error;
mod layered;
mod serve;

pub use layered::{Config, Layer};

use base::BaseConfig;
use build::BuildConfig;
use error::ConfigFileError;
use serve::ServeConfig;

use crate::{
    cli::{Cli, Commands},
    utils::date::parse_timezone,
};
use anyhow::{Result, bail};
use chrono::FixedOffset;
use educe::Educe;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Root configuration structure representing blotter.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Basic site information
    #[serde(default)]
    pub base: BaseConfig,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// Per-module settings, e.g. `[modules.blog] per_page = 5`
    #[serde(default)]
    pub modules: toml::Table,

    /// User-defined extra fields
    #[serde(default)]
    pub extra: toml::Table,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigFileError::from)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigFileError::Io(path.to_path_buf(), err))?;
        let mut config = Self::from_str(&content)?;
        config.config_path = path.to_path_buf();
        Ok(config)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Set the root directory and resolve every build path against it.
    pub fn set_root(&mut self, root: &Path) {
        let root = normalize_path(root);
        self.build.source = normalize_path(&root.join(&self.build.source));
        self.build.output = normalize_path(&root.join(&self.build.output));
        self.build.templates = normalize_path(&root.join(&self.build.templates));
        if !self.config_path.as_os_str().is_empty() && self.config_path.is_relative() {
            self.config_path = normalize_path(&root.join(&self.config_path));
        }
        self.build.root = Some(root);
    }

    /// The configured timezone as a fixed offset.
    pub fn timezone(&self) -> Result<FixedOffset> {
        match parse_timezone(&self.base.timezone) {
            Some(tz) => Ok(tz),
            None => bail!(ConfigFileError::Validation(format!(
                "[base.timezone] `{}` is neither `UTC` nor an offset like `+01:00`",
                self.base.timezone
            ))),
        }
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        let root = cli
            .root
            .clone()
            .unwrap_or_else(|| self.get_root().to_owned());

        Self::update_option(&mut self.build.output, cli.output.as_ref());
        self.config_path = cli.config.clone();
        self.set_root(&root);

        if let Commands::Serve { interface, port } = &cli.command {
            Self::update_option(&mut self.serve.interface, interface.as_ref());
            Self::update_option(&mut self.serve.port, port.as_ref());
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Validate configuration before building
    pub fn validate(&self) -> Result<()> {
        self.timezone()?;
        self.serve.ip()?;

        if let Some(base_url) = &self.base.url
            && !base_url.starts_with("http")
        {
            bail!(ConfigFileError::Validation(
                "[base.url] must start with http:// or https://".into()
            ));
        }

        if self.build.output == self.build.source {
            bail!(ConfigFileError::Validation(
                "[build.output] must differ from [build.source]".into()
            ));
        }

        Ok(())
    }

    /// The bottom layer of the layered configuration.
    ///
    /// `[base]` keys sit at the top level (`url` is also exposed as
    /// `canonical_url`), `[modules]` stays nested under `modules`, and
    /// `[extra]` entries are lifted to the top level so `feed.name` can be
    /// written as `[extra.feed] name = ...`.
    pub fn global_layer(&self) -> Layer {
        let mut layer = Layer::new();

        for (key, value) in &self.extra {
            layer.insert(key.clone(), toml_to_json(value));
        }
        if let Ok(Value::Object(base)) = serde_json::to_value(&self.base) {
            layer.extend(base);
        }
        if let Some(url) = &self.base.url {
            layer.insert("canonical_url".into(), Value::String(url.clone()));
        }
        layer.insert(
            "modules".into(),
            toml_to_json(&toml::Value::Table(self.modules.clone())),
        );
        layer
    }
}

/// Normalize a path to absolute, using canonicalize if the path exists
fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}

/// TOML datetimes become their RFC 3339 text.
fn toml_to_json(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(n) => Value::from(*n),
        toml::Value::Float(f) => Value::from(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_json(v)))
                .collect(),
        ),
    }
}

// ============================================================================
// Tests
// ============================================================================
