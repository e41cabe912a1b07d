//! Blotter - a static blog generator for reStructuredText and Markdown.

mod builder;
mod cli;
mod config;
mod context;
mod error;
mod frontmatter;
mod incremental;
mod modules;
mod pagination;
mod program;
mod render;
mod routing;
mod serve;
mod signals;
mod storage;
mod utils;

use anyhow::{Result, bail};
use builder::Builder;
use clap::Parser;
use cli::Cli;
use config::SiteConfig;
use serve::serve_site;
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let mut builder = Builder::new(config)?;
    builder.set_force(cli.force());
    builder.run()?;

    if cli.is_serve() {
        serve_site(&mut builder)?;
    }
    Ok(())
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &Cli) -> Result<SiteConfig> {
    let root = cli.root.as_deref().unwrap_or(Path::new("./"));
    let config_path = root.join(&cli.config);

    if !config_path.exists() {
        bail!("Config file not found: {}", config_path.display());
    }

    let mut config = SiteConfig::from_path(&config_path)?;
    config.update_with_cli(cli);
    config.validate()?;
    Ok(config)
}
