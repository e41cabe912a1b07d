//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Blotter static blog generator CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root directory (default: current directory)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Output directory path (relative to project root)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Config file name (default: blotter.toml)
    #[arg(short = 'C', long, default_value = "blotter.toml")]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build every source whose output is missing or out of date
    Build {
        /// Rebuild everything regardless of modification times
        #[arg(short, long)]
        force: bool,
    },

    /// Serve the output directory, rebuilding on request when sources change
    Serve {
        /// Interface to bind on
        #[arg(short, long)]
        interface: Option<String>,

        /// The port you should provide
        #[arg(short, long)]
        port: Option<u16>,
    },
}

impl Cli {
    pub const fn is_serve(&self) -> bool {
        matches!(self.command, Commands::Serve { .. })
    }

    pub const fn force(&self) -> bool {
        matches!(self.command, Commands::Build { force: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build_force() {
        let cli = Cli::try_parse_from(["blotter", "--root", "site", "build", "--force"]).unwrap();
        assert!(cli.force());
        assert!(!cli.is_serve());
        assert_eq!(cli.root, Some(PathBuf::from("site")));
        assert_eq!(cli.config, PathBuf::from("blotter.toml"));
    }

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from(["blotter", "serve", "-p", "8080"]).unwrap();
        assert!(cli.is_serve());
        assert!(matches!(
            cli.command,
            Commands::Serve { port: Some(8080), interface: None }
        ));
    }
}
