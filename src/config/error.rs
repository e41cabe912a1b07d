//! Errors from loading `blotter.toml`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("cannot read config file `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("malformed config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;

    #[test]
    fn test_toml_errors_keep_the_location() {
        let err = SiteConfig::from_str("[base]\ntitle = ").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("malformed config file:"));
        assert!(message.contains("line 2"));
    }
}
