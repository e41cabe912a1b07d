//! `[serve]`: where `blotter serve` listens.

use super::{defaults, error::ConfigFileError};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// ```toml
/// [serve]
/// interface = "127.0.0.1"
/// port = 5000   # the next free port is tried when taken
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ServeConfig {
    /// IP address to bind; `0.0.0.0` exposes the preview to the network.
    #[serde(default = "defaults::serve::interface")]
    #[educe(Default = defaults::serve::interface())]
    pub interface: String,

    #[serde(default = "defaults::serve::port")]
    #[educe(Default = defaults::serve::port())]
    pub port: u16,
}

impl ServeConfig {
    pub fn ip(&self) -> Result<IpAddr, ConfigFileError> {
        self.interface.parse().map_err(|_| {
            ConfigFileError::Validation(format!(
                "[serve.interface] `{}` is not an IP address",
                self.interface
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;

    #[test]
    fn test_serve_defaults_to_localhost_5000() {
        let config: SiteConfig = toml::from_str("").unwrap();
        assert_eq!(config.serve.port, 5000);
        assert_eq!(config.serve.ip().unwrap().to_string(), "127.0.0.1");
    }

    #[test]
    fn test_serve_interface_must_be_an_ip() {
        let config: SiteConfig = toml::from_str("[serve]\ninterface = \"::1\"\nport = 8080").unwrap();
        assert!(config.serve.ip().unwrap().is_ipv6());
        assert_eq!(config.serve.port, 8080);

        let config: SiteConfig = toml::from_str("[serve]\ninterface = \"localhost\"").unwrap();
        let err = config.serve.ip().unwrap_err();
        assert!(err.to_string().contains("localhost"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serve_has_no_watch_switch() {
        // Rebuilds happen per request; there is no watcher to turn off.
        assert!(toml::from_str::<SiteConfig>("[serve]\nwatch = false").is_err());
    }
}
