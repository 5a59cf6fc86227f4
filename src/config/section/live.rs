//! `[live]` section configuration.
//!
//! ```toml
//! [live]
//! interface = "127.0.0.1"
//! port = 35729            # WebSocket port preview pages connect to
//! ```

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

/// Default WebSocket port for live reload
pub const DEFAULT_LIVE_PORT: u16 = 35729;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub interface: IpAddr,
    pub port: u16,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_LIVE_PORT,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_live_config() {
        let config = test_parse_config("[live]\nport = 40000");
        assert_eq!(config.live.port, 40000);
        assert!(config.live.interface.is_loopback());
    }
}
