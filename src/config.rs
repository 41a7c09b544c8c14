//! Client configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

use crate::errors::Error;
use crate::events::EventBus;
use crate::protocol::BROADCAST_PORT;
use crate::registry::DeviceRegistry;

type Result<T> = std::result::Result<T, Error>;

/// Tunables for a [`Client`](crate::Client).
///
/// Durations are expressed in milliseconds when (de)serialized, and missing
/// fields fall back to their defaults.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use lifx_lan_rs::ClientConfig;
///
/// let config = ClientConfig::from_json(r#"{ "discovery_interval": 5000 }"#).unwrap();
/// assert_eq!(config.discovery_interval, Duration::from_secs(5));
/// assert_eq!(config.liveness_window, Duration::from_secs(10));
/// ```
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Address the receive socket binds to
    pub listen_addr: SocketAddr,
    /// Destination of discovery broadcasts
    pub broadcast_addr: SocketAddr,
    /// Time between discovery broadcasts
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub discovery_interval: Duration,
    /// Silence after which a bulb is marked not visible
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub liveness_window: Duration,
    /// Longest idle wait before the registry checks for silent bulbs
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub sweep_interval: Duration,
    /// Decoded datagrams waiting for the registry
    pub inbound_queue_depth: usize,
    /// Events buffered per subscriber before new ones are dropped
    pub subscriber_queue_depth: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, BROADCAST_PORT)),
            broadcast_addr: SocketAddr::from((Ipv4Addr::BROADCAST, BROADCAST_PORT)),
            discovery_interval: Duration::from_secs(3),
            liveness_window: DeviceRegistry::DEFAULT_LIVENESS_WINDOW,
            sweep_interval: Duration::from_secs(1),
            inbound_queue_depth: 256,
            subscriber_queue_depth: EventBus::DEFAULT_DEPTH,
        }
    }
}

impl ClientConfig {
    /// Parse a JSON document, filling gaps with defaults, and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ClientConfig = serde_json::from_str(json).map_err(Error::ConfigLoad)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("discovery_interval", self.discovery_interval),
            ("liveness_window", self.liveness_window),
            ("sweep_interval", self.sweep_interval),
        ] {
            if value.is_zero() {
                return Err(Error::InvalidConfig(format!("{name} must be non-zero")));
            }
        }

        if self.inbound_queue_depth == 0 || self.subscriber_queue_depth == 0 {
            return Err(Error::InvalidConfig("queue depths must be non-zero".into()));
        }
        Ok(())
    }

    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    pub fn with_broadcast_addr(mut self, addr: SocketAddr) -> Self {
        self.broadcast_addr = addr;
        self
    }

    pub fn with_discovery_interval(mut self, interval: Duration) -> Self {
        self.discovery_interval = interval;
        self
    }

    pub fn with_liveness_window(mut self, window: Duration) -> Self {
        self.liveness_window = window;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.listen_addr.port(), 56700);
        assert_eq!(config.broadcast_addr, "255.255.255.255:56700".parse::<SocketAddr>().unwrap());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_round_trip_json() {
        let config = ClientConfig::default().with_sweep_interval(Duration::from_millis(250));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"sweep_interval\":250"));
        assert_eq!(ClientConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_rejects_zero_interval() {
        let err = ClientConfig::from_json(r#"{ "liveness_window": 0 }"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_bad_json() {
        assert!(matches!(
            ClientConfig::from_json("{ nope"),
            Err(Error::ConfigLoad(_))
        ));
    }
}
