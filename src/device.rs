//! Tracked devices: bulbs and the gateways that bridge them.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::protocol::LightState;
use crate::status::BulbState;
use crate::transport::GatewayLink;
use crate::types::{DeviceAddress, SiteId};

/// A bulb seen on the network.
///
/// Bulbs are keyed by their device address and never forgotten; one that
/// falls silent is only marked not visible.
#[derive(Debug, Clone, Serialize)]
pub struct Bulb {
    address: DeviceAddress,
    site: SiteId,
    state: BulbState,
    #[serde(skip)]
    light_state: LightState,
    #[serde(skip)]
    last_seen: Instant,
}

impl Bulb {
    pub(crate) fn new(address: DeviceAddress, site: SiteId, raw: LightState, now: Instant) -> Self {
        Bulb {
            address,
            site,
            state: BulbState::from(&raw),
            light_state: raw,
            last_seen: now,
        }
    }

    pub fn address(&self) -> DeviceAddress {
        self.address
    }

    /// Site of the gateway the bulb last reported through.
    pub fn site(&self) -> SiteId {
        self.site
    }

    /// Get a snapshot of the bulb's state.
    pub fn state(&self) -> BulbState {
        self.state
    }

    pub fn is_visible(&self) -> bool {
        self.state.visible
    }

    /// Label from the most recent light state report.
    pub fn label(&self) -> String {
        self.light_state.label.text()
    }

    /// Tag bitmask from the most recent light state report.
    pub fn tags(&self) -> u64 {
        self.light_state.tags
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// Record a light state report. Returns `true` if the snapshot changed.
    pub(crate) fn record_light_state(&mut self, site: SiteId, raw: LightState, now: Instant) -> bool {
        self.site = site;
        self.light_state = raw;
        self.last_seen = now;
        self.replace_state(BulbState::from(&raw))
    }

    /// Record a power report. Returns `true` if the snapshot changed.
    pub(crate) fn record_power(&mut self, power: u16, now: Instant) -> bool {
        self.last_seen = now;
        self.replace_state(self.state.with_power(power).with_visible(true))
    }

    /// Mark the bulb offline if it has been silent longer than `window`.
    ///
    /// Returns `true` only on the visible to not-visible transition.
    pub(crate) fn expire(&mut self, now: Instant, window: Duration) -> bool {
        if !self.state.visible || now.saturating_duration_since(self.last_seen) <= window {
            return false;
        }
        self.replace_state(self.state.with_visible(false))
    }

    fn replace_state(&mut self, next: BulbState) -> bool {
        if self.state == next {
            return false;
        }
        self.state = next;
        true
    }
}

/// Identity of a gateway record.
///
/// The same device address may appear behind several host/port pairs, each
/// tracked separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GatewayKey {
    pub address: DeviceAddress,
    pub port: u16,
    /// Source address of the announcement
    pub host: SocketAddr,
}

/// A bulb acting as the bridge between the LAN and its mesh.
#[derive(Debug, Clone, Serialize)]
pub struct Gateway {
    key: GatewayKey,
    site: SiteId,
    #[serde(skip)]
    last_seen: Instant,
    #[serde(skip)]
    link: Option<Arc<GatewayLink>>,
}

impl Gateway {
    pub(crate) fn new(key: GatewayKey, site: SiteId, now: Instant) -> Self {
        Gateway {
            key,
            site,
            last_seen: now,
            link: None,
        }
    }

    pub fn key(&self) -> GatewayKey {
        self.key
    }

    pub fn address(&self) -> DeviceAddress {
        self.key.address
    }

    pub fn site(&self) -> SiteId {
        self.site
    }

    /// Where unicast commands for this gateway go: the announcing host on the
    /// port it advertised.
    pub fn endpoint(&self) -> SocketAddr {
        SocketAddr::new(self.key.host.ip(), self.key.port)
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// Whether the gateway has not announced itself for longer than `window`.
    pub fn is_stale(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > window
    }

    pub(crate) fn link(&self) -> Option<&Arc<GatewayLink>> {
        self.link.as_ref()
    }

    pub(crate) fn refresh(&mut self, site: SiteId, now: Instant) {
        self.site = site;
        self.last_seen = now;
    }

    pub(crate) fn attach(&mut self, link: Arc<GatewayLink>) {
        self.link = Some(link);
    }
}
