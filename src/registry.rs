//! The device registry: applies decoded packets to the set of known gateways
//! and bulbs.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::device::{Bulb, Gateway, GatewayKey};
use crate::events::Event;
use crate::protocol::{Command, Payload, SERVICE_UDP};
use crate::status::LightSensorReading;
use crate::transport::GatewayLink;
use crate::types::{DeviceAddress, Label, SiteId};

/// Known gateways and bulbs.
///
/// Every mutation returns the events it produced; publishing them is left to
/// the caller so the registry stays free of I/O.
#[derive(Debug)]
pub struct DeviceRegistry {
    gateways: HashMap<GatewayKey, Gateway>,
    bulbs: HashMap<DeviceAddress, Bulb>,
    tag_labels: HashMap<u64, Label>,
    liveness_window: Duration,
}

impl DeviceRegistry {
    /// Silence after which a bulb is considered offline.
    pub const DEFAULT_LIVENESS_WINDOW: Duration = Duration::from_secs(10);

    pub fn new(liveness_window: Duration) -> Self {
        DeviceRegistry {
            gateways: HashMap::new(),
            bulbs: HashMap::new(),
            tag_labels: HashMap::new(),
            liveness_window,
        }
    }

    /// Apply one decoded datagram received from `source` at `now`.
    pub fn apply(&mut self, command: &Command, source: SocketAddr, now: Instant) -> Vec<Event> {
        let header = &command.header;
        match &command.payload {
            Payload::PanGateway(gw) => match gateway_key(command, source) {
                Some(key) => self
                    .upsert_gateway(key, header.site, now)
                    .into_iter()
                    .collect(),
                None => {
                    trace!("ignoring gateway {} with service {}", header.target, gw.service);
                    Vec::new()
                }
            },
            Payload::LightState(state) => {
                let address = header.target;
                let changed = match self.bulbs.get_mut(&address) {
                    Some(bulb) => bulb.record_light_state(header.site, *state, now),
                    None => {
                        debug!("found bulb {address} on site {}", header.site);
                        let bulb = Bulb::new(address, header.site, *state, now);
                        self.bulbs.insert(address, bulb);
                        true
                    }
                };
                self.changed(address, changed)
            }
            Payload::PowerState(power) => {
                let address = header.target;
                let Some(bulb) = self.bulbs.get_mut(&address) else {
                    trace!("power report for unknown bulb {address}");
                    return Vec::new();
                };
                let changed = bulb.record_power(power.on_off, now);
                self.changed(address, changed)
            }
            Payload::AmbientLightState(ambient) => {
                vec![Event::SensorReading(LightSensorReading {
                    bulb: header.target,
                    lux: ambient.lux,
                })]
            }
            Payload::TagLabels(labels) => {
                self.tag_labels.insert(labels.tags, labels.label);
                Vec::new()
            }
            Payload::Tags(tags) => {
                trace!("site {} reports tags {:#x}", header.site, tags.tags);
                Vec::new()
            }
            other => {
                trace!("ignoring {} from {source}", other.opcode());
                Vec::new()
            }
        }
    }

    /// Mark bulbs silent for longer than the liveness window as not visible.
    pub fn sweep(&mut self, now: Instant) -> Vec<Event> {
        let window = self.liveness_window;
        let mut events: Vec<Event> = self
            .bulbs
            .values_mut()
            .filter_map(|bulb| {
                bulb.expire(now, window).then(|| {
                    debug!("bulb {} went offline", bulb.address());
                    Event::BulbChanged(bulb.clone())
                })
            })
            .collect();
        events.sort_by_key(|event| match event {
            Event::BulbChanged(bulb) => bulb.address(),
            _ => DeviceAddress::ZERO,
        });
        events
    }

    /// Give a gateway its outbound association.
    pub(crate) fn attach_link(&mut self, key: &GatewayKey, link: Arc<GatewayLink>) -> bool {
        match self.gateways.get_mut(key) {
            Some(gateway) => {
                gateway.attach(link);
                true
            }
            None => false,
        }
    }

    /// The already known gateway announced by `command`, if it still has no
    /// outbound association.
    pub(crate) fn unlinked_gateway(&self, command: &Command, source: SocketAddr) -> Option<Gateway> {
        let key = gateway_key(command, source)?;
        self.gateways
            .get(&key)
            .filter(|gw| gw.link().is_none())
            .cloned()
    }

    /// Connected associations of every gateway, optionally limited to one site.
    pub(crate) fn routes(&self, site: Option<SiteId>) -> Vec<(SiteId, Arc<GatewayLink>)> {
        let mut gateways: Vec<&Gateway> = self
            .gateways
            .values()
            .filter(|gw| site.is_none_or(|site| gw.site() == site))
            .collect();
        gateways.sort_by_key(|gw| gw.key());

        gateways
            .into_iter()
            .filter_map(|gw| gw.link().map(|link| (gw.site(), Arc::clone(link))))
            .collect()
    }

    /// Snapshot of every tracked bulb, ordered by address.
    pub fn bulbs(&self) -> Vec<Bulb> {
        let mut bulbs: Vec<Bulb> = self.bulbs.values().cloned().collect();
        bulbs.sort_by_key(|bulb| bulb.address());
        bulbs
    }

    pub fn bulb(&self, address: &DeviceAddress) -> Option<&Bulb> {
        self.bulbs.get(address)
    }

    /// Snapshot of every known gateway.
    pub fn gateways(&self) -> Vec<Gateway> {
        let mut gateways: Vec<Gateway> = self.gateways.values().cloned().collect();
        gateways.sort_by_key(|gw| gw.key());
        gateways
    }

    /// Label reported for a tag bitmask, if a TagLabels packet named it.
    pub fn tag_label(&self, tags: u64) -> Option<String> {
        self.tag_labels.get(&tags).map(Label::text)
    }

    pub fn gateway_count(&self) -> usize {
        self.gateways.len()
    }

    pub fn bulb_count(&self) -> usize {
        self.bulbs.len()
    }

    /// Gateways that have not announced themselves within the liveness window.
    pub fn stale_gateway_count(&self, now: Instant) -> usize {
        self.gateways
            .values()
            .filter(|gw| gw.is_stale(now, self.liveness_window))
            .count()
    }

    pub fn visible_count(&self) -> usize {
        self.bulbs.values().filter(|bulb| bulb.is_visible()).count()
    }

    fn upsert_gateway(&mut self, key: GatewayKey, site: SiteId, now: Instant) -> Option<Event> {
        if let Some(gateway) = self.gateways.get_mut(&key) {
            trace!("refreshed gateway {} at {}", key.address, key.host);
            gateway.refresh(site, now);
            return None;
        }

        debug!("found gateway {} at {} for site {site}", key.address, key.host);
        let gateway = Gateway::new(key, site, now);
        self.gateways.insert(key, gateway.clone());
        Some(Event::GatewayDiscovered(gateway))
    }

    fn changed(&self, address: DeviceAddress, changed: bool) -> Vec<Event> {
        match self.bulbs.get(&address) {
            Some(bulb) if changed => vec![Event::BulbChanged(bulb.clone())],
            _ => Vec::new(),
        }
    }
}

/// Identity of the gateway announced by a PANGateway with the UDP service.
fn gateway_key(command: &Command, source: SocketAddr) -> Option<GatewayKey> {
    match &command.payload {
        Payload::PanGateway(gw) if gw.service == SERVICE_UDP => Some(GatewayKey {
            address: command.header.target,
            port: gw.port,
            host: source,
        }),
        _ => None,
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIVENESS_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{AmbientLightState, LightState, PanGateway, PowerState, TagLabels};

    const ADDR: [u8; 6] = [0xd0, 0x73, 0xd5, 0x00, 0x35, 0xf7];

    fn source() -> SocketAddr {
        "192.168.1.20:56700".parse().unwrap()
    }

    fn light_state(hue: u16, power: u16) -> Command {
        Command::new(Payload::LightState(LightState {
            hue,
            saturation: 0xffff,
            brightness: 0x1f4,
            kelvin: 0,
            dim: 0,
            power,
            label: Label::new("Porch"),
            tags: 0,
        }))
        .with_target(DeviceAddress::new(ADDR))
        .with_site(SiteId::new(ADDR))
    }

    fn pan_gateway(service: u8) -> Command {
        Command::new(Payload::PanGateway(PanGateway {
            service,
            port: 56700,
        }))
        .with_target(DeviceAddress::new(ADDR))
        .with_site(SiteId::new(ADDR))
    }

    fn bulb_changes(events: &[Event]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, Event::BulbChanged(_)))
            .count()
    }

    #[test]
    fn test_light_state_creates_bulb() {
        let mut registry = DeviceRegistry::default();
        let events = registry.apply(&light_state(0xcc15, 1), source(), Instant::now());

        assert_eq!(bulb_changes(&events), 1);
        let bulbs = registry.bulbs();
        assert_eq!(bulbs.len(), 1);
        assert_eq!(
            bulbs[0].address(),
            "d0:73:d5:00:35:f7".parse::<DeviceAddress>().unwrap()
        );
        assert_eq!(bulbs[0].state().power, 1);
        assert_eq!(bulbs[0].state().hue, 0xcc15);
        assert!(bulbs[0].is_visible());
        assert_eq!(bulbs[0].label(), "Porch");
    }

    #[test]
    fn test_same_light_state_twice_emits_once() {
        let mut registry = DeviceRegistry::default();
        let now = Instant::now();
        let mut events = registry.apply(&light_state(0xcc15, 1), source(), now);
        events.extend(registry.apply(&light_state(0xcc15, 1), source(), now));

        assert_eq!(bulb_changes(&events), 1);
    }

    #[test]
    fn test_changed_light_state_emits_again() {
        let mut registry = DeviceRegistry::default();
        let now = Instant::now();
        registry.apply(&light_state(0xcc15, 1), source(), now);
        let events = registry.apply(&light_state(0x1000, 1), source(), now);

        assert_eq!(bulb_changes(&events), 1);
        assert_eq!(registry.bulbs()[0].state().hue, 0x1000);
    }

    #[test]
    fn test_power_state_patches_power_only() {
        let mut registry = DeviceRegistry::default();
        let now = Instant::now();
        registry.apply(&light_state(0xcc15, 1), source(), now);

        let off = Command::new(Payload::PowerState(PowerState { on_off: 0 }))
            .with_target(DeviceAddress::new(ADDR));
        let events = registry.apply(&off, source(), now);

        assert_eq!(bulb_changes(&events), 1);
        let state = registry.bulbs()[0].state();
        assert_eq!(state.power, 0);
        assert_eq!(state.hue, 0xcc15);

        // same power again is not a change
        assert!(registry.apply(&off, source(), now).is_empty());
    }

    #[test]
    fn test_power_state_for_unknown_bulb_is_noop() {
        let mut registry = DeviceRegistry::default();
        let cmd = Command::new(Payload::PowerState(PowerState { on_off: 1 }))
            .with_target(DeviceAddress::new(ADDR));

        assert!(registry.apply(&cmd, source(), Instant::now()).is_empty());
        assert!(registry.bulbs().is_empty());
    }

    #[test]
    fn test_staleness_transitions_once_and_keeps_bulb() {
        let mut registry = DeviceRegistry::default();
        let t0 = Instant::now();
        registry.apply(&light_state(0xcc15, 1), source(), t0);

        assert!(registry.sweep(t0 + Duration::from_secs(9)).is_empty());

        let events = registry.sweep(t0 + Duration::from_secs(11));
        assert_eq!(bulb_changes(&events), 1);
        assert!(registry.sweep(t0 + Duration::from_secs(20)).is_empty());

        let bulbs = registry.bulbs();
        assert_eq!(bulbs.len(), 1);
        assert!(!bulbs[0].is_visible());
        assert_eq!(registry.visible_count(), 0);
    }

    #[test]
    fn test_stale_bulb_comes_back() {
        let mut registry = DeviceRegistry::default();
        let t0 = Instant::now();
        registry.apply(&light_state(0xcc15, 1), source(), t0);
        registry.sweep(t0 + Duration::from_secs(11));

        let events = registry.apply(&light_state(0xcc15, 1), source(), t0 + Duration::from_secs(12));
        assert_eq!(bulb_changes(&events), 1);
        assert!(registry.bulbs()[0].is_visible());
    }

    #[test]
    fn test_unchanged_reports_keep_bulb_alive() {
        let mut registry = DeviceRegistry::default();
        let t0 = Instant::now();
        registry.apply(&light_state(0xcc15, 1), source(), t0);
        registry.apply(&light_state(0xcc15, 1), source(), t0 + Duration::from_secs(8));

        assert!(registry.sweep(t0 + Duration::from_secs(15)).is_empty());
    }

    #[test]
    fn test_duplicate_gateway_dedup() {
        let mut registry = DeviceRegistry::default();
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_secs(3);

        let first = registry.apply(&pan_gateway(1), source(), t0);
        let second = registry.apply(&pan_gateway(1), source(), t1);

        assert!(matches!(first.as_slice(), [Event::GatewayDiscovered(_)]));
        assert!(second.is_empty());

        let gateways = registry.gateways();
        assert_eq!(gateways.len(), 1);
        assert_eq!(gateways[0].last_seen(), t1);
        assert_eq!(gateways[0].site(), SiteId::new(ADDR));
    }

    #[test]
    fn test_gateway_on_another_host_is_separate() {
        let mut registry = DeviceRegistry::default();
        let now = Instant::now();
        registry.apply(&pan_gateway(1), source(), now);
        registry.apply(&pan_gateway(1), "192.168.1.21:56700".parse().unwrap(), now);

        assert_eq!(registry.gateways().len(), 2);
    }

    #[test]
    fn test_gateway_without_udp_service_ignored() {
        let mut registry = DeviceRegistry::default();
        assert!(registry.apply(&pan_gateway(2), source(), Instant::now()).is_empty());
        assert!(registry.gateways().is_empty());
    }

    #[test]
    fn test_ambient_light_is_not_stored() {
        let mut registry = DeviceRegistry::default();
        let cmd = Command::new(Payload::AmbientLightState(AmbientLightState { lux: 21.5 }))
            .with_target(DeviceAddress::new(ADDR));
        let events = registry.apply(&cmd, source(), Instant::now());

        match events.as_slice() {
            [Event::SensorReading(reading)] => {
                assert_eq!(reading.bulb, DeviceAddress::new(ADDR));
                assert_eq!(reading.lux, 21.5);
            }
            other => panic!("unexpected events {other:?}"),
        }
        assert!(registry.bulbs().is_empty());
    }

    #[test]
    fn test_tag_labels_remembered() {
        let mut registry = DeviceRegistry::default();
        let cmd = Command::new(Payload::TagLabels(TagLabels {
            tags: 0b10,
            label: Label::new("Bedroom"),
        }));
        registry.apply(&cmd, source(), Instant::now());

        assert_eq!(registry.tag_label(0b10).as_deref(), Some("Bedroom"));
        assert_eq!(registry.tag_label(0b01), None);
    }

    #[test]
    fn test_unlinked_gateway_only_for_known_announcements() {
        let mut registry = DeviceRegistry::default();
        assert!(registry.unlinked_gateway(&pan_gateway(1), source()).is_none());

        registry.apply(&pan_gateway(1), source(), Instant::now());
        let gateway = registry.unlinked_gateway(&pan_gateway(1), source()).unwrap();
        assert_eq!(gateway.address(), DeviceAddress::new(ADDR));

        assert!(registry.unlinked_gateway(&pan_gateway(2), source()).is_none());
        assert!(registry.unlinked_gateway(&light_state(1, 1), source()).is_none());
    }

    #[test]
    fn test_stale_gateway_count() {
        let mut registry = DeviceRegistry::new(Duration::from_secs(10));
        let t0 = Instant::now();
        registry.apply(&pan_gateway(1), source(), t0);

        assert_eq!(registry.stale_gateway_count(t0 + Duration::from_secs(5)), 0);
        assert_eq!(registry.stale_gateway_count(t0 + Duration::from_secs(11)), 1);

        registry.apply(&pan_gateway(1), source(), t0 + Duration::from_secs(11));
        assert_eq!(registry.stale_gateway_count(t0 + Duration::from_secs(12)), 0);
    }

    #[test]
    fn test_routes_skip_gateways_without_link() {
        let mut registry = DeviceRegistry::default();
        registry.apply(&pan_gateway(1), source(), Instant::now());
        assert!(registry.routes(None).is_empty());
    }
}
