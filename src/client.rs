//! The client: owns the sockets and background tasks and exposes the
//! control, query and snapshot operations.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use futures::channel::mpsc;
use futures::future::AbortHandle;
use futures::{SinkExt, StreamExt};
use log::{debug, error, trace, warn};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::device::{Bulb, Gateway};
use crate::diagnostics::{ClientDiagnostics, Telemetry};
use crate::discovery;
use crate::errors::Error;
use crate::events::{Event, EventBus, Subscription};
use crate::protocol::{
    Command, Direction, GetTagLabels, Payload, SetLightColour, SetPowerState,
};
use crate::registry::DeviceRegistry;
use crate::runtime::{self, AsyncUdpSocket, UdpSocket};
use crate::transport::{Broadcaster, GatewayLink};
use crate::types::{Colour, DeviceAddress, PowerLevel, SiteId};

type Result<T> = std::result::Result<T, Error>;

const RECV_BUFFER_LEN: usize = 1024;

/// A decoded datagram on its way to the registry.
struct Inbound {
    command: Command,
    source: SocketAddr,
    received_at: Instant,
}

/// Outcome of one registry update.
#[derive(Default)]
struct Update {
    events: Vec<Event>,
    /// A known gateway announced again while still lacking a link
    relink: Option<Gateway>,
}

/// State shared between the client handle and its background tasks.
struct Shared {
    registry: RwLock<DeviceRegistry>,
    bus: EventBus,
    telemetry: Arc<Telemetry>,
    tasks: Mutex<Vec<AbortHandle>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl Shared {
    fn registry(&self) -> RwLockReadGuard<'_, DeviceRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, DeviceRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn tasks(&self) -> MutexGuard<'_, Vec<AbortHandle>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn local_addr(&self) -> MutexGuard<'_, Option<SocketAddr>> {
        self.local_addr.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply an optional datagram, then look for bulbs that went quiet.
    fn update(&self, inbound: Option<Inbound>, now: Instant) -> Update {
        let mut registry = self.registry_mut();
        let mut update = Update::default();
        if let Some(datagram) = inbound {
            update.relink = registry.unlinked_gateway(&datagram.command, datagram.source);
            update.events =
                registry.apply(&datagram.command, datagram.source, datagram.received_at);
        }
        update.events.extend(registry.sweep(now));
        update
    }

    /// Stop every background task. Subscribers stay open.
    fn halt(&self) {
        let tasks = std::mem::take(&mut *self.tasks());
        if !tasks.is_empty() {
            debug!("stopping {} background tasks", tasks.len());
        }
        for task in tasks {
            task.abort();
        }
        *self.local_addr() = None;
        self.telemetry.set_running(false);
    }
}

/// A LIFX LAN client.
///
/// Create one with [`Client::new`], call [`Client::start_discovery`] inside
/// an async runtime, then watch devices appear through
/// [`Client::subscribe`] or the snapshot accessors.
///
/// Dropping the client stops its background tasks and ends every
/// subscription.
///
/// # Examples
///
/// ```no_run
/// use lifx_lan_rs::{Client, ClientConfig, Event};
///
/// # async fn run() -> Result<(), lifx_lan_rs::Error> {
/// let client = Client::new(ClientConfig::default())?;
/// let mut events = client.subscribe();
/// client.start_discovery().await?;
///
/// while let Some(event) = events.recv().await {
///     if let Event::BulbChanged(bulb) = event {
///         println!("{} is {:?}", bulb.label(), bulb.state().power_level());
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct Client {
    config: ClientConfig,
    shared: Arc<Shared>,
    starting: runtime::Mutex<()>,
}

impl Client {
    /// Create a client. Nothing touches the network until
    /// [`Client::start_discovery`] is called.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let shared = Shared {
            registry: RwLock::new(DeviceRegistry::new(config.liveness_window)),
            bus: EventBus::new(config.subscriber_queue_depth),
            telemetry: Arc::new(Telemetry::default()),
            tasks: Mutex::new(Vec::new()),
            local_addr: Mutex::new(None),
        };
        Ok(Client {
            config,
            shared: Arc::new(shared),
            starting: runtime::Mutex::new(()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Bind the receive socket and start the receive, registry-update and
    /// discovery tasks.
    ///
    /// Returns [`Error::Bind`] if the listen address is taken. Calling this
    /// while already running does nothing.
    pub async fn start_discovery(&self) -> Result<()> {
        let _starting = self.starting.lock().await;
        if self.shared.telemetry.is_running() {
            debug!("discovery already running");
            return Ok(());
        }

        let addr = self.config.listen_addr;
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|err| Error::Bind { addr, err })?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| Error::socket("local_addr", e))?;
        let broadcaster = Broadcaster::bind(self.config.broadcast_addr).await?;

        let (inbound_tx, inbound_rx) = mpsc::channel(self.config.inbound_queue_depth);

        // Tasks are registered under the lock so a receive failure that
        // halts immediately cannot race the bookkeeping below.
        let mut tasks = self.shared.tasks();
        tasks.push(runtime::spawn(receive_loop(
            socket,
            inbound_tx,
            Arc::clone(&self.shared),
        )));
        tasks.push(runtime::spawn(update_loop(
            inbound_rx,
            Arc::clone(&self.shared),
            self.config.sweep_interval,
        )));
        tasks.push(runtime::spawn(discovery::broadcast_loop(
            broadcaster,
            self.config.discovery_interval,
            Arc::clone(&self.shared.telemetry),
        )));
        *self.shared.local_addr() = Some(local_addr);
        self.shared.telemetry.set_running(true);
        drop(tasks);

        debug!("listening on {local_addr}");
        Ok(())
    }

    /// Turn every bulb on every known gateway on.
    pub async fn lights_on(&self) -> Result<()> {
        self.broadcast(Payload::SetPowerState(SetPowerState::new(PowerLevel::On)))
            .await
    }

    /// Turn every bulb on every known gateway off.
    pub async fn lights_off(&self) -> Result<()> {
        self.broadcast(Payload::SetPowerState(SetPowerState::new(PowerLevel::Off)))
            .await
    }

    pub async fn light_on(&self, bulb: &Bulb) -> Result<()> {
        self.send_to_bulb(bulb, Payload::SetPowerState(SetPowerState::new(PowerLevel::On)))
            .await
    }

    pub async fn light_off(&self, bulb: &Bulb) -> Result<()> {
        self.send_to_bulb(bulb, Payload::SetPowerState(SetPowerState::new(PowerLevel::Off)))
            .await
    }

    /// Fade every bulb to `colour` over `duration`.
    pub async fn lights_colour(&self, colour: Colour, duration: Duration) -> Result<()> {
        self.broadcast(Payload::SetLightColour(SetLightColour::new(colour, duration)))
            .await
    }

    /// Fade one bulb to `colour` over `duration`.
    pub async fn light_colour(&self, bulb: &Bulb, colour: Colour, duration: Duration) -> Result<()> {
        self.send_to_bulb(bulb, Payload::SetLightColour(SetLightColour::new(colour, duration)))
            .await
    }

    /// Ask a bulb to report its light state. The answer arrives as a
    /// [`Event::BulbChanged`] if anything changed.
    pub async fn get_bulb_state(&self, bulb: &Bulb) -> Result<()> {
        self.send_to_bulb(bulb, Payload::GetLightState).await
    }

    /// Ask a bulb to report its power state.
    pub async fn get_power_state(&self, bulb: &Bulb) -> Result<()> {
        self.send_to_bulb(bulb, Payload::GetPowerState).await
    }

    /// Ask a bulb for an ambient light reading, delivered as
    /// [`Event::SensorReading`].
    pub async fn get_ambient_light(&self, bulb: &Bulb) -> Result<()> {
        self.send_to_bulb(bulb, Payload::GetAmbientLight).await
    }

    /// Ask every gateway for the label of a tag bitmask. Answers are
    /// available through [`Client::tag_label`].
    pub async fn get_tag_labels(&self, tags: u64) -> Result<()> {
        self.broadcast(Payload::GetTagLabels(GetTagLabels { tags }))
            .await
    }

    /// Every bulb seen so far, visible or not, ordered by address.
    pub fn list_bulbs(&self) -> Vec<Bulb> {
        self.shared.registry().bulbs()
    }

    pub fn list_gateways(&self) -> Vec<Gateway> {
        self.shared.registry().gateways()
    }

    pub fn bulb(&self, address: &DeviceAddress) -> Option<Bulb> {
        self.shared.registry().bulb(address).cloned()
    }

    pub fn tag_label(&self, tags: u64) -> Option<String> {
        self.shared.registry().tag_label(tags)
    }

    /// Start receiving events. Only events published after this call are
    /// delivered.
    pub fn subscribe(&self) -> Subscription {
        self.shared.bus.subscribe()
    }

    /// Stop delivering events to a subscription. Returns `false` if it was
    /// already gone.
    pub fn unsubscribe(&self, id: &Uuid) -> bool {
        self.shared.bus.unsubscribe(id)
    }

    pub fn diagnostics(&self) -> ClientDiagnostics {
        let mut report = {
            let registry = self.shared.registry();
            ClientDiagnostics {
                running: false,
                gateway_count: registry.gateway_count(),
                stale_gateway_count: registry.stale_gateway_count(Instant::now()),
                bulb_count: registry.bulb_count(),
                visible_bulb_count: registry.visible_count(),
                subscriber_count: self.shared.bus.subscriber_count(),
                dropped_events: self.shared.bus.dropped(),
                datagrams_received: 0,
                datagrams_rejected: 0,
                failed_sends: 0,
                time_since_last_broadcast: None,
                last_error: None,
            }
        };
        self.shared.telemetry.fill(&mut report);
        report
    }

    /// Address of the receive socket while discovery is running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.shared.local_addr()
    }

    /// Stop all background tasks and end every subscription.
    ///
    /// Sends already in flight complete; the registry keeps its contents.
    pub fn shutdown(&self) {
        self.shared.halt();
        self.shared.bus.close();
    }

    async fn send_to_bulb(&self, bulb: &Bulb, payload: Payload) -> Result<()> {
        let command = Command::new(payload).with_target(bulb.address());
        self.send_routed(command, Some(bulb.site())).await
    }

    async fn broadcast(&self, payload: Payload) -> Result<()> {
        self.send_routed(Command::new(payload), None).await
    }

    /// Send through every gateway, or only those on `site`, stopping at the
    /// first failure.
    async fn send_routed(&self, command: Command, site: Option<SiteId>) -> Result<()> {
        let routes = self.shared.registry().routes(site);
        if routes.is_empty() {
            debug!("no gateway to carry {}", command.opcode());
        }

        for (site, link) in routes {
            if let Err(e) = link.send(&command.with_site(site)).await {
                warn!("{e}");
                self.shared.telemetry.send_failed(&e);
                return Err(e);
            }
        }
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Sole reader of the receive socket: decodes datagrams and queues them for
/// the update task.
async fn receive_loop<S: AsyncUdpSocket>(
    socket: S,
    mut inbound: mpsc::Sender<Inbound>,
    shared: Arc<Shared>,
) {
    let mut buf = [0u8; RECV_BUFFER_LEN];
    loop {
        let (len, source) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(err) => {
                let err = Error::Receive(err);
                error!("{err}");
                shared.telemetry.record_error(&err);
                shared.bus.publish(Event::ReceiveFailed(Arc::new(err)));
                shared.halt();
                return;
            }
        };
        shared.telemetry.datagram_received();

        let command = match Command::decode(&buf[..len]) {
            Ok(command) => command,
            Err(Error::UnknownOpcode(code)) => {
                trace!("ignoring packet type {code:#06x} from {source}");
                shared.telemetry.datagram_rejected();
                continue;
            }
            Err(e) if e.is_recoverable() => {
                debug!("dropping datagram from {source}: {e}");
                shared.telemetry.datagram_rejected();
                continue;
            }
            Err(e) => {
                warn!("failed to decode datagram from {source}: {e}");
                shared.telemetry.datagram_rejected();
                shared.telemetry.record_error(&e);
                continue;
            }
        };

        // Requests from other controllers, and the echo of our own
        // discovery broadcast, carry nothing for the registry.
        if command.opcode().direction() == Direction::Send {
            trace!("ignoring {} request from {source}", command.opcode());
            continue;
        }

        let datagram = Inbound {
            command,
            source,
            received_at: Instant::now(),
        };
        if inbound.send(datagram).await.is_err() {
            return;
        }
    }
}

/// Sole writer of the registry. Wakes for each datagram or after
/// `sweep_interval` of silence.
async fn update_loop(mut inbound: mpsc::Receiver<Inbound>, shared: Arc<Shared>, sweep_interval: Duration) {
    loop {
        let next = match runtime::timeout(sweep_interval, inbound.next()).await {
            Ok(Some(datagram)) => Some(datagram),
            Ok(None) => return,
            Err(_) => None,
        };

        let Update { events, relink } = shared.update(next, Instant::now());
        for event in events {
            let discovered = match &event {
                Event::GatewayDiscovered(gateway) => Some(gateway.clone()),
                _ => None,
            };

            // A gateway is routable before anyone hears about it.
            let link = match &discovered {
                Some(gateway) => link_gateway(&shared, gateway).await,
                None => None,
            };
            shared.bus.publish(event);

            if let (Some(gateway), Some(link)) = (discovered, link)
                && let Err(e) = discovery::survey_gateway(&link, gateway.site()).await
            {
                warn!("bulb discovery via {} failed: {e}", gateway.address());
                shared.telemetry.send_failed(&e);
            }
        }

        if let Some(gateway) = relink {
            debug!("retrying link to gateway {}", gateway.address());
            link_gateway(&shared, &gateway).await;
        }
    }
}

/// Open the outbound association for a gateway and record it in the registry.
async fn link_gateway(shared: &Shared, gateway: &Gateway) -> Option<Arc<GatewayLink>> {
    let link = match GatewayLink::connect(gateway.endpoint()).await {
        Ok(link) => Arc::new(link),
        Err(e) => {
            warn!("cannot reach gateway {}: {e}", gateway.address());
            shared.telemetry.send_failed(&e);
            return None;
        }
    };

    if !shared.registry_mut().attach_link(&gateway.key(), Arc::clone(&link)) {
        return None;
    }
    Some(link)
}
