//! Outbound UDP: one connected association per gateway, plus the discovery
//! broadcaster.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};

use log::trace;

use crate::errors::Error;
use crate::protocol::Command;
use crate::runtime::{AsyncUdpSocket, UdpSocket};

type Result<T> = std::result::Result<T, Error>;

fn ephemeral() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
}

/// A send-only UDP association with a single gateway, reused for every
/// command routed through it.
pub struct GatewayLink {
    socket: UdpSocket,
    target: SocketAddr,
}

impl GatewayLink {
    pub(crate) async fn connect(target: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(ephemeral())
            .await
            .map_err(|e| Error::socket("bind", e))?;

        socket
            .connect(target)
            .await
            .map_err(|e| Error::socket("connect", e))?;

        Ok(GatewayLink { socket, target })
    }

    /// Address packets are sent to.
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub(crate) async fn send(&self, command: &Command) -> Result<()> {
        let bytes = command.encode()?;
        self.socket.send(&bytes).await.map_err(|err| Error::Send {
            target: self.target,
            err,
        })?;

        trace!("sent {} to {}", command.opcode(), self.target);
        Ok(())
    }
}

impl fmt::Debug for GatewayLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayLink")
            .field("target", &self.target)
            .finish()
    }
}

/// Broadcast-enabled socket used for discovery requests.
pub(crate) struct Broadcaster {
    socket: UdpSocket,
    target: SocketAddr,
}

impl Broadcaster {
    pub(crate) async fn bind(target: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(ephemeral())
            .await
            .map_err(|e| Error::socket("bind", e))?;

        socket
            .set_broadcast(true)
            .map_err(|e| Error::socket("set_broadcast", e))?;

        Ok(Broadcaster { socket, target })
    }

    pub(crate) async fn send(&self, command: &Command) -> Result<()> {
        let bytes = command.encode()?;
        self.socket
            .send_to(&bytes, self.target)
            .await
            .map_err(|err| Error::Send {
                target: self.target,
                err,
            })?;
        Ok(())
    }
}
