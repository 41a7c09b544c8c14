//! Discovery scheduling.
//!
//! Gateways are found by broadcasting GetPANGateway on a fixed interval. Each
//! newly announced gateway is then asked, once, for the state and tags of the
//! bulbs on its mesh.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::diagnostics::Telemetry;
use crate::errors::Error;
use crate::protocol::{Command, Payload};
use crate::runtime;
use crate::transport::{Broadcaster, GatewayLink};
use crate::types::SiteId;

type Result<T> = std::result::Result<T, Error>;

/// The discovery request: zero target, zero site, discovery protocol.
///
/// # Examples
///
/// ```
/// use lifx_lan_rs::discovery::discovery_request;
///
/// let bytes = discovery_request().encode().unwrap();
/// assert_eq!(&bytes[..4], &[0x24, 0x00, 0x00, 0x54]);
/// ```
pub fn discovery_request() -> Command {
    Command::new(Payload::GetPanGateway)
}

/// Broadcast a discovery request now and then once per `interval`, forever.
///
/// Failed sends are logged and recorded but never end the loop.
pub(crate) async fn broadcast_loop(
    broadcaster: Broadcaster,
    interval: Duration,
    telemetry: Arc<Telemetry>,
) {
    let request = discovery_request();
    loop {
        match broadcaster.send(&request).await {
            Ok(()) => {
                debug!("discovery broadcast sent");
                telemetry.broadcast_sent();
            }
            Err(e) => {
                warn!("discovery broadcast failed: {e}");
                telemetry.send_failed(&e);
            }
        }
        runtime::sleep(interval).await;
    }
}

/// Ask a new gateway for the bulbs on its mesh.
pub(crate) async fn survey_gateway(link: &GatewayLink, site: SiteId) -> Result<()> {
    for payload in [Payload::GetLightState, Payload::GetTags] {
        link.send(&Command::new(payload).with_site(site)).await?;
    }
    debug!("surveyed gateway {} on site {site}", link.target());
    Ok(())
}

#[cfg(all(test, feature = "runtime-tokio"))]
mod tests {
    use std::net::SocketAddr;

    use super::*;
    use crate::protocol::Opcode;

    #[test]
    fn test_discovery_request_is_unaddressed() {
        let request = discovery_request();
        assert!(request.site().is_zero());
        assert!(request.target().is_zero());
        assert_eq!(request.header.protocol, 0x5400);
    }

    #[tokio::test]
    async fn test_survey_gateway_sends_burst_with_site() {
        let gateway = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target: SocketAddr = gateway.local_addr().unwrap();
        let site: SiteId = "d0:73:d5:00:35:f7".parse().unwrap();

        let link = GatewayLink::connect(target).await.unwrap();
        survey_gateway(&link, site).await.unwrap();

        let mut buf = [0u8; 128];
        let mut seen = Vec::new();
        for _ in 0..2 {
            let (n, _) = gateway.recv_from(&mut buf).await.unwrap();
            let command = Command::decode(&buf[..n]).unwrap();
            assert_eq!(command.site(), site);
            seen.push(command.opcode());
        }
        assert_eq!(seen, vec![Opcode::GetLightState, Opcode::GetTags]);
    }

    #[tokio::test]
    async fn test_broadcast_loop_repeats() {
        let listener = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let broadcaster = Broadcaster::bind(listener.local_addr().unwrap())
            .await
            .unwrap();
        let telemetry = Arc::new(Telemetry::default());

        let handle = runtime::spawn(broadcast_loop(
            broadcaster,
            Duration::from_millis(20),
            Arc::clone(&telemetry),
        ));

        let mut buf = [0u8; 64];
        for _ in 0..2 {
            let (n, _) = listener.recv_from(&mut buf).await.unwrap();
            let command = Command::decode(&buf[..n]).unwrap();
            assert_eq!(command.opcode(), Opcode::GetPanGateway);
        }
        handle.abort();
    }
}
