//! # lifx_lan_rs
//!
//! An async Rust library for discovering and controlling first-generation
//! LIFX bulbs over the local network.
//!
//! The crate is **runtime-agnostic**: it finds gateway bulbs by UDP
//! broadcast, tracks every bulb reachable through them, and lets you switch
//! and recolour bulbs individually or all at once.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use lifx_lan_rs::{Client, ClientConfig, Colour, Event};
//!
//! async fn run() -> Result<(), lifx_lan_rs::Error> {
//!     let client = Client::new(ClientConfig::default())?;
//!     let mut events = client.subscribe();
//!     client.start_discovery().await?;
//!
//!     // Wait for the first bulb, then turn everything purple.
//!     while let Some(event) = events.recv().await {
//!         if let Event::BulbChanged(bulb) = event {
//!             println!("{} ({}) power={}", bulb.label(), bulb.address(), bulb.state().power);
//!             break;
//!         }
//!     }
//!     client
//!         .lights_colour(Colour::new(0xcc15, 0xffff, 0x1f4, 0), Duration::from_secs(1))
//!         .await
//! }
//! ```
//!
//! ## Features
//!
//! - **Runtime Agnostic**: Works with tokio, async-std, or smol async runtimes
//! - **Discovery**: Gateways are found by periodic broadcast, bulbs by asking each new gateway
//! - **Live State**: A [`Bulb`] snapshot per device, marked not visible after 10 s of silence
//! - **Events**: [`Client::subscribe`] delivers [`Event`]s through a bounded queue per subscriber
//! - **Control**: Power and HSBK colour for one bulb or every bulb
//! - **Diagnostics**: Counters and the last error via [`Client::diagnostics`]
//!
//! ## Communication
//!
//! All traffic is IPv4 UDP. The client listens on port 56700, where bulbs
//! send their reports, and broadcasts discovery requests to
//! `255.255.255.255:56700`. Commands go to each gateway on the port it
//! advertised.
//!
//! ## Runtime Selection
//!
//! Select your preferred runtime using feature flags:
//!
//! ### Using tokio (default)
//!
//! ```toml
//! [dependencies]
//! lifx-lan-rs = "0.1"
//! tokio = { version = "1", features = ["rt-multi-thread", "macros"] }
//! ```
//!
//! ### Using async-std
//!
//! ```toml
//! [dependencies]
//! lifx-lan-rs = { version = "0.1", default-features = false, features = ["runtime-async-std"] }
//! async-std = { version = "1.12", features = ["attributes"] }
//! ```
//!
//! ### Using smol
//!
//! ```toml
//! [dependencies]
//! lifx-lan-rs = { version = "0.1", default-features = false, features = ["runtime-smol"] }
//! smol = "2"
//! ```
//!
//! ## Feature Flags
//!
//! - `runtime-tokio` (default): Use the tokio async runtime
//! - `runtime-async-std`: Use the async-std runtime
//! - `runtime-smol`: Use the smol runtime
//!
//! Exactly one runtime feature must be enabled.

mod client;
mod config;
mod device;
mod diagnostics;
pub mod discovery;
mod errors;
mod events;
pub mod protocol;
mod registry;
pub mod runtime;
mod status;
mod transport;
mod types;

// Re-export public API
pub use client::Client;
pub use config::ClientConfig;
pub use device::{Bulb, Gateway, GatewayKey};
pub use diagnostics::ClientDiagnostics;
pub use errors::Error;
pub use events::{Event, EventBus, Subscription};
pub use registry::DeviceRegistry;
pub use status::{BulbState, LightSensorReading};
pub use transport::GatewayLink;
pub use types::{Colour, DeviceAddress, Label, PowerLevel, SiteId};
