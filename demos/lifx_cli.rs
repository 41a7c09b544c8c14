//! CLI application for controlling LIFX bulbs on the local network.
//!
//! Every command first runs discovery for a few seconds so that gateways and
//! bulbs are known before anything is sent.
//!
//! Run with: cargo run --example lifx_cli -- --help

use clap::{Parser, Subcommand};
use std::time::Duration;
use lifx_lan_rs::{Bulb, Client, ClientConfig, Colour, DeviceAddress, Event};

#[derive(Parser)]
#[command(name = "lifx-cli")]
#[command(about = "Control LIFX bulbs from the command line", long_about = None)]
struct Cli {
    /// Seconds to spend discovering devices before running the command
    #[arg(short, long, global = true, default_value = "4")]
    wait: u64,

    /// Optional JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List gateways and bulbs found on the network
    Discover,

    /// Print device events until interrupted
    Watch,

    /// Turn one bulb (or all bulbs) on
    On {
        /// Device address, e.g. d073d50035f7
        #[arg(short, long)]
        bulb: Option<DeviceAddress>,
    },

    /// Turn one bulb (or all bulbs) off
    Off {
        /// Device address, e.g. d073d50035f7
        #[arg(short, long)]
        bulb: Option<DeviceAddress>,
    },

    /// Set an HSBK colour
    Colour {
        hue: u16,
        saturation: u16,
        brightness: u16,
        #[arg(default_value = "0")]
        kelvin: u16,
        /// Transition time in milliseconds
        #[arg(short, long, default_value = "1000")]
        duration: u64,
        /// Device address, e.g. d073d50035f7
        #[arg(short, long)]
        bulb: Option<DeviceAddress>,
    },

    /// Switch everything on, then alternate each bulb between purple and white
    Cycle,

    /// Print client diagnostics as JSON
    Diagnostics,
}

const PURPLE: Colour = Colour::new(0xcc15, 0xffff, 0x1f4, 0);
const WHITE: Colour = Colour::white(0x8000, 0x0af0);
const FADE: Duration = Duration::from_millis(0x0513);

fn find(client: &Client, address: &DeviceAddress) -> Result<Bulb, Box<dyn std::error::Error>> {
    client
        .bulb(address)
        .ok_or_else(|| format!("bulb {address} was not found").into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ClientConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => ClientConfig::default(),
    };
    let client = Client::new(config)?;
    let mut events = client.subscribe();

    client.start_discovery().await?;
    println!("Discovering LIFX devices for {}s...", cli.wait);
    tokio::time::sleep(Duration::from_secs(cli.wait)).await;

    match cli.command {
        Commands::Discover => {
            let gateways = client.list_gateways();
            println!("\nFound {} gateway(s):", gateways.len());
            for gw in gateways {
                println!("  {}  site {}  at {}", gw.address(), gw.site(), gw.endpoint());
            }

            let bulbs = client.list_bulbs();
            println!("\nFound {} bulb(s):", bulbs.len());
            for bulb in bulbs {
                let state = bulb.state();
                println!(
                    "  {}  {:20}  power={} hue={:#06x} sat={:#06x} bri={:#06x} visible={}",
                    bulb.address(),
                    bulb.label(),
                    state.power,
                    state.hue,
                    state.saturation,
                    state.brightness,
                    state.visible
                );
            }
        }

        Commands::Watch => {
            println!("Listening for device events... (Press Ctrl+C to stop)\n");
            while let Some(event) = events.recv().await {
                match event {
                    Event::GatewayDiscovered(gw) => {
                        println!("Gateway {} at {}", gw.address(), gw.endpoint())
                    }
                    Event::BulbChanged(bulb) => {
                        println!("Bulb {} {:?}", bulb.address(), bulb.state())
                    }
                    Event::SensorReading(reading) => {
                        println!("Bulb {} ambient light {} lux", reading.bulb, reading.lux)
                    }
                    Event::ReceiveFailed(err) => {
                        eprintln!("Receive failed: {err}");
                        break;
                    }
                }
            }
        }

        Commands::On { bulb } => match bulb {
            Some(address) => client.light_on(&find(&client, &address)?).await?,
            None => client.lights_on().await?,
        },

        Commands::Off { bulb } => match bulb {
            Some(address) => client.light_off(&find(&client, &address)?).await?,
            None => client.lights_off().await?,
        },

        Commands::Colour {
            hue,
            saturation,
            brightness,
            kelvin,
            duration,
            bulb,
        } => {
            let colour = Colour::new(hue, saturation, brightness, kelvin);
            let duration = Duration::from_millis(duration);
            match bulb {
                Some(address) => {
                    client
                        .light_colour(&find(&client, &address)?, colour, duration)
                        .await?
                }
                None => client.lights_colour(colour, duration).await?,
            }
        }

        Commands::Cycle => loop {
            println!("Lights on");
            if let Err(e) = client.lights_on().await {
                eprintln!("Error: {e}");
            }
            tokio::time::sleep(Duration::from_secs(10)).await;

            for bulb in client.list_bulbs() {
                tokio::time::sleep(Duration::from_secs(5)).await;
                println!("purple {}", bulb.address());
                if let Err(e) = client.light_colour(&bulb, PURPLE, FADE).await {
                    eprintln!("Error: {e}");
                }

                tokio::time::sleep(Duration::from_secs(5)).await;
                println!("white {}", bulb.address());
                if let Err(e) = client.light_colour(&bulb, WHITE, FADE).await {
                    eprintln!("Error: {e}");
                }
            }
        },

        Commands::Diagnostics => {
            let diag = client.diagnostics();
            println!("\nConfig:\n{}", serde_json::to_string_pretty(client.config())?);
            println!("\nDiagnostics:\n{}", serde_json::to_string_pretty(&diag)?);
        }
    }

    client.shutdown();
    Ok(())
}
