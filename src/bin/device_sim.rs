//! Controller simulator
//!
//! Runs the dispatch loop against a simulated fader bank and connects to a
//! host agent over TCP.

use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fader_link::{
    actuator::SimulatedActuator,
    config::AppConfig,
    device::{DevicePhase, DispatchLoop},
    transport::StreamTransport,
};

const STATS_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load_or_default()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting fader controller simulator");

    let address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config.transport.address.clone());

    let stream = tokio::net::TcpStream::connect(&address)
        .await
        .with_context(|| format!("connecting to host at {}", address))?
        .into_std()?;
    stream.set_nonblocking(true)?;
    stream.set_nodelay(true)?;
    tracing::info!("Connected to host at {}", address);

    let actuator = SimulatedActuator::new();
    let transport = StreamTransport::new(stream);
    let mut device = DispatchLoop::new(transport, actuator.clone(), &config);
    device.boot();

    let mut ticker = tokio::time::interval(config.timing.tick_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last_stats = Instant::now();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }

        device.tick(Instant::now());

        if device.phase() == DevicePhase::Failed {
            tracing::error!(
                "Controller halted: {}",
                actuator.fatal_message().unwrap_or_default()
            );
            break;
        }
        if device.transport().is_closed() {
            tracing::warn!("Host disconnected");
            break;
        }

        if last_stats.elapsed() >= STATS_INTERVAL {
            last_stats = Instant::now();
            tracing::info!("Stats: {}", serde_json::to_string(&device.stats())?);
            for slot in 0..fader_link::constants::CHANNEL_COUNT {
                let view = actuator.channel(slot);
                tracing::debug!(
                    "Channel {}: {} target={} muted={}",
                    slot,
                    view.name,
                    view.target,
                    view.muted
                );
            }
        }
    }

    tracing::info!("Final stats: {}", serde_json::to_string(&device.stats())?);
    Ok(())
}
