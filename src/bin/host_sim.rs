//! Host agent simulator
//!
//! Listens for a controller, serves a synthetic set of audio sessions and
//! periodically opens and closes one to exercise slot refill.

use anyhow::Result;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fader_link::{
    codec::IconBitmap,
    config::AppConfig,
    host::{HostPeer, HostSession},
    protocol::SessionId,
    transport::StreamTransport,
};

const LEVEL_INTERVAL: Duration = Duration::from_millis(50);
const CHURN_INTERVAL: Duration = Duration::from_secs(10);
const STATS_INTERVAL: Duration = Duration::from_secs(5);
const CHURN_PID: u32 = 4242;

fn gradient(seed: u16) -> IconBitmap {
    IconBitmap::from_fn(|x, y| seed.wrapping_add((x as u16) << 5).wrapping_add(y as u16))
}

fn seed_sessions() -> Vec<HostSession> {
    vec![
        HostSession::new(1204, "Spotify", 45).with_icon(gradient(0x07E0)),
        HostSession::new(2210, "Discord", 70).with_icon(gradient(0xF800)),
        HostSession::new(3321, "Firefox", 30),
        HostSession::new(4410, "System Sounds", 20),
    ]
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load_or_default()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config.transport.address.clone());

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Host simulator listening on {}", address);

    let (stream, peer) = listener.accept().await?;
    let stream = stream.into_std()?;
    stream.set_nonblocking(true)?;
    stream.set_nodelay(true)?;
    tracing::info!("Controller connected from {}", peer);

    let mut host = HostPeer::new(StreamTransport::new(stream));
    for session in seed_sessions() {
        host.add_session(session);
    }

    let mut ticker = tokio::time::interval(config.timing.tick_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last_levels = Instant::now();
    let mut last_churn = Instant::now();
    let mut last_stats = Instant::now();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }

        host.poll();
        for event in host.take_events() {
            tracing::info!("Controller: {:?}", event);
        }

        if last_levels.elapsed() >= LEVEL_INTERVAL {
            last_levels = Instant::now();
            host.broadcast_levels();
        }

        if last_churn.elapsed() >= CHURN_INTERVAL {
            last_churn = Instant::now();
            if host.session(SessionId(CHURN_PID)).is_some() {
                tracing::info!("Closing churn session");
                host.close_session(SessionId(CHURN_PID));
            } else {
                tracing::info!("Opening churn session");
                host.open_session(HostSession::new(CHURN_PID, "Media Player", 55));
            }
        }

        if last_stats.elapsed() >= STATS_INTERVAL {
            last_stats = Instant::now();
            tracing::info!("Stats: {}", serde_json::to_string(&host.stats())?);
        }

        if host.transport_mut().is_closed() {
            tracing::warn!("Controller disconnected");
            break;
        }
    }

    Ok(())
}
