mod net;
mod state;

use crate::net::start_websocket_server;
use crate::state::SharedGameState;

use kart_sim::kart_core::config::{ConfigError, SimConfig};
use kart_sim::kart_core::track::{SplineTrack, TrackError};

use std::env;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::{interval, Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum ServerError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error("track: {0}")]
    Track(#[from] TrackError),
    #[error("bind {addr}: {source}")]
    Bind { addr: String, source: std::io::Error },
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        tracing::error!("❌ {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ServerError> {
    tracing::info!("🚀 Starting kart race server...");

    let config = match env::var("KART_CONFIG") {
        Ok(path) => SimConfig::from_json_file(&path)?,
        Err(_) => SimConfig::default(),
    };
    let track = match env::var("KART_TRACK") {
        Ok(path) => SplineTrack::from_json_file(&path)?,
        Err(_) => SplineTrack::demo_circuit(),
    };
    let addr = env::var("KART_BIND").unwrap_or_else(|_| "0.0.0.0:9001".to_string());
    let ai_count = env_or("KART_AI", 3usize);
    let laps = env_or("KART_LAPS", 3u32);

    let state = Arc::new(Mutex::new(SharedGameState::new(config, track, ai_count, laps)?));

    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(source) => return Err(ServerError::Bind { addr, source }),
    };
    tokio::spawn(start_websocket_server(listener, Arc::clone(&state)));

    // Wall clock feeds the fixed-step clock: ~60 Hz frames, 120 Hz physics
    let start = Instant::now();
    let mut ticker = interval(Duration::from_millis(16));

    loop {
        ticker.tick().await;
        let now_ms = start.elapsed().as_secs_f64() * 1000.0;

        let mut game = state.lock().await;
        game.frame(now_ms);
    }
}
