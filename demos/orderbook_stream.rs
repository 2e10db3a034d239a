//! Example: stream ETHUSD order book updates from the Phemex testnet.
//!
//! Reads `PHEMEX_API_KEY` and `PHEMEX_API_SECRET` from the environment or a
//! `.env` file. Press Ctrl-C to stop.
//!
//! Run with: cargo run --example orderbook_stream

use phemex_streamer::auth::EnvCredentials;
use phemex_streamer::ws::{FeedMessage, Streamer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenv::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("phemex_streamer=info")),
        )
        .init();

    let credentials = EnvCredentials::from_env()?;
    let mut streamer = Streamer::testnet(credentials)?;

    streamer.subscribe_orderbook(["ETHUSD"], |update: FeedMessage| async move {
        println!("quote: {}", update.raw);
    })?;

    streamer.run_until_ctrl_c().await?;
    Ok(())
}
