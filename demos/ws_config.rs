//! Example: streaming client configuration builder.
//!
//! Run with: cargo run --example ws_config

use std::time::Duration;

use phemex_streamer::auth::StaticCredentials;
use phemex_streamer::ws::{Streamer, WsConfig, endpoints};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = WsConfig::builder()
        .auth_settle_delay(Duration::from_millis(500))
        .retry_backoff(Duration::from_secs(5))
        .max_retries(5)
        .loop_yield(Duration::from_millis(5))
        .build();

    let credentials = StaticCredentials::new("api_key", "api_secret")?;
    let streamer = Streamer::with_config(credentials, endpoints::WS_PUBLIC, config)?;

    println!("Configured streamer: {:?}", streamer);
    Ok(())
}
