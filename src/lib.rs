//! # Phemex Streamer
//!
//! An async Rust streaming client for the Phemex market-data WebSocket feed.
//!
//! ## Features
//!
//! - One persistent connection: connect, authenticate, subscribe, stream
//! - Bounded retry with fixed backoff on transport failures
//! - Live re-subscription without reconnecting
//! - Cooperative shutdown from any task or from Ctrl-C
//! - Per-symbol dispatch to async handlers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use phemex_streamer::auth::Credentials;
//! use phemex_streamer::ws::{FeedMessage, Streamer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = Credentials::new("api_key", "api_secret")?;
//!     let mut streamer = Streamer::testnet(credentials)?;
//!
//!     streamer.subscribe_orderbook(["ETHUSD"], |msg: FeedMessage| async move {
//!         println!("Order book: {}", msg.raw);
//!     })?;
//!
//!     streamer.run_until_ctrl_c().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod error;
pub mod ws;

// Re-export commonly used types at crate root
pub use error::StreamerError;
pub use ws::{FeedMessage, LoopState, StreamKind, Streamer, StreamerHandle, WsConfig};

/// Result type alias using StreamerError
pub type Result<T> = std::result::Result<T, StreamerError>;
