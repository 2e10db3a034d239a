//! Phemex market-data WebSocket streaming client.
//!
//! Maintains a single persistent connection: connect, authenticate,
//! subscribe, then stream inbound messages to registered handlers,
//! reconnecting on transport failures.
//!
//! # Example
//!
//! ```rust,ignore
//! use phemex_streamer::auth::Credentials;
//! use phemex_streamer::ws::{FeedMessage, Streamer, endpoints};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = Credentials::new("api_key", "api_secret")?;
//!     let mut streamer = Streamer::new(credentials, endpoints::WS_TESTNET)?;
//!
//!     streamer.subscribe_orderbook(["ETHUSD"], |msg: FeedMessage| async move {
//!         println!("orderbook update: {}", msg.raw);
//!     })?;
//!
//!     // Ctrl-C stops the loop cleanly.
//!     streamer.run_until_ctrl_c().await?;
//!     Ok(())
//! }
//! ```

mod config;
pub mod messages;
mod registry;
mod retry;
mod session;
mod shutdown;
mod streamer;

pub use config::{WsConfig, WsConfigBuilder};
pub use messages::{AuthRequest, FeedMessage, StreamKind, SubscribeRequest};
pub use registry::{MessageHandler, SharedHandler, SubscriptionRegistry, WILDCARD};
pub use retry::{RetryCounter, RetryDecision};
pub use session::{ConnectionSession, SessionState};
pub use shutdown::ShutdownSignal;
pub use streamer::{LoopState, Streamer, StreamerHandle};

/// WebSocket endpoint URLs.
pub mod endpoints {
    /// Production WebSocket endpoint.
    pub const WS_PUBLIC: &str = "wss://phemex.com/ws";
    /// Testnet WebSocket endpoint.
    pub const WS_TESTNET: &str = "wss://testnet.phemex.com/ws";
}
