//! Error types for the streaming client.

use thiserror::Error;

/// The main error type for all streamer operations.
///
/// Errors fall into three groups:
/// - configuration errors (credentials, endpoint, subscription),
///   surfaced synchronously by the call that caused them
/// - transport failures, which the reconnection loop retries and never
///   returns to the caller (see [`StreamerError::is_transport`])
/// - [`StreamerError::MaxRetriesExceeded`], the terminal outcome of the loop
#[derive(Error, Debug)]
pub enum StreamerError {
    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// WebSocket communication error (with message)
    #[error("WebSocket error: {0}")]
    WebSocketMsg(String),

    /// WebSocket connection closed by the far end
    #[error("WebSocket connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for the closure
        reason: String,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// The endpoint parsed but is not a WebSocket URL
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Missing required credentials
    #[error("Missing credentials: API key and secret are required")]
    MissingCredentials,

    /// Credentials were supplied but are unusable
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// A subscription request was rejected at registration time
    #[error("Invalid subscription: {0}")]
    InvalidSubscription(String),

    /// Too many consecutive transport failures; the loop has terminated
    #[error("Max retries exceeded after {attempts} consecutive failures")]
    MaxRetriesExceeded {
        /// Number of consecutive failures observed
        attempts: u32,
    },

    /// The streaming loop is no longer running
    #[error("Streamer is no longer running")]
    ClientClosed,
}

impl StreamerError {
    /// Whether this error is a recoverable transport failure.
    ///
    /// Transport failures feed the retry policy of the reconnection loop.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::WebSocket(_) | Self::WebSocketMsg(_) | Self::ConnectionClosed { .. }
        )
    }

    /// Whether this error is the terminal exhaustion outcome.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MaxRetriesExceeded { .. })
    }

    /// Whether this error was raised by configuration or registration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Url(_)
                | Self::InvalidEndpoint(_)
                | Self::MissingCredentials
                | Self::InvalidCredentials(_)
                | Self::InvalidSubscription(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        let closed = StreamerError::ConnectionClosed {
            reason: "reset".into(),
        };
        assert!(closed.is_transport());
        assert!(!closed.is_fatal());

        let msg = StreamerError::WebSocketMsg("Failed to connect".into());
        assert!(msg.is_transport());

        let config = StreamerError::InvalidCredentials("empty".into());
        assert!(!config.is_transport());
        assert!(config.is_configuration());
    }

    #[test]
    fn test_exhaustion_is_fatal_not_transport() {
        let error = StreamerError::MaxRetriesExceeded { attempts: 4 };
        assert!(error.is_fatal());
        assert!(!error.is_transport());
        assert_eq!(
            error.to_string(),
            "Max retries exceeded after 4 consecutive failures"
        );
    }
}
