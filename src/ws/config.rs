//! Streaming client configuration.

use std::time::Duration;

/// Fixed correlation id carried by every outbound request.
pub const DEFAULT_REQUEST_ID: u64 = 1234;

/// Configuration for the streaming loop.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Pause after sending the auth request, before subscribing.
    pub auth_settle_delay: Duration,
    /// How far in the future each auth request expires.
    pub auth_expiry_window: Duration,
    /// Delay applied before retrying, from the second consecutive failure on.
    pub retry_backoff: Duration,
    /// Consecutive failures tolerated before the loop gives up.
    pub max_retries: u32,
    /// Poll interval while waiting for the first subscription.
    pub subscription_poll_interval: Duration,
    /// Pause at the tail of each loop iteration.
    pub loop_yield: Duration,
    /// Correlation id for auth and subscribe requests.
    pub request_id: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            auth_settle_delay: Duration::from_millis(200),
            auth_expiry_window: Duration::from_secs(120),
            retry_backoff: Duration::from_secs(3),
            max_retries: 3,
            subscription_poll_interval: Duration::from_millis(100),
            loop_yield: Duration::from_millis(10),
            request_id: DEFAULT_REQUEST_ID,
        }
    }
}

impl WsConfig {
    /// Create a new configuration builder.
    pub fn builder() -> WsConfigBuilder {
        WsConfigBuilder::new()
    }
}

/// Builder for [`WsConfig`].
#[derive(Debug, Clone, Default)]
pub struct WsConfigBuilder {
    config: WsConfig,
}

impl WsConfigBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: WsConfig::default(),
        }
    }

    /// Set the delay observed after sending the auth request.
    pub fn auth_settle_delay(mut self, delay: Duration) -> Self {
        self.config.auth_settle_delay = delay;
        self
    }

    /// Set the auth request expiry window.
    pub fn auth_expiry_window(mut self, window: Duration) -> Self {
        self.config.auth_expiry_window = window;
        self
    }

    /// Set the fixed reconnection backoff.
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.config.retry_backoff = backoff;
        self
    }

    /// Set the number of consecutive failures tolerated.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the poll interval used before the first subscription exists.
    pub fn subscription_poll_interval(mut self, interval: Duration) -> Self {
        self.config.subscription_poll_interval = interval;
        self
    }

    /// Set the pause at the tail of each loop iteration.
    pub fn loop_yield(mut self, delay: Duration) -> Self {
        self.config.loop_yield = delay;
        self
    }

    /// Set the request correlation id.
    pub fn request_id(mut self, id: u64) -> Self {
        self.config.request_id = id;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> WsConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WsConfig::default();
        assert_eq!(config.auth_settle_delay, Duration::from_millis(200));
        assert_eq!(config.auth_expiry_window, Duration::from_secs(120));
        assert_eq!(config.retry_backoff, Duration::from_secs(3));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.request_id, 1234);
    }

    #[test]
    fn test_config_builder() {
        let config = WsConfig::builder()
            .auth_settle_delay(Duration::from_millis(50))
            .retry_backoff(Duration::from_secs(1))
            .max_retries(5)
            .subscription_poll_interval(Duration::from_millis(20))
            .loop_yield(Duration::from_millis(1))
            .request_id(42)
            .build();

        assert_eq!(config.auth_settle_delay, Duration::from_millis(50));
        assert_eq!(config.retry_backoff, Duration::from_secs(1));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.subscription_poll_interval, Duration::from_millis(20));
        assert_eq!(config.loop_yield, Duration::from_millis(1));
        assert_eq!(config.request_id, 42);
        assert_eq!(config.auth_expiry_window, Duration::from_secs(120));
    }
}
