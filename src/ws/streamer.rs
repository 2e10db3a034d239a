//! The reconnection loop driving a [`ConnectionSession`].

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use url::Url;

use crate::auth::CredentialsProvider;
use crate::error::StreamerError;
use crate::ws::config::WsConfig;
use crate::ws::endpoints;
use crate::ws::messages::StreamKind;
use crate::ws::registry::{MessageHandler, SharedHandler, SubscriptionRegistry};
use crate::ws::retry::{RetryCounter, RetryDecision};
use crate::ws::session::ConnectionSession;
use crate::ws::shutdown::ShutdownSignal;

/// State of the reconnection loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Constructed, `run` not yet called.
    Idle,
    /// Waiting for the first subscription before opening a socket.
    WaitingForSubscriptions,
    /// Running open, authenticate, settle, subscribe.
    Connecting,
    /// Receiving and dispatching messages.
    Streaming,
    /// Recovering from a transport failure.
    Reconnecting,
    /// Stopped on request. Terminal, no error.
    Stopped,
    /// Gave up. Terminal, an error was returned.
    Failed,
}

impl LoopState {
    /// Whether the loop has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Stopped | LoopState::Failed)
    }
}

/// Requests delivered to a running loop.
enum Command {
    Register {
        kind: StreamKind,
        symbols: Vec<String>,
        handler: SharedHandler,
    },
}

/// Long-lived streaming client for one endpoint.
///
/// The registry, retry counter and socket are owned by this value and only
/// touched by the task running [`Streamer::run`]. Other tasks interact
/// through a [`StreamerHandle`].
///
/// # Example
///
/// ```rust,ignore
/// use phemex_streamer::auth::Credentials;
/// use phemex_streamer::ws::{FeedMessage, StreamKind, Streamer};
///
/// let credentials = Credentials::new("api_key", "api_secret")?;
/// let mut streamer = Streamer::testnet(credentials)?;
/// streamer.register(StreamKind::OrderBook, ["ETHUSD"], |msg: FeedMessage| async move {
///     println!("{}", msg.raw);
/// })?;
///
/// let handle = streamer.handle();
/// let task = tokio::spawn(async move { streamer.run().await });
///
/// // Later, from anywhere:
/// handle.subscribe_trades(["BTCUSD"], |msg: FeedMessage| async move {
///     println!("trade: {}", msg.raw);
/// })?;
/// handle.stop();
/// task.await??;
/// ```
pub struct Streamer {
    /// WebSocket URL.
    url: String,
    /// Credentials used to sign each auth request.
    credentials: Arc<dyn CredentialsProvider>,
    /// Loop configuration.
    config: WsConfig,
    /// Registered subscriptions.
    registry: SubscriptionRegistry,
    /// Stop flag shared with handles.
    shutdown: ShutdownSignal,
    /// Loop state, observable through handles.
    state: Arc<watch::Sender<LoopState>>,
    /// Sender side of the command channel, cloned into handles.
    commands_tx: mpsc::UnboundedSender<Command>,
    /// Commands from handles.
    commands_rx: mpsc::UnboundedReceiver<Command>,
}

impl std::fmt::Debug for Streamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Streamer")
            .field("url", &self.url)
            .field("state", &*self.state.borrow())
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}

impl Streamer {
    /// Create a streamer with default settings.
    pub fn new(
        credentials: impl CredentialsProvider + 'static,
        url: impl Into<String>,
    ) -> Result<Self, StreamerError> {
        Self::with_config(credentials, url, WsConfig::default())
    }

    /// Create a streamer for the testnet endpoint.
    pub fn testnet(credentials: impl CredentialsProvider + 'static) -> Result<Self, StreamerError> {
        Self::new(credentials, endpoints::WS_TESTNET)
    }

    /// Create a streamer with custom configuration.
    ///
    /// Fails if the URL is not a `ws://` or `wss://` URL.
    pub fn with_config(
        credentials: impl CredentialsProvider + 'static,
        url: impl Into<String>,
        config: WsConfig,
    ) -> Result<Self, StreamerError> {
        let url = url.into();
        let parsed = Url::parse(&url)?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(StreamerError::InvalidEndpoint(format!(
                "expected ws:// or wss:// URL, got {}",
                url
            )));
        }

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(LoopState::Idle);

        Ok(Self {
            url,
            credentials: Arc::new(credentials),
            config,
            registry: SubscriptionRegistry::new(),
            shutdown: ShutdownSignal::new(),
            state: Arc::new(state),
            commands_tx,
            commands_rx,
        })
    }

    /// Get the WebSocket URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get the configuration.
    pub fn config(&self) -> &WsConfig {
        &self.config
    }

    /// Get the registered subscriptions.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Current loop state.
    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Get a handle for registering and stopping from other tasks.
    pub fn handle(&self) -> StreamerHandle {
        StreamerHandle {
            commands: self.commands_tx.clone(),
            shutdown: self.shutdown.clone(),
            state: Arc::clone(&self.state),
        }
    }

    /// Get the shutdown signal, e.g. to wire into an interrupt handler.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Register a handler for symbols of a stream kind.
    ///
    /// Use [`StreamerHandle::register`] once the loop is running.
    pub fn register<I, S>(
        &mut self,
        kind: StreamKind,
        symbols: I,
        handler: impl MessageHandler,
    ) -> Result<(), StreamerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registry.register(kind, symbols, Arc::new(handler))
    }

    /// Register an order book handler.
    pub fn subscribe_orderbook<I, S>(
        &mut self,
        symbols: I,
        handler: impl MessageHandler,
    ) -> Result<(), StreamerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.register(StreamKind::OrderBook, symbols, handler)
    }

    /// Register a trade handler.
    pub fn subscribe_trades<I, S>(
        &mut self,
        symbols: I,
        handler: impl MessageHandler,
    ) -> Result<(), StreamerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.register(StreamKind::Trade, symbols, handler)
    }

    /// Run the loop until stopped or until retries are exhausted.
    ///
    /// Returns `Ok(())` after a requested stop and
    /// [`StreamerError::MaxRetriesExceeded`] after too many consecutive
    /// transport failures. Transport failures below that limit are logged
    /// and retried, never returned.
    pub async fn run(&mut self) -> Result<(), StreamerError> {
        if !self.wait_for_subscriptions().await {
            tracing::info!("Shutdown requested before any subscription, not connecting");
            self.set_state(LoopState::Stopped);
            return Ok(());
        }

        let mut retries = RetryCounter::from_config(&self.config);

        loop {
            self.set_state(LoopState::Connecting);

            // Dropping an unfinished handshake drops its socket.
            let established = tokio::select! {
                biased;
                _ = self.shutdown.stopped() => {
                    tracing::info!("Shutdown requested while connecting, abandoning handshake");
                    self.set_state(LoopState::Stopped);
                    return Ok(());
                }
                established = ConnectionSession::establish(
                    &self.url,
                    self.credentials.get_credentials(),
                    &self.registry,
                    &self.config,
                ) => established,
            };

            let result = match established {
                Ok(mut session) => {
                    retries.reset();
                    session.mark_streaming();
                    self.set_state(LoopState::Streaming);
                    tracing::info!("Started streaming");

                    let result = self.consume(&mut session).await;
                    session.close().await;
                    result
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {}
                Err(e) if e.is_transport() => {
                    self.set_state(LoopState::Reconnecting);
                    match retries.record_failure() {
                        RetryDecision::Exhausted { attempts } => {
                            tracing::error!(
                                attempts,
                                error = %e,
                                "Max retries exceeded, shutting down the websocket"
                            );
                            self.set_state(LoopState::Failed);
                            return Err(StreamerError::MaxRetriesExceeded { attempts });
                        }
                        RetryDecision::Backoff(delay) => {
                            tracing::warn!(
                                attempt = retries.failures(),
                                ?delay,
                                error = %e,
                                "Websocket error, restarting connection after backoff"
                            );
                            tokio::select! {
                                _ = tokio::time::sleep(delay) => {}
                                _ = self.shutdown.stopped() => {}
                            }
                        }
                        RetryDecision::Immediate => {
                            tracing::warn!(
                                attempt = retries.failures(),
                                error = %e,
                                "Websocket error, restarting connection"
                            );
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Unrecoverable streamer error");
                    self.set_state(LoopState::Failed);
                    return Err(e);
                }
            }

            if self.shutdown.is_stop_requested() {
                tracing::info!("Websocket has been gracefully shut down");
                self.set_state(LoopState::Stopped);
                return Ok(());
            }

            tokio::time::sleep(self.config.loop_yield).await;
        }
    }

    /// Run the loop, stopping it cleanly on Ctrl-C.
    pub async fn run_until_ctrl_c(&mut self) -> Result<(), StreamerError> {
        let signal = self.shutdown_signal();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, proceeding to shut down the socket");
                signal.request_stop();
            }
        });

        let result = self.run().await;
        watcher.abort();
        result
    }

    /// Block until something is registered. Returns `false` on stop.
    async fn wait_for_subscriptions(&mut self) -> bool {
        self.set_state(LoopState::WaitingForSubscriptions);

        loop {
            if self.shutdown.is_stop_requested() {
                return false;
            }
            while let Ok(command) = self.commands_rx.try_recv() {
                self.apply(command);
            }
            if !self.registry.is_empty() {
                return true;
            }

            tokio::select! {
                _ = self.shutdown.stopped() => {}
                _ = tokio::time::sleep(self.config.subscription_poll_interval) => {}
            }
        }
    }

    /// Receive and dispatch until stopped or the transport fails.
    async fn consume(&mut self, session: &mut ConnectionSession) -> Result<(), StreamerError> {
        loop {
            if self.shutdown.is_stop_requested() {
                return Ok(());
            }

            tokio::select! {
                biased;
                _ = self.shutdown.stopped() => return Ok(()),
                Some(command) = self.commands_rx.recv() => {
                    let kind = self.apply(command);
                    session.subscribe_kind(&self.registry, kind).await?;
                }
                message = session.recv() => {
                    let text = message?;
                    self.registry.dispatch(&text).await;
                }
            }
        }
    }

    fn apply(&mut self, command: Command) -> StreamKind {
        match command {
            Command::Register {
                kind,
                symbols,
                handler,
            } => {
                tracing::debug!(%kind, ?symbols, "Registering subscription");
                self.registry.insert(kind, symbols, handler);
                kind
            }
        }
    }

    fn set_state(&self, state: LoopState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = ?previous, to = ?state, "Streamer state changed");
        }
    }
}

/// Cloneable handle to a [`Streamer`], usable from any task.
#[derive(Clone)]
pub struct StreamerHandle {
    commands: mpsc::UnboundedSender<Command>,
    shutdown: ShutdownSignal,
    state: Arc<watch::Sender<LoopState>>,
}

impl std::fmt::Debug for StreamerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamerHandle")
            .field("state", &*self.state.borrow())
            .field("stop_requested", &self.shutdown.is_stop_requested())
            .finish()
    }
}

impl StreamerHandle {
    /// Register a handler for symbols of a stream kind.
    ///
    /// Symbols are validated here. If the loop is streaming, it re-sends the
    /// subscribe request for `kind` without reconnecting.
    pub fn register<I, S>(
        &self,
        kind: StreamKind,
        symbols: I,
        handler: impl MessageHandler,
    ) -> Result<(), StreamerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let symbols = SubscriptionRegistry::validate_symbols(symbols)?;
        if self.state().is_terminal() {
            return Err(StreamerError::ClientClosed);
        }

        self.commands
            .send(Command::Register {
                kind,
                symbols,
                handler: Arc::new(handler),
            })
            .map_err(|_| StreamerError::ClientClosed)
    }

    /// Register an order book handler.
    pub fn subscribe_orderbook<I, S>(
        &self,
        symbols: I,
        handler: impl MessageHandler,
    ) -> Result<(), StreamerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.register(StreamKind::OrderBook, symbols, handler)
    }

    /// Register a trade handler.
    pub fn subscribe_trades<I, S>(
        &self,
        symbols: I,
        handler: impl MessageHandler,
    ) -> Result<(), StreamerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.register(StreamKind::Trade, symbols, handler)
    }

    /// Ask the loop to stop.
    pub fn stop(&self) {
        self.shutdown.request_stop();
    }

    /// Current loop state.
    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Wait until the loop enters `target`.
    pub async fn wait_for_state(&self, target: LoopState) {
        let mut rx = self.state.subscribe();
        // The handle holds the sender, so the channel cannot close under us.
        let _ = rx.wait_for(|state| *state == target).await;
    }

    /// Get the shutdown signal.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }
}
