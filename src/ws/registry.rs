//! Subscription registry and message dispatch.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use indexmap::IndexMap;

use crate::error::StreamerError;
use crate::ws::messages::{FeedMessage, StreamKind, SubscribeRequest};

/// An asynchronous message handler.
///
/// Accepts one message, may suspend, returns nothing. Any
/// `Fn(FeedMessage) -> impl Future<Output = ()>` closure qualifies, so a
/// handler that cannot run under the async runtime is rejected at compile
/// time rather than at registration.
pub trait MessageHandler: Send + Sync + 'static {
    /// Handle one inbound message.
    fn handle(&self, message: FeedMessage) -> BoxFuture<'static, ()>;
}

impl<F, Fut> MessageHandler for F
where
    F: Fn(FeedMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn handle(&self, message: FeedMessage) -> BoxFuture<'static, ()> {
        Box::pin(self(message))
    }
}

/// A registered handler, shareable across registrations.
pub type SharedHandler = Arc<dyn MessageHandler>;

type HandlerTable = IndexMap<String, SharedHandler>;

/// Symbol that matches any symbol of its kind without a handler of its own.
///
/// Routing only: it is never sent in a subscribe request.
pub const WILDCARD: &str = "*";

/// Symbol to handler mappings, one table per stream kind.
///
/// Registering a symbol twice keeps its original position and replaces
/// the handler. Table order is the order symbols are sent in subscribe
/// requests.
#[derive(Default)]
pub struct SubscriptionRegistry {
    orderbook: HandlerTable,
    trade: HandlerTable,
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("orderbook", &self.orderbook.keys().collect::<Vec<_>>())
            .field("trade", &self.trade.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a symbol list before it reaches the registry.
    ///
    /// The list must be non-empty and every symbol non-blank. Duplicates
    /// collapse, keeping first-seen order.
    pub fn validate_symbols<I, S>(symbols: I) -> Result<Vec<String>, StreamerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut validated: Vec<String> = Vec::new();
        for symbol in symbols {
            let symbol = symbol.into();
            if symbol.trim().is_empty() {
                return Err(StreamerError::InvalidSubscription(
                    "symbol must not be empty".into(),
                ));
            }
            if !validated.contains(&symbol) {
                validated.push(symbol);
            }
        }

        if validated.is_empty() {
            return Err(StreamerError::InvalidSubscription(
                "at least one symbol is required".into(),
            ));
        }
        Ok(validated)
    }

    /// Register a handler for each symbol of the given kind.
    ///
    /// Validation happens before any insertion, so a rejected call leaves
    /// the registry unchanged.
    pub fn register<I, S>(
        &mut self,
        kind: StreamKind,
        symbols: I,
        handler: SharedHandler,
    ) -> Result<(), StreamerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let symbols = Self::validate_symbols(symbols)?;
        self.insert(kind, symbols, handler);
        Ok(())
    }

    /// Insert already-validated symbols.
    pub(crate) fn insert(&mut self, kind: StreamKind, symbols: Vec<String>, handler: SharedHandler) {
        let table = self.table_mut(kind);
        for symbol in symbols {
            table.insert(symbol, Arc::clone(&handler));
        }
    }

    /// Whether no symbol is registered for any kind.
    pub fn is_empty(&self) -> bool {
        self.orderbook.is_empty() && self.trade.is_empty()
    }

    /// Total number of registered (kind, symbol) pairs.
    pub fn len(&self) -> usize {
        self.orderbook.len() + self.trade.len()
    }

    /// Registered symbols of a kind, in registration order.
    pub fn symbols(&self, kind: StreamKind) -> Vec<String> {
        self.table(kind).keys().cloned().collect()
    }

    /// Handler registered for a (kind, symbol) pair.
    pub fn handler(&self, kind: StreamKind, symbol: &str) -> Option<&SharedHandler> {
        self.table(kind).get(symbol)
    }

    /// Handler for a symbol, falling back to the [`WILDCARD`] registration.
    pub fn route(&self, kind: StreamKind, symbol: &str) -> Option<&SharedHandler> {
        self.handler(kind, symbol).or_else(|| self.handler(kind, WILDCARD))
    }

    /// Subscribe request for a kind, or `None` if no concrete symbol is
    /// registered for it.
    pub fn subscribe_request(&self, kind: StreamKind, id: u64) -> Option<SubscribeRequest> {
        let symbols: Vec<String> = self
            .table(kind)
            .keys()
            .filter(|symbol| symbol.as_str() != WILDCARD)
            .cloned()
            .collect();
        if symbols.is_empty() {
            return None;
        }
        Some(SubscribeRequest::new(kind, symbols, id))
    }

    /// One subscribe request per kind with at least one symbol.
    pub fn subscribe_requests(&self, id: u64) -> Vec<SubscribeRequest> {
        StreamKind::ALL
            .into_iter()
            .filter_map(|kind| self.subscribe_request(kind, id))
            .collect()
    }

    /// Route one inbound message.
    ///
    /// Every message is recorded. Messages whose payload names a stream
    /// kind and a symbol are then passed to that symbol's handler, or to the
    /// kind's [`WILDCARD`] handler. Returns whether a handler ran.
    pub async fn dispatch(&self, text: &str) -> bool {
        tracing::info!(message = %text, "Received message");

        let message = FeedMessage::parse(text);
        if let Some(error) = message.response_error() {
            tracing::warn!(id = ?message.response_id(), %error, "Request rejected by server");
        }

        let handler = match (message.kind, message.symbol.as_deref()) {
            (Some(kind), Some(symbol)) => self.route(kind, symbol).cloned(),
            _ => None,
        };

        match handler {
            Some(handler) => {
                handler.handle(message).await;
                true
            }
            None => false,
        }
    }

    fn table(&self, kind: StreamKind) -> &HandlerTable {
        match kind {
            StreamKind::OrderBook => &self.orderbook,
            StreamKind::Trade => &self.trade,
        }
    }

    fn table_mut(&mut self, kind: StreamKind) -> &mut HandlerTable {
        match kind {
            StreamKind::OrderBook => &mut self.orderbook,
            StreamKind::Trade => &mut self.trade,
        }
    }
}
