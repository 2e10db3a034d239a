//! WebSocket message types.
//!
//! Outbound requests share one shape: a `method`, a positional `params`
//! array and a correlation `id`. Inbound messages are kept opaque; the
//! client only peeks at the fields it needs for routing.

use serde::{Deserialize, Serialize};

use crate::auth::AuthPayload;

/// Method name of the authentication request.
pub const AUTH_METHOD: &str = "user.auth";
/// Credential type sent as the first auth parameter.
pub const AUTH_KEY_TYPE: &str = "API";

/// A category of subscribable market data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Order book snapshots and incremental updates.
    #[serde(rename = "orderbook")]
    OrderBook,
    /// Individual trade executions.
    Trade,
}

impl StreamKind {
    /// Every stream kind, in subscription order.
    pub const ALL: [StreamKind; 2] = [StreamKind::OrderBook, StreamKind::Trade];

    /// Wire name of the stream kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::OrderBook => "orderbook",
            StreamKind::Trade => "trade",
        }
    }

    /// Method name of the subscribe request for this kind.
    pub fn subscribe_method(&self) -> String {
        format!("{}.subscribe", self.as_str())
    }

    /// Top-level field that marks an inbound payload as this kind.
    pub fn payload_key(&self) -> &'static str {
        match self {
            StreamKind::OrderBook => "book",
            StreamKind::Trade => "trades",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication request: `["API", api_key, signature, expiry]`.
#[derive(Debug, Clone, Serialize)]
pub struct AuthRequest {
    /// Method name (always "user.auth").
    pub method: &'static str,
    /// Positional parameters.
    pub params: (&'static str, String, String, i64),
    /// Correlation id.
    pub id: u64,
}

impl AuthRequest {
    /// Create an auth request from a signed payload.
    pub fn new(payload: &AuthPayload, id: u64) -> Self {
        Self {
            method: AUTH_METHOD,
            params: (
                AUTH_KEY_TYPE,
                payload.identity.clone(),
                payload.signature.clone(),
                payload.expiry,
            ),
            id,
        }
    }
}

/// Subscribe request for one stream kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribeRequest {
    /// Correlation id.
    pub id: u64,
    /// Method name, e.g. "orderbook.subscribe".
    pub method: String,
    /// Symbols to subscribe to.
    pub params: Vec<String>,
}

impl SubscribeRequest {
    /// Create a subscribe request for the given kind and symbols.
    pub fn new(kind: StreamKind, symbols: Vec<String>, id: u64) -> Self {
        Self {
            id,
            method: kind.subscribe_method(),
            params: symbols,
        }
    }
}

/// An inbound message from the feed.
#[derive(Debug, Clone)]
pub struct FeedMessage {
    /// The raw text as received.
    pub raw: String,
    /// The decoded JSON, if the text was valid JSON.
    pub payload: Option<serde_json::Value>,
    /// Stream kind inferred from the payload shape.
    pub kind: Option<StreamKind>,
    /// Symbol named by the payload.
    pub symbol: Option<String>,
}

impl FeedMessage {
    /// Decode an inbound text frame.
    ///
    /// Never fails: text that is not JSON is kept raw with no routing fields.
    pub fn parse(text: &str) -> Self {
        let payload = match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Failed to parse WebSocket message: {}", e);
                None
            }
        };

        let kind = payload.as_ref().and_then(|value| {
            StreamKind::ALL
                .into_iter()
                .find(|kind| value.get(kind.payload_key()).is_some())
        });
        let symbol = payload
            .as_ref()
            .and_then(|value| value.get("symbol"))
            .and_then(|s| s.as_str())
            .map(String::from);

        Self {
            raw: text.to_string(),
            payload,
            kind,
            symbol,
        }
    }

    /// Correlation id, if this is a response to one of our requests.
    pub fn response_id(&self) -> Option<u64> {
        let value = self.payload.as_ref()?;
        if value.get("result").is_none() && value.get("error").is_none() {
            return None;
        }
        value.get("id").and_then(|id| id.as_u64())
    }

    /// Error object of a response, if it carries a non-null one.
    pub fn response_error(&self) -> Option<&serde_json::Value> {
        self.payload
            .as_ref()
            .and_then(|value| value.get("error"))
            .filter(|error| !error.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credentials;

    #[test]
    fn test_auth_request_wire_format() {
        let credentials = Credentials::new("my_key", "my_secret").unwrap();
        let payload = AuthPayload::with_expiry(&credentials, 1_700_000_120);
        let request = AuthRequest::new(&payload, 1234);

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["method"], "user.auth");
        assert_eq!(value["id"], 1234);
        assert_eq!(
            value["params"],
            serde_json::json!(["API", "my_key", payload.signature, 1_700_000_120])
        );
    }

    #[test]
    fn test_subscribe_request_wire_format() {
        let request = SubscribeRequest::new(
            StreamKind::OrderBook,
            vec!["ETHUSD".into(), "BTCUSD".into()],
            1234,
        );
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(
            json,
            r#"{"id":1234,"method":"orderbook.subscribe","params":["ETHUSD","BTCUSD"]}"#
        );

        let trades = SubscribeRequest::new(StreamKind::Trade, vec!["ETHUSD".into()], 7);
        assert_eq!(trades.method, "trade.subscribe");
    }

    #[test]
    fn test_stream_kind_names() {
        assert_eq!(StreamKind::OrderBook.to_string(), "orderbook");
        assert_eq!(StreamKind::Trade.subscribe_method(), "trade.subscribe");
        assert_eq!(
            serde_json::to_string(&StreamKind::OrderBook).unwrap(),
            r#""orderbook""#
        );
    }

    #[test]
    fn test_parse_orderbook_message() {
        let text = r#"{"book":{"asks":[[87705000,1000000]],"bids":[]},"depth":0,"sequence":1,"symbol":"ETHUSD","type":"incremental"}"#;
        let msg = FeedMessage::parse(text);
        assert_eq!(msg.kind, Some(StreamKind::OrderBook));
        assert_eq!(msg.symbol.as_deref(), Some("ETHUSD"));
        assert_eq!(msg.raw, text);
        assert!(msg.response_id().is_none());
    }

    #[test]
    fn test_parse_trade_message() {
        let msg = FeedMessage::parse(r#"{"trades":[[1,"Buy",100,5]],"symbol":"BTCUSD","type":"snapshot"}"#);
        assert_eq!(msg.kind, Some(StreamKind::Trade));
        assert_eq!(msg.symbol.as_deref(), Some("BTCUSD"));
    }

    #[test]
    fn test_parse_response() {
        let ok = FeedMessage::parse(r#"{"error":null,"id":1234,"result":{"status":"success"}}"#);
        assert_eq!(ok.response_id(), Some(1234));
        assert!(ok.response_error().is_none());
        assert!(ok.kind.is_none());

        let rejected = FeedMessage::parse(
            r#"{"error":{"code":6012,"message":"invalid login token"},"id":1234,"result":null}"#,
        );
        assert_eq!(rejected.response_id(), Some(1234));
        assert!(rejected.response_error().is_some());
    }

    #[test]
    fn test_parse_non_json() {
        let msg = FeedMessage::parse("not json");
        assert!(msg.payload.is_none());
        assert!(msg.kind.is_none());
        assert!(msg.symbol.is_none());
        assert_eq!(msg.raw, "not json");
    }
}
