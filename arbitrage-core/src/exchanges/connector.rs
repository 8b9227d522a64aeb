//! Source connector trait and endpoint descriptors

use serde::Serialize;

use super::errors::ExchangeResult;
use super::types::{MarketEvent, Source};

/// How a source delivers its stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    WebSocket,
    ServerSentEvents,
}

/// Where and how to open a source's stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub kind: TransportKind,
}

impl Endpoint {
    pub fn websocket(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: TransportKind::WebSocket,
        }
    }

    pub fn server_sent_events(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: TransportKind::ServerSentEvents,
        }
    }
}

/// One subscribe request, sent after the transport opens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// What is being subscribed, used in logs
    pub target: String,
    pub payload: String,
}

impl Subscription {
    pub fn new(target: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            target: target.into(),
            payload: payload.to_string(),
        }
    }
}

/// A venue feed: how to reach it, what to ask for, and how to read it.
///
/// Implementations hold no connection state. The reconnect loop in
/// [`ConnectorRunner`](super::runner::ConnectorRunner) owns the transport and
/// calls back into the connector for every handshake and inbound payload, so
/// each venue is a pure translation layer that can be tested on literal
/// payloads.
pub trait SourceConnector: Send + Sync {
    fn source(&self) -> Source;

    fn endpoint(&self) -> Endpoint;

    /// Subscribe requests to send after every (re)connect, one per symbol
    fn subscriptions(&self) -> Vec<Subscription> {
        Vec::new()
    }

    /// Application-level keep-alive; `None` falls back to a WebSocket ping
    fn heartbeat(&self) -> Option<String> {
        None
    }

    /// Translate one inbound payload into canonical events.
    ///
    /// Acknowledgements and heartbeats decode to an empty vector. A payload
    /// that cannot be understood is an `Err`, which the runner logs and skips.
    fn decode(&self, payload: &str) -> ExchangeResult<Vec<MarketEvent>>;
}
