//! Observer endpoint and read-only HTTP API
//!
//! `/ws` streams `prices`, `spreads` and `arbitrage` messages to every
//! connected observer. The JSON routes expose the live price map and the
//! connector status board; everything else is served from the static
//! directory.

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use warp::ws::{Message, WebSocket};
use warp::{Filter, Rejection, Reply};

use crate::aggregation::PriceStore;
use crate::broadcast::ObserverRegistry;
use crate::exchanges::SourceStatusBoard;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub static_dir: PathBuf,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8082,
            static_dir: PathBuf::from("./static"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind observer endpoint on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: warp::Error,
    },
}

/// Shared state handed to every route
#[derive(Clone)]
pub struct ServerState {
    pub registry: Arc<ObserverRegistry>,
    pub store: Arc<PriceStore>,
    pub board: Arc<SourceStatusBoard>,
}

pub struct ObserverServer {
    config: ServerConfig,
    state: ServerState,
}

impl ObserverServer {
    pub fn new(config: ServerConfig, state: ServerState) -> Self {
        Self { config, state }
    }

    pub fn routes(&self) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
        routes(self.state.clone(), self.config.static_dir.clone())
    }

    /// Bind the listener; the returned future serves until the process exits.
    ///
    /// Port 0 binds an ephemeral port, reported in the returned address.
    pub fn bind(self) -> Result<(SocketAddr, impl Future<Output = ()>), ServerError> {
        let addr = self.config.socket_addr();
        let routes = self.routes();
        let (bound, server) = warp::serve(routes)
            .try_bind_ephemeral(addr)
            .map_err(|source| ServerError::Bind { addr, source })?;
        info!("🌐 Observer endpoint listening on ws://{}/ws", bound);
        Ok((bound, server))
    }

    pub async fn run(self) -> Result<(), ServerError> {
        let (_, server) = self.bind()?;
        server.await;
        Ok(())
    }
}

pub fn routes(
    state: ServerState,
    static_dir: PathBuf,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let observers = warp::path("ws")
        .and(warp::path::end())
        .and(warp::ws())
        .and(with_state(state.clone()))
        .map(|ws: warp::ws::Ws, state: ServerState| {
            ws.on_upgrade(move |socket| observer_session(socket, state.registry))
        });

    let health = warp::path("health")
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: ServerState| {
            warp::reply::json(&json!({
                "status": "ok",
                "observers": state.registry.len(),
                "symbols": state.store.symbol_count(),
                "timestamp": chrono::Utc::now()
            }))
        });

    let sources = warp::path!("api" / "v1" / "sources")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_sources);

    let prices = warp::path!("api" / "v1" / "prices")
        .and(warp::get())
        .and(with_state(state))
        .and_then(get_prices);

    let assets = warp::get().and(warp::fs::dir(static_dir));

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "OPTIONS"]);

    observers
        .or(health)
        .or(sources)
        .or(prices)
        .or(assets)
        .with(cors)
        .recover(handle_rejection)
}

fn with_state(state: ServerState) -> impl Filter<Extract = (ServerState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

async fn get_sources(state: ServerState) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&state.board.snapshot()))
}

async fn get_prices(state: ServerState) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&state.store.full_snapshot()))
}

/// One observer connection.
///
/// A writer task drains the observer's outbound queue and is the only writer
/// on the socket. This task reads inbound frames solely to notice the close.
async fn observer_session(socket: WebSocket, registry: Arc<ObserverRegistry>) {
    let (mut outgoing, mut incoming) = socket.split();
    let (id, mut outbound) = registry.register();
    info!("👀 Observer {} connected ({} live)", id, registry.len());

    let writer_registry = registry.clone();
    let writer_id = id.clone();
    let writer = tokio::spawn(async move {
        while let Some(payload) = outbound.recv().await {
            if let Err(e) = outgoing.send(Message::text(payload.as_ref())).await {
                debug!("Write to observer {} failed: {}", writer_id, e);
                writer_registry.remove(&writer_id);
                break;
            }
        }
        let _ = outgoing.close().await;
    });

    while let Some(frame) = incoming.next().await {
        match frame {
            Ok(message) if message.is_close() => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Observer {} read error: {}", id, e);
                break;
            }
        }
    }

    registry.remove(&id);
    writer.abort();
    info!("Observer {} disconnected ({} live)", id, registry.len());
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = warp::http::StatusCode::NOT_FOUND;
        message = "Not found";
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = warp::http::StatusCode::METHOD_NOT_ALLOWED;
        message = "Method not allowed";
    } else {
        tracing::error!("Unhandled rejection: {:?}", err);
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal server error";
    }

    let json = warp::reply::json(&json!({
        "error": message,
        "code": code.as_u16()
    }));

    Ok(warp::reply::with_status(json, code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{Broadcaster, ObserverMessage};
    use crate::exchanges::{ConnectionStatus, Source, Symbol};
    use std::time::Duration;

    fn state() -> ServerState {
        ServerState {
            registry: Arc::new(ObserverRegistry::new(16)),
            store: Arc::new(PriceStore::new()),
            board: Arc::new(SourceStatusBoard::new()),
        }
    }

    fn missing_dir() -> PathBuf {
        PathBuf::from("./no-such-static-dir")
    }

    #[tokio::test]
    async fn test_health_reports_counts() {
        let state = state();
        state.store.update(&Symbol::new("BTCUSDT"), Source::OkxFutures, 1.0);
        let filter = routes(state, missing_dir());

        let response = warp::test::request().path("/health").reply(&filter).await;
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["observers"], 0);
        assert_eq!(body["symbols"], 1);
    }

    #[tokio::test]
    async fn test_prices_and_sources_endpoints() {
        let state = state();
        state.store.update(&Symbol::new("ETHUSDT"), Source::BybitSpot, 3000.0);
        state.board.register(Source::BybitSpot);
        state.board.set_status(Source::BybitSpot, ConnectionStatus::Streaming);
        let filter = routes(state, missing_dir());

        let response = warp::test::request().path("/api/v1/prices").reply(&filter).await;
        let prices: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(prices["ETHUSDT"]["bybit_spot"], 3000.0);

        let response = warp::test::request().path("/api/v1/sources").reply(&filter).await;
        let sources: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(sources[0]["source"], "bybit_spot");
        assert_eq!(sources[0]["status"], "streaming");
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let filter = routes(state(), missing_dir());
        let response = warp::test::request().path("/nope").reply(&filter).await;
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_observer_receives_broadcast_and_leaves_registry_on_close() {
        let state = state();
        let registry = state.registry.clone();
        let broadcaster = Broadcaster::new(registry.clone());
        let filter = routes(state.clone(), missing_dir());

        let mut client = warp::test::ws().path("/ws").handshake(filter).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while registry.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        state.store.update(&Symbol::new("BTCUSDT"), Source::Pyth, 65000.0);
        let delivered = broadcaster.publish(&ObserverMessage::Prices {
            prices: state.store.full_snapshot(),
        });
        assert_eq!(delivered, 1);

        let message = client.recv().await.unwrap();
        let body: serde_json::Value = serde_json::from_str(message.to_str().unwrap()).unwrap();
        assert_eq!(body["type"], "prices");
        assert_eq!(body["prices"]["BTCUSDT"]["pyth"], 65000.0);

        client.send(Message::close()).await;
        tokio::time::timeout(Duration::from_secs(5), async {
            while !registry.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }
}
