//! Cross-venue arbitrage scanner library
//!
//! Streams trades and order-book tops from many venues, keeps the latest
//! price per (symbol, source), detects divergences between sources and fans
//! prices, spread matrices and opportunities out to connected observers.

pub mod aggregation;
pub mod api;
pub mod arbitrage;
pub mod broadcast;
pub mod exchanges;
pub mod market_data;

// Re-export main types for easy access
pub use aggregation::{
    ingestion_channel, EventSink, PriceAggregator, PriceMap, PriceStore, RouterConfig, TradeSink, TradeTally,
};
pub use api::{ObserverServer, ServerConfig, ServerError, ServerState};
pub use arbitrage::{ArbitrageDetector, DetectorConfig, Opportunity, SpreadMatrix};
pub use broadcast::{BroadcastConfig, Broadcaster, ObserverMessage, ObserverRegistry};
pub use exchanges::{
    connector_for, BackoffPolicy, BookTop, ConnectorRunner, Dialer, ExchangeError, MarketEvent, NetworkDialer,
    ReconnectPolicy, Side, Source, SourceConnector, SourceStatusBoard, Symbol, Tick, Trade,
};

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Everything needed to wire a scanner
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub symbols: Vec<Symbol>,
    pub sources: Vec<Source>,
    pub router: RouterConfig,
    pub detector: DetectorConfig,
    pub broadcast: BroadcastConfig,
    pub reconnect: ReconnectPolicy,
    pub server: ServerConfig,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            symbols: ["BTCUSDT", "ETHUSDT", "XRPUSDT", "SOLUSDT"]
                .into_iter()
                .map(Symbol::new)
                .collect(),
            sources: Source::DEFAULT_ENABLED.to_vec(),
            router: RouterConfig::default(),
            detector: DetectorConfig::default(),
            broadcast: BroadcastConfig::default(),
            reconnect: ReconnectPolicy::default(),
            server: ServerConfig::default(),
        }
    }
}

/// Owns the shared state and spawns every long-running task
pub struct ArbitrageScanner {
    config: ScannerConfig,
    store: Arc<PriceStore>,
    registry: Arc<ObserverRegistry>,
    broadcaster: Arc<Broadcaster>,
    board: Arc<SourceStatusBoard>,
    trades: Arc<TradeTally>,
}

impl ArbitrageScanner {
    pub fn new(config: ScannerConfig) -> Self {
        let registry = Arc::new(ObserverRegistry::new(config.broadcast.observer_queue_capacity));
        Self {
            store: Arc::new(PriceStore::new()),
            broadcaster: Arc::new(Broadcaster::new(registry.clone())),
            registry,
            board: Arc::new(SourceStatusBoard::new()),
            trades: Arc::new(TradeTally::new()),
            config,
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<PriceStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ObserverRegistry> {
        &self.registry
    }

    pub fn status_board(&self) -> &Arc<SourceStatusBoard> {
        &self.board
    }

    pub fn trades(&self) -> &Arc<TradeTally> {
        &self.trades
    }

    /// Create the ingestion queues, their consumers and the snapshot timer.
    ///
    /// Returns the producer half for connector runners.
    pub fn start_pipeline(&self) -> (EventSink, Vec<JoinHandle<()>>) {
        let (sink, queues) = ingestion_channel(&self.config.router);
        let aggregator = Arc::new(PriceAggregator::new(
            self.store.clone(),
            ArbitrageDetector::new(self.config.detector.clone()),
            self.broadcaster.clone(),
        ));

        let mut handles = queues.spawn_consumers(aggregator, self.trades.clone());
        handles.push(
            self.broadcaster
                .clone()
                .spawn_snapshot_loop(self.store.clone(), self.config.broadcast.snapshot_interval),
        );
        (sink, handles)
    }

    /// One supervised runner per enabled source
    pub fn spawn_connectors(&self, sink: &EventSink, dialer: Arc<dyn Dialer>) -> Vec<JoinHandle<()>> {
        self.config
            .sources
            .iter()
            .map(|&source| {
                let connector = connector_for(source, &self.config.symbols);
                ConnectorRunner::new(
                    connector,
                    dialer.clone(),
                    sink.clone(),
                    self.config.reconnect.clone(),
                    self.board.clone(),
                )
                .spawn()
            })
            .collect()
    }

    pub fn server(&self) -> ObserverServer {
        ObserverServer::new(
            self.config.server.clone(),
            ServerState {
                registry: self.registry.clone(),
                store: self.store.clone(),
                board: self.board.clone(),
            },
        )
    }

    /// Start everything and serve observers until the process exits.
    ///
    /// Binding the observer endpoint is the only failure that returns.
    pub async fn run(self, dialer: Arc<dyn Dialer>) -> Result<(), ServerError> {
        let (bound, server) = self.server().bind()?;
        let (sink, _pipeline) = self.start_pipeline();
        let _connectors = self.spawn_connectors(&sink, dialer);
        drop(sink);

        info!(
            "🚀 Scanning {} symbols across {} sources, observers on {}",
            self.config.symbols.len(),
            self.config.sources.len(),
            bound
        );
        server.await;
        Ok(())
    }
}
