//! Bounded per-kind event queues between connectors and the aggregator

use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::pipeline::PriceAggregator;
use crate::exchanges::{BookTop, MarketEvent, Source, Symbol, Tick, Trade};

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub tick_capacity: usize,
    pub book_capacity: usize,
    pub trade_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            tick_capacity: 1000,
            book_capacity: 1000,
            trade_capacity: 1000,
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{0} queue closed")]
pub struct QueueClosed(pub &'static str);

/// Producer half shared by every connector runner.
///
/// `send` waits while the target queue is full, so a slow consumer throttles
/// ingestion instead of dropping events.
#[derive(Debug, Clone)]
pub struct EventSink {
    ticks: mpsc::Sender<Tick>,
    books: mpsc::Sender<BookTop>,
    trades: mpsc::Sender<Trade>,
}

impl EventSink {
    pub async fn send(&self, event: MarketEvent) -> Result<(), QueueClosed> {
        match event {
            MarketEvent::Tick(tick) => self.ticks.send(tick).await.map_err(|_| QueueClosed("tick")),
            MarketEvent::Book(book) => self.books.send(book).await.map_err(|_| QueueClosed("book")),
            MarketEvent::Trade(trade) => self.trades.send(trade).await.map_err(|_| QueueClosed("trade")),
        }
    }
}

/// Consumer half
pub struct IngestionQueues {
    pub ticks: mpsc::Receiver<Tick>,
    pub books: mpsc::Receiver<BookTop>,
    pub trades: mpsc::Receiver<Trade>,
}

pub fn ingestion_channel(config: &RouterConfig) -> (EventSink, IngestionQueues) {
    let (tick_tx, tick_rx) = mpsc::channel(config.tick_capacity.max(1));
    let (book_tx, book_rx) = mpsc::channel(config.book_capacity.max(1));
    let (trade_tx, trade_rx) = mpsc::channel(config.trade_capacity.max(1));
    (
        EventSink {
            ticks: tick_tx,
            books: book_tx,
            trades: trade_tx,
        },
        IngestionQueues {
            ticks: tick_rx,
            books: book_rx,
            trades: trade_rx,
        },
    )
}

impl IngestionQueues {
    /// One consumer task per queue; each runs until every sink is dropped
    pub fn spawn_consumers(
        self,
        aggregator: Arc<PriceAggregator>,
        trade_sink: Arc<dyn TradeSink>,
    ) -> Vec<JoinHandle<()>> {
        let IngestionQueues {
            mut ticks,
            mut books,
            mut trades,
        } = self;

        let tick_aggregator = aggregator.clone();
        let tick_consumer = tokio::spawn(async move {
            while let Some(tick) = ticks.recv().await {
                tick_aggregator.apply(&tick);
            }
            info!("Tick queue closed, consumer exiting");
        });

        let book_consumer = tokio::spawn(async move {
            while let Some(book) = books.recv().await {
                aggregator.apply_book(&book);
            }
            info!("Book queue closed, consumer exiting");
        });

        let trade_consumer = tokio::spawn(async move {
            while let Some(trade) = trades.recv().await {
                trade_sink.on_trade(&trade);
            }
            info!("Trade queue closed, consumer exiting");
        });

        vec![tick_consumer, book_consumer, trade_consumer]
    }
}

/// Receives every normalized trade print. Trades do not move prices.
pub trait TradeSink: Send + Sync {
    fn on_trade(&self, trade: &Trade);
}

/// Default trade sink: counts per source and the latest print per
/// (symbol, source)
#[derive(Debug, Default)]
pub struct TradeTally {
    counts: DashMap<Source, u64>,
    last: DashMap<(Symbol, Source), Trade>,
}

impl TradeTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, source: Source) -> u64 {
        self.counts.get(&source).map(|c| *c).unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|c| *c.value()).sum()
    }

    pub fn last_trade(&self, symbol: &Symbol, source: Source) -> Option<Trade> {
        self.last
            .get(&(symbol.clone(), source))
            .map(|trade| trade.value().clone())
    }
}

impl TradeSink for TradeTally {
    fn on_trade(&self, trade: &Trade) {
        *self.counts.entry(trade.source).or_insert(0) += 1;
        self.last
            .insert((trade.symbol.clone(), trade.source), trade.clone());
        debug!(
            "{} {} {} {} @ {}",
            trade.source, trade.symbol, trade.side, trade.quantity, trade.price
        );
    }
}
