//! Store update followed by detection and spread broadcast

use std::sync::Arc;
use tracing::{debug, info};

use super::store::PriceStore;
use crate::arbitrage::{ArbitrageDetector, Opportunity, SpreadMatrix};
use crate::broadcast::{Broadcaster, ObserverMessage};
use crate::exchanges::{BookTop, Source, Symbol, Tick};

/// What a single price observation caused downstream
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// Price was not finite or not positive
    Rejected,
    /// Stored, but the symbol has a single source so nothing was compared
    Stored,
    /// Stored and the spread matrix was broadcast
    Compared { opportunity: Option<Opportunity> },
}

pub struct PriceAggregator {
    store: Arc<PriceStore>,
    detector: ArbitrageDetector,
    broadcaster: Arc<Broadcaster>,
}

impl PriceAggregator {
    pub fn new(store: Arc<PriceStore>, detector: ArbitrageDetector, broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            store,
            detector,
            broadcaster,
        }
    }

    pub fn store(&self) -> &Arc<PriceStore> {
        &self.store
    }

    pub fn apply(&self, tick: &Tick) -> UpdateOutcome {
        self.update(&tick.symbol, tick.source, tick.price, tick.timestamp)
    }

    /// Book tops enter the same path as trades, priced at the midpoint
    pub fn apply_book(&self, book: &BookTop) -> UpdateOutcome {
        self.apply(&book.to_tick())
    }

    /// Upsert, then detect and broadcast from a copy of the symbol's prices.
    ///
    /// The store lock is held only for the upsert and copy; detection and
    /// observer fan-out run on the copy.
    pub fn update(&self, symbol: &Symbol, source: Source, price: f64, timestamp: i64) -> UpdateOutcome {
        if !price.is_finite() || price <= 0.0 {
            debug!("Dropping invalid price {} from {} for {}", price, source, symbol);
            return UpdateOutcome::Rejected;
        }

        let prices = self.store.update(symbol, source, price);
        if prices.len() < 2 {
            return UpdateOutcome::Stored;
        }

        let opportunity = self.detector.check(symbol, &prices);
        if let Some(found) = &opportunity {
            info!(
                "💰 {} buy {} @ {:.4} sell {} @ {:.4} ({:.4}%) [event ts {}]",
                found.symbol,
                found.buy_source,
                found.buy_price,
                found.sell_source,
                found.sell_price,
                found.profit_pct,
                timestamp
            );
            self.broadcaster.publish(&ObserverMessage::Arbitrage {
                opportunity: found.clone(),
            });
        }

        self.broadcaster
            .publish(&ObserverMessage::Spreads(SpreadMatrix::build(symbol, &prices)));

        UpdateOutcome::Compared { opportunity }
    }
}
