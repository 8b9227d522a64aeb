//! Symbol -> source -> last price

use dashmap::DashMap;
use std::collections::HashMap;

use crate::exchanges::{Source, Symbol};

/// Full price map as broadcast to observers
pub type PriceMap = HashMap<Symbol, HashMap<Source, f64>>;

/// Last-known price per (symbol, source).
///
/// Each symbol is its own dashmap entry, so updates to one symbol are
/// serialized while different symbols proceed in parallel. Writes are
/// last-write-wins regardless of the event timestamp, and entries are never
/// evicted.
#[derive(Debug, Default)]
pub struct PriceStore {
    prices: DashMap<Symbol, HashMap<Source, f64>>,
}

impl PriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert one price and return a copy of the symbol's source map taken
    /// under the same lock
    pub fn update(&self, symbol: &Symbol, source: Source, price: f64) -> HashMap<Source, f64> {
        let mut entry = self.prices.entry(symbol.clone()).or_default();
        entry.insert(source, price);
        entry.value().clone()
    }

    pub fn snapshot(&self, symbol: &Symbol) -> Option<HashMap<Source, f64>> {
        self.prices.get(symbol).map(|entry| entry.value().clone())
    }

    pub fn price(&self, symbol: &Symbol, source: Source) -> Option<f64> {
        self.prices.get(symbol)?.get(&source).copied()
    }

    pub fn full_snapshot(&self) -> PriceMap {
        self.prices
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn symbol_count(&self) -> usize {
        self.prices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_last_write_wins() {
        let store = PriceStore::new();
        let btc = Symbol::new("BTCUSDT");
        store.update(&btc, Source::BinanceFutures, 45000.0);
        store.update(&btc, Source::BinanceFutures, 44990.0);
        let snapshot = store.update(&btc, Source::OkxFutures, 45010.0);

        assert_eq!(snapshot.len(), 2);
        assert_eq!(store.price(&btc, Source::BinanceFutures), Some(44990.0));
        assert_eq!(store.price(&btc, Source::OkxFutures), Some(45010.0));
    }

    #[test]
    fn test_returned_snapshot_is_detached() {
        let store = PriceStore::new();
        let btc = Symbol::new("BTCUSDT");
        let before = store.update(&btc, Source::BinanceSpot, 1.0);
        store.update(&btc, Source::BybitSpot, 2.0);
        assert_eq!(before.len(), 1);
        assert_eq!(store.snapshot(&btc).map(|m| m.len()), Some(2));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_interleaved_symbols_keep_latest_per_source() {
        let store = Arc::new(PriceStore::new());
        let symbols = ["BTCUSDT", "ETHUSDT", "SOLUSDT"];
        let mut handles = Vec::new();
        for (i, source) in [Source::BinanceFutures, Source::BybitFutures, Source::GateFutures]
            .into_iter()
            .enumerate()
        {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for step in 1..=500u32 {
                    for symbol in symbols {
                        let price = f64::from(step) + i as f64 * 1000.0;
                        store.update(&Symbol::new(symbol), source, price);
                    }
                    if step % 50 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.symbol_count(), 3);
        for symbol in symbols {
            let prices = store.snapshot(&Symbol::new(symbol)).unwrap();
            assert_eq!(prices[&Source::BinanceFutures], 500.0);
            assert_eq!(prices[&Source::BybitFutures], 1500.0);
            assert_eq!(prices[&Source::GateFutures], 2500.0);
        }
    }
}
