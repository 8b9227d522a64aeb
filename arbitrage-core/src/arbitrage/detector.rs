//! Min/max divergence detection with per-route alert suppression

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::percentage_change;
use crate::exchanges::{now_ms, Source, Symbol};

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Minimum profit, in percent, that raises an alert (strictly greater)
    pub threshold_pct: f64,
    /// Quiet period per (symbol, buy source, sell source) after an alert
    pub suppression_window: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold_pct: 0.05,
            suppression_window: Duration::from_secs(10),
        }
    }
}

/// Buy on the cheapest source, sell on the dearest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub symbol: Symbol,
    pub buy_source: Source,
    pub sell_source: Source,
    pub buy_price: f64,
    pub sell_price: f64,
    pub profit_pct: f64,
    pub timestamp: i64,
}

type RouteKey = (Symbol, Source, Source);

pub struct ArbitrageDetector {
    config: DetectorConfig,
    /// Last alert time per route, ms epoch; never evicted
    last_alert: DashMap<RouteKey, i64>,
}

impl ArbitrageDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            last_alert: DashMap::new(),
        }
    }

    pub fn check(&self, symbol: &Symbol, prices: &HashMap<Source, f64>) -> Option<Opportunity> {
        self.check_at(symbol, prices, now_ms())
    }

    /// Scan one symbol's prices at time `now` (ms epoch).
    ///
    /// The suppression key is the directional route `(symbol, cheapest,
    /// dearest)`. When two sources swap places the reversed route has its own
    /// marker, so it can alert immediately.
    pub fn check_at(
        &self,
        symbol: &Symbol,
        prices: &HashMap<Source, f64>,
        now: i64,
    ) -> Option<Opportunity> {
        if prices.len() < 2 {
            return None;
        }

        let mut entries = prices.iter().map(|(source, price)| (*source, *price));
        let first = entries.next()?;
        let (mut min, mut max) = (first, first);
        for (source, price) in entries {
            if price < min.1 {
                min = (source, price);
            }
            if price > max.1 {
                max = (source, price);
            }
        }

        let profit_pct = percentage_change(min.1, max.1);
        if profit_pct <= self.config.threshold_pct {
            return None;
        }

        let window = i64::try_from(self.config.suppression_window.as_millis()).unwrap_or(i64::MAX);
        let key = (symbol.clone(), min.0, max.0);
        match self.last_alert.entry(key) {
            Entry::Occupied(mut last) => {
                if now.saturating_sub(*last.get()) <= window {
                    return None;
                }
                last.insert(now);
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
            }
        }

        Some(Opportunity {
            symbol: symbol.clone(),
            buy_source: min.0,
            sell_source: max.0,
            buy_price: min.1,
            sell_price: max.1,
            profit_pct,
            timestamp: now,
        })
    }
}

impl Default for ArbitrageDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}
