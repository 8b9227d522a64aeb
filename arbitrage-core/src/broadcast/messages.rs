//! Server-to-observer wire messages

use serde::Serialize;

use crate::aggregation::PriceMap;
use crate::arbitrage::{Opportunity, SpreadMatrix};

/// Tagged by `type`: `prices`, `spreads` or `arbitrage`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObserverMessage {
    /// Full symbol -> source -> price map
    Prices { prices: PriceMap },
    Spreads(SpreadMatrix),
    Arbitrage { opportunity: Opportunity },
}

impl ObserverMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ObserverMessage::Prices { .. } => "prices",
            ObserverMessage::Spreads(_) => "spreads",
            ObserverMessage::Arbitrage { .. } => "arbitrage",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchanges::{Source, Symbol};
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_prices_message_shape() {
        let mut prices = PriceMap::new();
        prices
            .entry(Symbol::new("BTCUSDT"))
            .or_default()
            .insert(Source::BinanceFutures, 45000.0);
        let value = serde_json::to_value(ObserverMessage::Prices { prices }).unwrap();
        assert_eq!(
            value,
            json!({"type": "prices", "prices": {"BTCUSDT": {"binance_futures": 45000.0}}})
        );
    }

    #[test]
    fn test_spreads_message_is_flattened() {
        let prices: HashMap<Source, f64> =
            [(Source::BinanceSpot, 100.0), (Source::BybitSpot, 110.0)].into_iter().collect();
        let matrix = SpreadMatrix::build(&Symbol::new("ETHUSDT"), &prices);
        let value = serde_json::to_value(ObserverMessage::Spreads(matrix)).unwrap();
        assert_eq!(value["type"], "spreads");
        assert_eq!(value["symbol"], "ETHUSDT");
        assert_eq!(value["prices"]["bybit_spot"], 110.0);
        assert!(value["spreads"]["binance_spot"]["bybit_spot"].is_number());
    }

    #[test]
    fn test_arbitrage_message_shape() {
        let opportunity = Opportunity {
            symbol: Symbol::new("BTCUSDT"),
            buy_source: Source::OkxFutures,
            sell_source: Source::GateFutures,
            buy_price: 45000.0,
            sell_price: 45100.0,
            profit_pct: 0.2222,
            timestamp: 1_700_000_000_000,
        };
        let value = serde_json::to_value(ObserverMessage::Arbitrage { opportunity }).unwrap();
        assert_eq!(value["type"], "arbitrage");
        assert_eq!(value["opportunity"]["buy_source"], "okx_futures");
        assert_eq!(value["opportunity"]["sell_source"], "gate_futures");
        assert_eq!(value["opportunity"]["timestamp"], 1_700_000_000_000i64);
    }
}
