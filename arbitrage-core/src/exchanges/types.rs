//! Canonical market data types shared by every source connector

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Milliseconds since the Unix epoch, local clock
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Venue-agnostic trading symbol (base + quote, e.g. `BTCUSDT`)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl Symbol {
    /// Quote assets recognised when splitting a canonical symbol, longest first
    const QUOTES: [&'static str; 3] = ["USDT", "USDC", "USD"];

    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn validate(&self) -> bool {
        !self.0.is_empty() && self.0.chars().all(|c| c.is_ascii_alphanumeric())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into `(base, quote)` using the known quote assets
    pub fn split_quote(&self) -> Option<(&str, &str)> {
        Self::QUOTES.iter().find_map(|quote| {
            self.0
                .strip_suffix(quote)
                .filter(|base| !base.is_empty())
                .map(|base| (base, *quote))
        })
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trade side after per-venue normalisation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Price source identifier, one per venue feed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    BinanceFutures,
    BinanceSpot,
    BybitFutures,
    BybitSpot,
    OkxFutures,
    GateFutures,
    KrakenFutures,
    DeribitFutures,
    HyperliquidFutures,
    ParadexFutures,
    Pyth,
}

impl Source {
    pub const ALL: [Source; 11] = [
        Source::BinanceFutures,
        Source::BinanceSpot,
        Source::BybitFutures,
        Source::BybitSpot,
        Source::OkxFutures,
        Source::GateFutures,
        Source::KrakenFutures,
        Source::DeribitFutures,
        Source::HyperliquidFutures,
        Source::ParadexFutures,
        Source::Pyth,
    ];

    /// Sources started when no explicit selection is configured
    pub const DEFAULT_ENABLED: [Source; 9] = [
        Source::BinanceFutures,
        Source::BybitFutures,
        Source::HyperliquidFutures,
        Source::KrakenFutures,
        Source::OkxFutures,
        Source::GateFutures,
        Source::ParadexFutures,
        Source::BinanceSpot,
        Source::BybitSpot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::BinanceFutures => "binance_futures",
            Source::BinanceSpot => "binance_spot",
            Source::BybitFutures => "bybit_futures",
            Source::BybitSpot => "bybit_spot",
            Source::OkxFutures => "okx_futures",
            Source::GateFutures => "gate_futures",
            Source::KrakenFutures => "kraken_futures",
            Source::DeribitFutures => "deribit_futures",
            Source::HyperliquidFutures => "hyperliquid_futures",
            Source::ParadexFutures => "paradex_futures",
            Source::Pyth => "pyth",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown source id: {0}")]
pub struct UnknownSource(pub String);

impl FromStr for Source {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Source::ALL
            .iter()
            .copied()
            .find(|source| source.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownSource(wanted.to_string()))
    }
}

/// A single normalised price observation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: Symbol,
    pub source: Source,
    pub price: f64,
    pub timestamp: i64,
}

/// A trade print; quantity keeps the venue's decimal string
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: Symbol,
    pub source: Source,
    pub price: f64,
    pub quantity: String,
    pub side: Side,
    pub timestamp: i64,
}

impl Trade {
    pub fn to_tick(&self) -> Tick {
        Tick {
            symbol: self.symbol.clone(),
            source: self.source,
            price: self.price,
            timestamp: self.timestamp,
        }
    }
}

/// Best bid and ask from a venue order book
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookTop {
    pub symbol: Symbol,
    pub source: Source,
    pub best_bid: f64,
    pub best_ask: f64,
    pub timestamp: i64,
}

impl BookTop {
    pub fn mid(&self) -> f64 {
        (self.best_bid + self.best_ask) / 2.0
    }

    /// Synthetic price observation at the book midpoint
    pub fn to_tick(&self) -> Tick {
        Tick {
            symbol: self.symbol.clone(),
            source: self.source,
            price: self.mid(),
            timestamp: self.timestamp,
        }
    }
}

/// Everything a connector can emit for one inbound venue message
#[derive(Clone, Debug, PartialEq)]
pub enum MarketEvent {
    Tick(Tick),
    Book(BookTop),
    Trade(Trade),
}

impl MarketEvent {
    pub fn symbol(&self) -> &Symbol {
        match self {
            MarketEvent::Tick(tick) => &tick.symbol,
            MarketEvent::Book(book) => &book.symbol,
            MarketEvent::Trade(trade) => &trade.symbol,
        }
    }

    pub fn source(&self) -> Source {
        match self {
            MarketEvent::Tick(tick) => tick.source,
            MarketEvent::Book(book) => book.source,
            MarketEvent::Trade(trade) => trade.source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_ids_round_trip_through_from_str() {
        for source in Source::ALL {
            assert_eq!(source.as_str().parse::<Source>(), Ok(source));
        }
        assert_eq!("OKX_FUTURES".parse::<Source>(), Ok(Source::OkxFutures));
        assert!("coinbase".parse::<Source>().is_err());
    }

    #[test]
    fn test_source_serializes_as_snake_case_id() {
        let json = serde_json::to_string(&Source::HyperliquidFutures).unwrap();
        assert_eq!(json, "\"hyperliquid_futures\"");
    }

    #[test]
    fn test_symbol_split_quote() {
        assert_eq!(Symbol::new("BTCUSDT").split_quote(), Some(("BTC", "USDT")));
        assert_eq!(Symbol::new("ETHUSDC").split_quote(), Some(("ETH", "USDC")));
        assert_eq!(Symbol::new("SOLUSD").split_quote(), Some(("SOL", "USD")));
        assert_eq!(Symbol::new("USDT").split_quote(), None);
    }

    #[test]
    fn test_book_top_mid() {
        let book = BookTop {
            symbol: Symbol::new("BTCUSDT"),
            source: Source::GateFutures,
            best_bid: 100.0,
            best_ask: 101.0,
            timestamp: 1,
        };
        assert_eq!(book.mid(), 100.5);
        assert_eq!(book.to_tick().price, 100.5);
    }
}
