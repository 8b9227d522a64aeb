//! Pyth Hermes oracle prices over server-sent events

use serde::Deserialize;
use tracing::debug;

use super::connector::{Endpoint, SourceConnector};
use super::errors::ExchangeResult;
use super::types::{now_ms, MarketEvent, Source, Symbol, Tick};
use crate::market_data::normalizers::{scaled_price, seconds_to_millis};
use crate::market_data::{SymbolFormat, SymbolMapper};

const HERMES_STREAM_URL: &str = "https://hermes.pyth.network/v2/updates/price/stream";

/// USD price feed ids
const PYTH_FEEDS: &[(&str, &str)] = &[
    ("BTCUSDT", "e62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43"),
    ("ETHUSDT", "ff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace"),
    ("SOLUSDT", "ef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d"),
];

#[derive(Debug, Deserialize)]
struct PriceUpdate {
    #[serde(default)]
    parsed: Vec<ParsedFeed>,
}

#[derive(Debug, Deserialize)]
struct ParsedFeed {
    id: String,
    price: FeedPrice,
}

#[derive(Debug, Deserialize)]
struct FeedPrice {
    price: String,
    expo: i32,
    /// Seconds
    publish_time: i64,
}

pub struct PythConnector {
    feeds: SymbolMapper,
}

impl PythConnector {
    pub fn new(symbols: &[Symbol]) -> Self {
        Self {
            feeds: SymbolMapper::build(symbols, SymbolFormat::Explicit(PYTH_FEEDS)),
        }
    }
}

impl SourceConnector for PythConnector {
    fn source(&self) -> Source {
        Source::Pyth
    }

    fn endpoint(&self) -> Endpoint {
        let ids: Vec<String> = self
            .feeds
            .venue_symbols()
            .map(|id| format!("ids[]={}", id))
            .collect();
        Endpoint::server_sent_events(format!("{}?{}", HERMES_STREAM_URL, ids.join("&")))
    }

    fn decode(&self, payload: &str) -> ExchangeResult<Vec<MarketEvent>> {
        let update: PriceUpdate = serde_json::from_str(payload)?;
        let mut events = Vec::with_capacity(update.parsed.len());
        for feed in update.parsed {
            let id = feed.id.trim_start_matches("0x");
            let Some(symbol) = self.feeds.to_canonical(id) else {
                continue;
            };
            let price = match scaled_price(&feed.price.price, feed.price.expo) {
                Ok(price) => price,
                Err(e) => {
                    debug!("pyth skipped {} update: {}", symbol, e);
                    continue;
                }
            };
            events.push(MarketEvent::Tick(Tick {
                symbol: symbol.clone(),
                source: Source::Pyth,
                price,
                timestamp: seconds_to_millis(feed.price.publish_time).unwrap_or_else(now_ms),
            }));
        }
        Ok(events)
    }
}
