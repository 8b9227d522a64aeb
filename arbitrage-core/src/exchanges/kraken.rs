//! Kraken futures trade feed connector

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::connector::{Endpoint, SourceConnector, Subscription};
use super::errors::{ExchangeError, ExchangeResult};
use super::types::{now_ms, MarketEvent, Source, Symbol, Tick, Trade};
use crate::market_data::normalizers::{check_price, float_millis, format_quantity, parse_side};
use crate::market_data::{SymbolFormat, SymbolMapper};

const KRAKEN_FUTURES_URL: &str = "wss://futures.kraken.com/ws/v1";

/// Inverse perpetuals quoted against USD
const KRAKEN_PRODUCTS: &[(&str, &str)] = &[("BTCUSDT", "PI_XBTUSD"), ("ETHUSDT", "PI_ETHUSD")];

#[derive(Debug, Deserialize)]
struct KrakenFrame {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    feed: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    trades: Vec<KrakenTrade>,
}

#[derive(Debug, Deserialize)]
struct KrakenTrade {
    product_id: String,
    price: f64,
    qty: f64,
    side: String,
    /// Milliseconds
    time: f64,
}

pub struct KrakenConnector {
    symbols: SymbolMapper,
}

impl KrakenConnector {
    pub fn new(symbols: &[Symbol]) -> Self {
        Self {
            symbols: SymbolMapper::build(symbols, SymbolFormat::Explicit(KRAKEN_PRODUCTS)),
        }
    }

    /// Every trade yields a price tick; the trade itself only with a known side
    fn trade_events(&self, trade: KrakenTrade, events: &mut Vec<MarketEvent>) -> ExchangeResult<()> {
        let Some(symbol) = self.symbols.to_canonical(&trade.product_id) else {
            return Ok(());
        };
        let price = check_price(trade.price)?;
        let timestamp = float_millis(trade.time).unwrap_or_else(now_ms);
        events.push(MarketEvent::Tick(Tick {
            symbol: symbol.clone(),
            source: Source::KrakenFutures,
            price,
            timestamp,
        }));
        if let Some(side) = parse_side(&trade.side) {
            events.push(MarketEvent::Trade(Trade {
                symbol: symbol.clone(),
                source: Source::KrakenFutures,
                price,
                quantity: format_quantity(trade.qty),
                side,
                timestamp,
            }));
        }
        Ok(())
    }
}

impl SourceConnector for KrakenConnector {
    fn source(&self) -> Source {
        Source::KrakenFutures
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint::websocket(KRAKEN_FUTURES_URL)
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        self.symbols
            .venue_symbols()
            .map(|product| {
                Subscription::new(
                    product,
                    json!({ "event": "subscribe", "feed": "trade", "product_ids": [product] }),
                )
            })
            .collect()
    }

    fn decode(&self, payload: &str) -> ExchangeResult<Vec<MarketEvent>> {
        let frame: KrakenFrame = serde_json::from_str(payload)?;

        if let Some(event) = frame.event.as_deref() {
            match event {
                "error" | "alert" => warn!(
                    "kraken_futures {}: {}",
                    event,
                    frame.message.as_deref().unwrap_or("no message")
                ),
                _ => debug!("kraken_futures {} event", event),
            }
            return Ok(Vec::new());
        }

        let mut events = Vec::new();
        match frame.feed.as_deref() {
            Some("trade_snapshot") => {
                for trade in frame.trades {
                    if let Err(e) = self.trade_events(trade, &mut events) {
                        debug!("kraken_futures skipped snapshot trade: {}", e);
                    }
                }
            }
            Some("trade") => {
                let trade: KrakenTrade = serde_json::from_str(payload)?;
                self.trade_events(trade, &mut events)?;
            }
            Some("heartbeat") => {}
            other => {
                return Err(ExchangeError::parse(format!("unexpected feed {:?}", other)));
            }
        }
        Ok(events)
    }
}
