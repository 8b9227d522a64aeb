//! Hyperliquid perpetual trades connector

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::connector::{Endpoint, SourceConnector, Subscription};
use super::errors::{ExchangeError, ExchangeResult};
use super::types::{MarketEvent, Side, Source, Symbol, Tick, Trade};
use crate::market_data::normalizers::parse_price;
use crate::market_data::{SymbolFormat, SymbolMapper};

const HYPERLIQUID_URL: &str = "wss://api.hyperliquid.xyz/ws";

#[derive(Debug, Deserialize)]
struct HyperliquidFrame {
    channel: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TradeBatch {
    Many(Vec<HyperliquidTrade>),
    One(HyperliquidTrade),
}

#[derive(Debug, Deserialize)]
struct HyperliquidTrade {
    coin: String,
    px: String,
    sz: String,
    side: String,
    time: i64,
}

/// Aggressor side: `B` bid (buy), `A` ask (sell)
fn hyperliquid_side(token: &str) -> Option<Side> {
    match token {
        "B" => Some(Side::Buy),
        "A" => Some(Side::Sell),
        _ => None,
    }
}

pub struct HyperliquidConnector {
    symbols: SymbolMapper,
}

impl HyperliquidConnector {
    pub fn new(symbols: &[Symbol]) -> Self {
        Self {
            symbols: SymbolMapper::build(symbols, SymbolFormat::BaseOnly),
        }
    }
}

impl SourceConnector for HyperliquidConnector {
    fn source(&self) -> Source {
        Source::HyperliquidFutures
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint::websocket(HYPERLIQUID_URL)
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        self.symbols
            .venue_symbols()
            .map(|coin| {
                Subscription::new(
                    coin,
                    json!({ "method": "subscribe", "subscription": { "type": "trades", "coin": coin } }),
                )
            })
            .collect()
    }

    fn heartbeat(&self) -> Option<String> {
        Some(json!({ "method": "ping" }).to_string())
    }

    fn decode(&self, payload: &str) -> ExchangeResult<Vec<MarketEvent>> {
        let frame: HyperliquidFrame = serde_json::from_str(payload)?;
        match frame.channel.as_str() {
            "trades" => {}
            "subscriptionResponse" | "pong" => return Ok(Vec::new()),
            other => {
                return Err(ExchangeError::parse(format!("unexpected channel {}", other)));
            }
        }

        let batch: TradeBatch = serde_json::from_value(frame.data)?;
        let trades = match batch {
            TradeBatch::Many(trades) => trades,
            TradeBatch::One(trade) => vec![trade],
        };

        let mut events = Vec::with_capacity(trades.len() * 2);
        for trade in trades {
            let Some(symbol) = self.symbols.to_canonical(&trade.coin) else {
                continue;
            };
            let price = match parse_price(&trade.px) {
                Ok(price) => price,
                Err(e) => {
                    debug!("hyperliquid_futures skipped {} trade: {}", trade.coin, e);
                    continue;
                }
            };
            events.push(MarketEvent::Tick(Tick {
                symbol: symbol.clone(),
                source: Source::HyperliquidFutures,
                price,
                timestamp: trade.time,
            }));
            if let Some(side) = hyperliquid_side(&trade.side) {
                events.push(MarketEvent::Trade(Trade {
                    symbol: symbol.clone(),
                    source: Source::HyperliquidFutures,
                    price,
                    quantity: trade.sz,
                    side,
                    timestamp: trade.time,
                }));
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector() -> HyperliquidConnector {
        HyperliquidConnector::new(&[Symbol::new("BTCUSDT"), Symbol::new("SOLUSDT")])
    }

    #[test]
    fn test_subscribe_by_coin() {
        let subs = connector().subscriptions();
        let payload: serde_json::Value = serde_json::from_str(&subs[1].payload).unwrap();
        assert_eq!(payload["subscription"], json!({"type": "trades", "coin": "SOL"}));
    }

    #[test]
    fn test_parse_trade_array() {
        let payload = r#"{"channel":"trades","data":[{"coin":"BTC","side":"A","px":"67890.5","sz":"0.013","time":1717000000123,"hash":"0xabc","tid":1},{"coin":"BTC","side":"B","px":"67891.0","sz":"0.5","time":1717000000124,"hash":"0xdef","tid":2}]}"#;
        let events = connector().decode(payload).unwrap();
        assert_eq!(events.len(), 4);
        match (&events[0], &events[1]) {
            (MarketEvent::Tick(tick), MarketEvent::Trade(trade)) => {
                assert_eq!(tick.symbol, Symbol::new("BTCUSDT"));
                assert_eq!(tick.price, 67890.5);
                assert_eq!(trade.side, Side::Sell);
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_parse_single_trade_object() {
        let payload = r#"{"channel":"trades","data":{"coin":"SOL","side":"B","px":"150.25","sz":"3","time":1717000000000}}"#;
        let events = connector().decode(payload).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_bad_price_skips_only_that_trade() {
        let payload = r#"{"channel":"trades","data":[{"coin":"BTC","side":"B","px":"oops","sz":"1","time":1},{"coin":"SOL","side":"A","px":"150.5","sz":"2","time":2}]}"#;
        let events = connector().decode(payload).unwrap();
        assert_eq!(events.len(), 2);
        match &events[0] {
            MarketEvent::Tick(tick) => {
                assert_eq!(tick.symbol, Symbol::new("SOLUSDT"));
                assert_eq!(tick.price, 150.5);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_unknown_coin_and_acks() {
        let doge = r#"{"channel":"trades","data":[{"coin":"DOGE","side":"B","px":"0.1","sz":"3","time":1}]}"#;
        assert!(connector().decode(doge).unwrap().is_empty());
        let ack = r#"{"channel":"subscriptionResponse","data":{"method":"subscribe","subscription":{"type":"trades","coin":"BTC"}}}"#;
        assert!(connector().decode(ack).unwrap().is_empty());
        assert!(connector().decode(r#"{"channel":"pong"}"#).unwrap().is_empty());
    }
}
