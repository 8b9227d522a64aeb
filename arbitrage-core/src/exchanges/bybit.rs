//! Bybit v5 public streams, linear perpetuals and spot

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::connector::{Endpoint, SourceConnector, Subscription};
use super::errors::{ExchangeError, ExchangeResult};
use super::types::{now_ms, BookTop, MarketEvent, Source, Symbol, Trade};
use crate::market_data::normalizers::{parse_price, parse_side, top_of_book};
use crate::market_data::{SymbolFormat, SymbolMapper};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BybitMarket {
    Linear,
    Spot,
}

impl BybitMarket {
    fn url(&self) -> &'static str {
        match self {
            BybitMarket::Linear => "wss://stream.bybit.com/v5/public/linear",
            BybitMarket::Spot => "wss://stream.bybit.com/v5/public/spot",
        }
    }

    fn source(&self) -> Source {
        match self {
            BybitMarket::Linear => Source::BybitFutures,
            BybitMarket::Spot => Source::BybitSpot,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BybitFrame {
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    ts: Option<i64>,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    op: Option<String>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    ret_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BybitBook {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "b", default)]
    bids: Vec<Vec<String>>,
    #[serde(rename = "a", default)]
    asks: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct BybitTrade {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "p")]
    price: String,
    #[serde(rename = "v")]
    size: String,
    #[serde(rename = "S")]
    side: String,
    #[serde(rename = "T")]
    trade_time: i64,
}

/// Level-1 order book and public trades
pub struct BybitConnector {
    market: BybitMarket,
    symbols: SymbolMapper,
}

impl BybitConnector {
    pub fn new(market: BybitMarket, symbols: &[Symbol]) -> Self {
        Self {
            market,
            symbols: SymbolMapper::build(symbols, SymbolFormat::Concatenated),
        }
    }

    fn decode_book(&self, data: serde_json::Value, ts: Option<i64>) -> ExchangeResult<Vec<MarketEvent>> {
        let book: BybitBook = serde_json::from_value(data)?;
        let Some(symbol) = self.symbols.to_canonical(&book.symbol) else {
            return Ok(Vec::new());
        };
        // Deltas that leave one side untouched carry an empty array for it
        let Some((best_bid, best_ask)) = top_of_book(&book.bids, &book.asks)? else {
            return Ok(Vec::new());
        };
        Ok(vec![MarketEvent::Book(BookTop {
            symbol: symbol.clone(),
            source: self.market.source(),
            best_bid,
            best_ask,
            timestamp: ts.unwrap_or_else(now_ms),
        })])
    }

    fn decode_trades(&self, data: serde_json::Value) -> ExchangeResult<Vec<MarketEvent>> {
        let trades: Vec<BybitTrade> = serde_json::from_value(data)?;
        let mut events = Vec::with_capacity(trades.len());
        for trade in trades {
            let Some(symbol) = self.symbols.to_canonical(&trade.symbol) else {
                continue;
            };
            let Some(side) = parse_side(&trade.side) else {
                continue;
            };
            let price = match parse_price(&trade.price) {
                Ok(price) => price,
                Err(e) => {
                    debug!("{} skipped {} trade: {}", self.market.source(), symbol, e);
                    continue;
                }
            };
            events.push(MarketEvent::Trade(Trade {
                symbol: symbol.clone(),
                source: self.market.source(),
                price,
                quantity: trade.size,
                side,
                timestamp: trade.trade_time,
            }));
        }
        Ok(events)
    }
}

impl SourceConnector for BybitConnector {
    fn source(&self) -> Source {
        self.market.source()
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint::websocket(self.market.url())
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        self.symbols
            .venue_symbols()
            .map(|symbol| {
                Subscription::new(
                    symbol,
                    json!({
                        "op": "subscribe",
                        "args": [format!("orderbook.1.{}", symbol), format!("publicTrade.{}", symbol)],
                    }),
                )
            })
            .collect()
    }

    fn heartbeat(&self) -> Option<String> {
        Some(json!({ "op": "ping" }).to_string())
    }

    fn decode(&self, payload: &str) -> ExchangeResult<Vec<MarketEvent>> {
        let frame: BybitFrame = serde_json::from_str(payload)?;

        if let Some(op) = frame.op.as_deref() {
            if op == "subscribe" && frame.success == Some(false) {
                warn!(
                    "{} subscription rejected: {}",
                    self.market.source(),
                    frame.ret_msg.as_deref().unwrap_or("no reason given")
                );
            }
            return Ok(Vec::new());
        }

        let (Some(topic), Some(data)) = (frame.topic.as_deref(), frame.data) else {
            return Err(ExchangeError::parse("frame without topic or data"));
        };
        if topic.starts_with("orderbook.") {
            self.decode_book(data, frame.ts)
        } else if topic.starts_with("publicTrade.") {
            self.decode_trades(data)
        } else {
            Err(ExchangeError::parse(format!("unexpected topic {}", topic)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchanges::types::Side;

    fn connector() -> BybitConnector {
        BybitConnector::new(BybitMarket::Linear, &[Symbol::new("BTCUSDT"), Symbol::new("SOLUSDT")])
    }

    #[test]
    fn test_one_subscription_per_symbol() {
        let subs = connector().subscriptions();
        assert_eq!(subs.len(), 2);
        let first: serde_json::Value = serde_json::from_str(&subs[0].payload).unwrap();
        assert_eq!(
            first,
            json!({"op": "subscribe", "args": ["orderbook.1.BTCUSDT", "publicTrade.BTCUSDT"]})
        );
    }

    #[test]
    fn test_parse_orderbook_snapshot() {
        let payload = r#"{"topic":"orderbook.1.BTCUSDT","type":"snapshot","ts":1672304484978,"data":{"s":"BTCUSDT","b":[["16493.50","0.006"]],"a":[["16611.00","0.029"]],"u":18521288,"seq":7961638724},"cts":1672304484976}"#;
        let events = connector().decode(payload).unwrap();
        match &events[..] {
            [MarketEvent::Book(book)] => {
                assert_eq!(book.source, Source::BybitFutures);
                assert_eq!(book.best_bid, 16493.5);
                assert_eq!(book.best_ask, 16611.0);
                assert_eq!(book.timestamp, 1672304484978);
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_one_sided_delta_is_ignored() {
        let payload = r#"{"topic":"orderbook.1.BTCUSDT","type":"delta","ts":1,"data":{"s":"BTCUSDT","b":[],"a":[["16611.00","0.029"]]}}"#;
        assert!(connector().decode(payload).unwrap().is_empty());
    }

    #[test]
    fn test_parse_public_trades() {
        let payload = r#"{"topic":"publicTrade.SOLUSDT","type":"snapshot","ts":1672304486868,"data":[{"T":1672304486865,"s":"SOLUSDT","S":"Buy","v":"0.001","p":"16578.50","L":"PlusTick","i":"20f43950","BT":false},{"T":1672304486866,"s":"SOLUSDT","S":"Sell","v":"2","p":"16578.00"}]}"#;
        let events = connector().decode(payload).unwrap();
        assert_eq!(events.len(), 2);
        match (&events[0], &events[1]) {
            (MarketEvent::Trade(first), MarketEvent::Trade(second)) => {
                assert_eq!(first.side, Side::Buy);
                assert_eq!(first.quantity, "0.001");
                assert_eq!(second.side, Side::Sell);
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_bad_trade_price_skips_only_that_trade() {
        let payload = r#"{"topic":"publicTrade.SOLUSDT","type":"snapshot","ts":1,"data":[{"T":1,"s":"SOLUSDT","S":"Buy","v":"1","p":"bad"},{"T":2,"s":"SOLUSDT","S":"Sell","v":"3","p":"150.25"}]}"#;
        let events = connector().decode(payload).unwrap();
        match &events[..] {
            [MarketEvent::Trade(trade)] => {
                assert_eq!(trade.price, 150.25);
                assert_eq!(trade.quantity, "3");
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_acks_and_pongs_are_not_errors() {
        let ack = r#"{"success":true,"ret_msg":"","conn_id":"abc","req_id":"","op":"subscribe"}"#;
        let pong = r#"{"success":true,"ret_msg":"pong","conn_id":"abc","op":"ping"}"#;
        let rejected = r#"{"success":false,"ret_msg":"error:handler not found,topic:orderbook.1.FOO","op":"subscribe"}"#;
        assert!(connector().decode(ack).unwrap().is_empty());
        assert!(connector().decode(pong).unwrap().is_empty());
        assert!(connector().decode(rejected).unwrap().is_empty());
        assert!(connector().decode(r#"{"foo":1}"#).is_err());
    }
}
