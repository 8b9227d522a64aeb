//! Gate.io USDT futures book ticker connector

use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::connector::{Endpoint, SourceConnector, Subscription};
use super::errors::{ExchangeError, ExchangeResult};
use super::types::{now_ms, BookTop, MarketEvent, Source, Symbol};
use crate::market_data::normalizers::parse_price;
use crate::market_data::{SymbolFormat, SymbolMapper};

const GATE_FUTURES_URL: &str = "wss://fx-ws.gateio.ws/v4/ws/usdt";
const BOOK_TICKER_CHANNEL: &str = "futures.book_ticker";

#[derive(Debug, Deserialize)]
struct GateFrame {
    #[serde(default)]
    channel: String,
    #[serde(default)]
    event: String,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GateBookTicker {
    #[serde(rename = "s")]
    contract: String,
    #[serde(rename = "b")]
    best_bid: String,
    #[serde(rename = "a")]
    best_ask: String,
    #[serde(rename = "t", default)]
    timestamp: Option<i64>,
}

pub struct GateConnector {
    symbols: SymbolMapper,
}

impl GateConnector {
    pub fn new(symbols: &[Symbol]) -> Self {
        Self {
            symbols: SymbolMapper::build(
                symbols,
                SymbolFormat::Delimited {
                    separator: "_",
                    quote: None,
                    suffix: None,
                },
            ),
        }
    }

    fn unix_seconds() -> i64 {
        now_ms() / 1000
    }
}

impl SourceConnector for GateConnector {
    fn source(&self) -> Source {
        Source::GateFutures
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint::websocket(GATE_FUTURES_URL)
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        let time = Self::unix_seconds();
        self.symbols
            .venue_symbols()
            .map(|contract| {
                Subscription::new(
                    contract,
                    json!({
                        "time": time,
                        "channel": BOOK_TICKER_CHANNEL,
                        "event": "subscribe",
                        "payload": [contract],
                    }),
                )
            })
            .collect()
    }

    fn heartbeat(&self) -> Option<String> {
        Some(json!({ "time": Self::unix_seconds(), "channel": "futures.ping" }).to_string())
    }

    fn decode(&self, payload: &str) -> ExchangeResult<Vec<MarketEvent>> {
        let frame: GateFrame = serde_json::from_str(payload)?;

        if let Some(error) = frame.error.filter(|e| !e.is_null()) {
            warn!("gate_futures error on {}: {}", frame.channel, error);
            return Ok(Vec::new());
        }
        if frame.event == "subscribe" || frame.channel == "futures.pong" {
            return Ok(Vec::new());
        }
        if frame.channel != BOOK_TICKER_CHANNEL || frame.event != "update" {
            return Err(ExchangeError::parse(format!(
                "unexpected {} event {:?}",
                frame.channel, frame.event
            )));
        }

        let result = frame
            .result
            .ok_or_else(|| ExchangeError::parse("book ticker update without result"))?;
        let ticker: GateBookTicker = serde_json::from_value(result)?;
        let Some(symbol) = self.symbols.to_canonical(&ticker.contract) else {
            return Ok(Vec::new());
        };
        Ok(vec![MarketEvent::Book(BookTop {
            symbol: symbol.clone(),
            source: Source::GateFutures,
            best_bid: parse_price(&ticker.best_bid)?,
            best_ask: parse_price(&ticker.best_ask)?,
            timestamp: ticker.timestamp.filter(|t| *t > 0).unwrap_or_else(now_ms),
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector() -> GateConnector {
        GateConnector::new(&[Symbol::new("BTCUSDT"), Symbol::new("XRPUSDT")])
    }

    #[test]
    fn test_subscriptions() {
        let subs = connector().subscriptions();
        assert_eq!(subs.len(), 2);
        let payload: serde_json::Value = serde_json::from_str(&subs[1].payload).unwrap();
        assert_eq!(payload["channel"], "futures.book_ticker");
        assert_eq!(payload["payload"], json!(["XRP_USDT"]));
    }

    #[test]
    fn test_parse_book_ticker_update() {
        let payload = r#"{"time":1615366379,"time_ms":1615366379123,"channel":"futures.book_ticker","event":"update","result":{"t":1615366379123,"u":2517661076,"s":"BTC_USDT","b":"54696.6","B":37000,"a":"54696.7","A":47061}}"#;
        let events = connector().decode(payload).unwrap();
        match &events[..] {
            [MarketEvent::Book(book)] => {
                assert_eq!(book.symbol, Symbol::new("BTCUSDT"));
                assert_eq!(book.best_bid, 54696.6);
                assert_eq!(book.timestamp, 1615366379123);
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_acks_errors_and_pongs() {
        let ack = r#"{"time":1545404023,"channel":"futures.book_ticker","event":"subscribe","error":null,"result":{"status":"success"}}"#;
        let err = r#"{"time":1545404023,"channel":"futures.book_ticker","event":"subscribe","error":{"code":2,"message":"unknown contract"},"result":null}"#;
        let pong = r#"{"time":1545404023,"channel":"futures.pong","event":"","error":null,"result":null}"#;
        assert!(connector().decode(ack).unwrap().is_empty());
        assert!(connector().decode(err).unwrap().is_empty());
        assert!(connector().decode(pong).unwrap().is_empty());
    }

    #[test]
    fn test_empty_side_is_a_parse_error() {
        let payload = r#"{"channel":"futures.book_ticker","event":"update","result":{"t":1,"s":"BTC_USDT","b":"","a":"54696.7"}}"#;
        assert!(connector().decode(payload).is_err());
    }
}
