//! OKX v5 public channel connector for USDT perpetual swaps

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::connector::{Endpoint, SourceConnector, Subscription};
use super::errors::{ExchangeError, ExchangeResult};
use super::types::{now_ms, BookTop, MarketEvent, Source, Symbol, Trade};
use crate::market_data::normalizers::{parse_millis, parse_price, parse_side, top_of_book};
use crate::market_data::{SymbolFormat, SymbolMapper};

const OKX_PUBLIC_URL: &str = "wss://ws.okx.com:8443/ws/v5/public";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxArg {
    channel: String,
    inst_id: String,
}

#[derive(Debug, Deserialize)]
struct OkxFrame {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    arg: Option<OkxArg>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OkxTrade {
    px: String,
    sz: String,
    side: String,
    ts: String,
}

#[derive(Debug, Deserialize)]
struct OkxBook {
    bids: Vec<Vec<String>>,
    asks: Vec<Vec<String>>,
    ts: String,
}

/// Trades and the five-level book for each swap
pub struct OkxConnector {
    symbols: SymbolMapper,
}

impl OkxConnector {
    pub fn new(symbols: &[Symbol]) -> Self {
        Self {
            symbols: SymbolMapper::build(
                symbols,
                SymbolFormat::Delimited {
                    separator: "-",
                    quote: None,
                    suffix: Some("SWAP"),
                },
            ),
        }
    }

    fn decode_trades(&self, symbol: &Symbol, data: serde_json::Value) -> ExchangeResult<Vec<MarketEvent>> {
        let trades: Vec<OkxTrade> = serde_json::from_value(data)?;
        let mut events = Vec::with_capacity(trades.len());
        for trade in trades {
            let Some(side) = parse_side(&trade.side) else {
                continue;
            };
            let price = match parse_price(&trade.px) {
                Ok(price) => price,
                Err(e) => {
                    debug!("okx_futures skipped {} trade: {}", symbol, e);
                    continue;
                }
            };
            events.push(MarketEvent::Trade(Trade {
                symbol: symbol.clone(),
                source: Source::OkxFutures,
                price,
                quantity: trade.sz,
                side,
                timestamp: parse_millis(&trade.ts).unwrap_or_else(now_ms),
            }));
        }
        Ok(events)
    }

    fn decode_books(&self, symbol: &Symbol, data: serde_json::Value) -> ExchangeResult<Vec<MarketEvent>> {
        let books: Vec<OkxBook> = serde_json::from_value(data)?;
        let mut events = Vec::with_capacity(books.len());
        for book in books {
            let (best_bid, best_ask) = match top_of_book(&book.bids, &book.asks) {
                Ok(Some(top)) => top,
                Ok(None) => continue,
                Err(e) => {
                    debug!("okx_futures skipped {} book: {}", symbol, e);
                    continue;
                }
            };
            events.push(MarketEvent::Book(BookTop {
                symbol: symbol.clone(),
                source: Source::OkxFutures,
                best_bid,
                best_ask,
                timestamp: parse_millis(&book.ts).unwrap_or_else(now_ms),
            }));
        }
        Ok(events)
    }
}

impl SourceConnector for OkxConnector {
    fn source(&self) -> Source {
        Source::OkxFutures
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint::websocket(OKX_PUBLIC_URL)
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        self.symbols
            .venue_symbols()
            .map(|inst_id| {
                Subscription::new(
                    inst_id,
                    json!({
                        "op": "subscribe",
                        "args": [
                            { "channel": "trades", "instId": inst_id },
                            { "channel": "books5", "instId": inst_id },
                        ],
                    }),
                )
            })
            .collect()
    }

    fn heartbeat(&self) -> Option<String> {
        Some("ping".to_string())
    }

    fn decode(&self, payload: &str) -> ExchangeResult<Vec<MarketEvent>> {
        if payload == "pong" {
            return Ok(Vec::new());
        }
        let frame: OkxFrame = serde_json::from_str(payload)?;

        if let Some(event) = frame.event.as_deref() {
            if event == "error" {
                warn!(
                    "okx_futures subscription error: {}",
                    frame.msg.as_deref().unwrap_or("no message")
                );
            }
            return Ok(Vec::new());
        }

        let (Some(arg), Some(data)) = (frame.arg, frame.data) else {
            return Err(ExchangeError::parse("frame without arg or data"));
        };
        let Some(symbol) = self.symbols.to_canonical(&arg.inst_id) else {
            return Ok(Vec::new());
        };
        match arg.channel.as_str() {
            "trades" => self.decode_trades(symbol, data),
            "books5" => self.decode_books(symbol, data),
            other => Err(ExchangeError::parse(format!("unexpected channel {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchanges::types::Side;

    fn connector() -> OkxConnector {
        OkxConnector::new(&[Symbol::new("BTCUSDT"), Symbol::new("ETHUSDT")])
    }

    #[test]
    fn test_subscriptions_use_swap_instruments() {
        let subs = connector().subscriptions();
        assert_eq!(subs[0].target, "BTC-USDT-SWAP");
        let payload: serde_json::Value = serde_json::from_str(&subs[1].payload).unwrap();
        assert_eq!(payload["args"][1], json!({"channel": "books5", "instId": "ETH-USDT-SWAP"}));
    }

    #[test]
    fn test_parse_trades() {
        let payload = r#"{"arg":{"channel":"trades","instId":"BTC-USDT-SWAP"},"data":[{"instId":"BTC-USDT-SWAP","tradeId":"130639474","px":"42219.9","sz":"0.12060306","side":"buy","ts":"1630048897897","count":"3"}]}"#;
        let events = connector().decode(payload).unwrap();
        match &events[..] {
            [MarketEvent::Trade(trade)] => {
                assert_eq!(trade.symbol, Symbol::new("BTCUSDT"));
                assert_eq!(trade.side, Side::Buy);
                assert_eq!(trade.quantity, "0.12060306");
                assert_eq!(trade.timestamp, 1630048897897);
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_parse_books5() {
        let payload = r#"{"arg":{"channel":"books5","instId":"ETH-USDT-SWAP"},"data":[{"asks":[["2501.0","10","0","2"]],"bids":[["2500.0","4","0","1"]],"instId":"ETH-USDT-SWAP","ts":"1597026383085","seqId":123}]}"#;
        let events = connector().decode(payload).unwrap();
        match &events[..] {
            [MarketEvent::Book(book)] => {
                assert_eq!(book.mid(), 2500.5);
                assert_eq!(book.timestamp, 1597026383085);
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_bad_entries_skip_only_themselves() {
        let trades = r#"{"arg":{"channel":"trades","instId":"BTC-USDT-SWAP"},"data":[{"px":"bad","sz":"1","side":"buy","ts":"1"},{"px":"42220.1","sz":"2","side":"sell","ts":"2"}]}"#;
        let events = connector().decode(trades).unwrap();
        match &events[..] {
            [MarketEvent::Trade(trade)] => {
                assert_eq!(trade.price, 42220.1);
                assert_eq!(trade.side, Side::Sell);
            }
            other => panic!("unexpected events {:?}", other),
        }

        let books = r#"{"arg":{"channel":"books5","instId":"ETH-USDT-SWAP"},"data":[{"asks":[["x","1"]],"bids":[["2500.0","1"]],"ts":"1"},{"asks":[["2501.0","1"]],"bids":[["2500.0","1"]],"ts":"2"}]}"#;
        let events = connector().decode(books).unwrap();
        match &events[..] {
            [MarketEvent::Book(book)] => assert_eq!(book.timestamp, 2),
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_events_and_pong_are_ignored() {
        assert!(connector().decode("pong").unwrap().is_empty());
        let ack = r#"{"event":"subscribe","arg":{"channel":"trades","instId":"BTC-USDT-SWAP"},"connId":"a4d3ae55"}"#;
        assert!(connector().decode(ack).unwrap().is_empty());
        let err = r#"{"event":"error","code":"60012","msg":"Invalid request","connId":"a4d3ae55"}"#;
        assert!(connector().decode(err).unwrap().is_empty());
    }
}
