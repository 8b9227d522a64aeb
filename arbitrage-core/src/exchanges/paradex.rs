//! Paradex perpetual trades over JSON-RPC

use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::connector::{Endpoint, SourceConnector, Subscription};
use super::errors::{ExchangeError, ExchangeResult};
use super::types::{MarketEvent, Source, Symbol, Tick, Trade};
use crate::market_data::normalizers::{parse_price, parse_side};
use crate::market_data::{SymbolFormat, SymbolMapper};

const PARADEX_URL: &str = "wss://ws.api.prod.paradex.trade/v1";

#[derive(Debug, Deserialize)]
struct RpcFrame {
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<TradeParams>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TradeParams {
    channel: String,
    data: ParadexTrade,
}

#[derive(Debug, Deserialize)]
struct ParadexTrade {
    price: String,
    size: String,
    side: String,
    created_at: i64,
}

pub struct ParadexConnector {
    symbols: SymbolMapper,
}

impl ParadexConnector {
    pub fn new(symbols: &[Symbol]) -> Self {
        Self {
            symbols: SymbolMapper::build(
                symbols,
                SymbolFormat::Delimited {
                    separator: "-",
                    quote: Some("USD"),
                    suffix: Some("PERP"),
                },
            ),
        }
    }
}

impl SourceConnector for ParadexConnector {
    fn source(&self) -> Source {
        Source::ParadexFutures
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint::websocket(PARADEX_URL)
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        self.symbols
            .venue_symbols()
            .enumerate()
            .map(|(i, market)| {
                Subscription::new(
                    market,
                    json!({
                        "jsonrpc": "2.0",
                        "id": i + 1,
                        "method": "subscribe",
                        "params": { "channel": format!("trades.{}", market) },
                    }),
                )
            })
            .collect()
    }

    fn decode(&self, payload: &str) -> ExchangeResult<Vec<MarketEvent>> {
        let frame: RpcFrame = serde_json::from_str(payload)?;

        if let Some(error) = frame.error {
            warn!("paradex_futures rpc error: {}", error);
            return Ok(Vec::new());
        }
        match frame.method.as_deref() {
            None => return Ok(Vec::new()),
            Some("subscription") => {}
            Some(other) => {
                return Err(ExchangeError::parse(format!("unexpected method {}", other)));
            }
        }

        let params = frame
            .params
            .ok_or_else(|| ExchangeError::parse("subscription without params"))?;
        let Some(market) = params.channel.strip_prefix("trades.") else {
            return Err(ExchangeError::parse(format!("unexpected channel {}", params.channel)));
        };
        let Some(symbol) = self.symbols.to_canonical(market) else {
            return Ok(Vec::new());
        };

        let trade = params.data;
        let price = parse_price(&trade.price)?;
        let mut events = vec![MarketEvent::Tick(Tick {
            symbol: symbol.clone(),
            source: Source::ParadexFutures,
            price,
            timestamp: trade.created_at,
        })];
        if let Some(side) = parse_side(&trade.side) {
            events.push(MarketEvent::Trade(Trade {
                symbol: symbol.clone(),
                source: Source::ParadexFutures,
                price,
                quantity: trade.size,
                side,
                timestamp: trade.created_at,
            }));
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchanges::types::Side;

    fn connector() -> ParadexConnector {
        ParadexConnector::new(&[Symbol::new("BTCUSDT"), Symbol::new("ETHUSDT")])
    }

    #[test]
    fn test_subscriptions_target_usd_perps() {
        let subs = connector().subscriptions();
        assert_eq!(subs[1].target, "ETH-USD-PERP");
        let payload: serde_json::Value = serde_json::from_str(&subs[1].payload).unwrap();
        assert_eq!(payload["params"]["channel"], "trades.ETH-USD-PERP");
        assert_eq!(payload["id"], 2);
    }

    #[test]
    fn test_parse_trade_event() {
        let payload = r#"{"jsonrpc":"2.0","method":"subscription","params":{"channel":"trades.BTC-USD-PERP","data":{"id":"1718","market":"BTC-USD-PERP","price":"64210.5","size":"0.025","side":"SELL","created_at":1718000000456,"trade_type":"FILL"}}}"#;
        let events = connector().decode(payload).unwrap();
        match &events[..] {
            [MarketEvent::Tick(tick), MarketEvent::Trade(trade)] => {
                assert_eq!(tick.symbol, Symbol::new("BTCUSDT"));
                assert_eq!(tick.price, 64210.5);
                assert_eq!(trade.side, Side::Sell);
                assert_eq!(trade.timestamp, 1718000000456);
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_subscribe_reply_is_ignored() {
        let reply = r#"{"jsonrpc":"2.0","id":1,"result":{"channel":"trades.BTC-USD-PERP","status":"subscribed"}}"#;
        assert!(connector().decode(reply).unwrap().is_empty());
    }
}
