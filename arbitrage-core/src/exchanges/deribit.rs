//! Deribit perpetual trades over JSON-RPC

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::connector::{Endpoint, SourceConnector, Subscription};
use super::errors::{ExchangeError, ExchangeResult};
use super::types::{MarketEvent, Source, Symbol, Tick, Trade};
use crate::market_data::normalizers::{check_price, format_quantity, parse_side};
use crate::market_data::{SymbolFormat, SymbolMapper};

const DERIBIT_URL: &str = "wss://www.deribit.com/ws/api/v2";

const DERIBIT_INSTRUMENTS: &[(&str, &str)] =
    &[("BTCUSDT", "BTC-PERPETUAL"), ("ETHUSDT", "ETH-PERPETUAL")];

#[derive(Debug, Deserialize)]
struct RpcFrame {
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<SubscriptionParams>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionParams {
    channel: String,
    data: Vec<DeribitTrade>,
}

#[derive(Debug, Deserialize)]
struct DeribitTrade {
    instrument_name: String,
    price: f64,
    amount: f64,
    direction: String,
    timestamp: i64,
}

pub struct DeribitConnector {
    symbols: SymbolMapper,
}

impl DeribitConnector {
    pub fn new(symbols: &[Symbol]) -> Self {
        Self {
            symbols: SymbolMapper::build(symbols, SymbolFormat::Explicit(DERIBIT_INSTRUMENTS)),
        }
    }
}

impl SourceConnector for DeribitConnector {
    fn source(&self) -> Source {
        Source::DeribitFutures
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint::websocket(DERIBIT_URL)
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        self.symbols
            .venue_symbols()
            .enumerate()
            .map(|(i, instrument)| {
                Subscription::new(
                    instrument,
                    json!({
                        "jsonrpc": "2.0",
                        "id": i + 1,
                        "method": "public/subscribe",
                        "params": { "channels": [format!("trades.{}.raw", instrument)] },
                    }),
                )
            })
            .collect()
    }

    fn decode(&self, payload: &str) -> ExchangeResult<Vec<MarketEvent>> {
        let frame: RpcFrame = serde_json::from_str(payload)?;

        if let Some(error) = frame.error {
            warn!("deribit_futures rpc error: {}", error);
            return Ok(Vec::new());
        }
        match frame.method.as_deref() {
            // Replies to our own requests carry `result` and no method
            None => return Ok(Vec::new()),
            Some("subscription") => {}
            Some("heartbeat") => return Ok(Vec::new()),
            Some(other) => {
                return Err(ExchangeError::parse(format!("unexpected method {}", other)));
            }
        }

        let params = frame
            .params
            .ok_or_else(|| ExchangeError::parse("subscription without params"))?;
        if !params.channel.starts_with("trades.") {
            return Err(ExchangeError::parse(format!("unexpected channel {}", params.channel)));
        }

        let mut events = Vec::with_capacity(params.data.len() * 2);
        for trade in params.data {
            let Some(symbol) = self.symbols.to_canonical(&trade.instrument_name) else {
                continue;
            };
            let price = match check_price(trade.price) {
                Ok(price) => price,
                Err(e) => {
                    debug!("deribit_futures skipped {} trade: {}", trade.instrument_name, e);
                    continue;
                }
            };
            events.push(MarketEvent::Tick(Tick {
                symbol: symbol.clone(),
                source: Source::DeribitFutures,
                price,
                timestamp: trade.timestamp,
            }));
            if let Some(side) = parse_side(&trade.direction) {
                events.push(MarketEvent::Trade(Trade {
                    symbol: symbol.clone(),
                    source: Source::DeribitFutures,
                    price,
                    quantity: format_quantity(trade.amount),
                    side,
                    timestamp: trade.timestamp,
                }));
            }
        }
        Ok(events)
    }
}
