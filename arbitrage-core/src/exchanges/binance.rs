//! Binance spot and USD-M futures connector (combined streams)

use serde::Deserialize;

use super::connector::{Endpoint, SourceConnector};
use super::errors::{ExchangeError, ExchangeResult};
use super::types::{now_ms, BookTop, MarketEvent, Source, Symbol, Trade};
use crate::market_data::normalizers::{parse_price, side_from_buyer_maker};
use crate::market_data::{SymbolFormat, SymbolMapper};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinanceMarket {
    Spot,
    Futures,
}

impl BinanceMarket {
    fn base_url(&self) -> &'static str {
        match self {
            BinanceMarket::Spot => "wss://stream.binance.com:9443/stream",
            BinanceMarket::Futures => "wss://fstream.binance.com/stream",
        }
    }

    fn source(&self) -> Source {
        match self {
            BinanceMarket::Spot => Source::BinanceSpot,
            BinanceMarket::Futures => Source::BinanceFutures,
        }
    }
}

/// Combined stream envelope
#[derive(Debug, Deserialize)]
struct BinanceEnvelope {
    stream: String,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct BinanceBookTicker {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "b")]
    best_bid_price: String,
    #[serde(rename = "a")]
    best_ask_price: String,
    /// Futures only; spot book tickers carry no event time
    #[serde(rename = "E", default)]
    event_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BinanceAggTrade {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "p")]
    price: String,
    #[serde(rename = "q")]
    quantity: String,
    #[serde(rename = "T")]
    trade_time: i64,
    #[serde(rename = "m")]
    is_buyer_maker: bool,
}

/// Book ticker and aggregate trades; the stream set lives in the URL so there
/// is no subscribe handshake.
pub struct BinanceConnector {
    market: BinanceMarket,
    symbols: SymbolMapper,
}

impl BinanceConnector {
    pub fn new(market: BinanceMarket, symbols: &[Symbol]) -> Self {
        Self {
            market,
            symbols: SymbolMapper::build(symbols, SymbolFormat::Concatenated),
        }
    }

    fn stream_names(&self) -> Vec<String> {
        self.symbols
            .venue_symbols()
            .flat_map(|symbol| {
                let lower = symbol.to_lowercase();
                [format!("{}@bookTicker", lower), format!("{}@aggTrade", lower)]
            })
            .collect()
    }

    fn decode_book(&self, data: serde_json::Value) -> ExchangeResult<Vec<MarketEvent>> {
        let ticker: BinanceBookTicker = serde_json::from_value(data)?;
        let Some(symbol) = self.symbols.to_canonical(&ticker.symbol) else {
            return Ok(Vec::new());
        };
        Ok(vec![MarketEvent::Book(BookTop {
            symbol: symbol.clone(),
            source: self.market.source(),
            best_bid: parse_price(&ticker.best_bid_price)?,
            best_ask: parse_price(&ticker.best_ask_price)?,
            timestamp: ticker.event_time.unwrap_or_else(now_ms),
        })])
    }

    fn decode_trade(&self, data: serde_json::Value) -> ExchangeResult<Vec<MarketEvent>> {
        let trade: BinanceAggTrade = serde_json::from_value(data)?;
        let Some(symbol) = self.symbols.to_canonical(&trade.symbol) else {
            return Ok(Vec::new());
        };
        Ok(vec![MarketEvent::Trade(Trade {
            symbol: symbol.clone(),
            source: self.market.source(),
            price: parse_price(&trade.price)?,
            quantity: trade.quantity,
            side: side_from_buyer_maker(trade.is_buyer_maker),
            timestamp: trade.trade_time,
        })])
    }
}

impl SourceConnector for BinanceConnector {
    fn source(&self) -> Source {
        self.market.source()
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint::websocket(format!(
            "{}?streams={}",
            self.market.base_url(),
            self.stream_names().join("/")
        ))
    }

    fn decode(&self, payload: &str) -> ExchangeResult<Vec<MarketEvent>> {
        let envelope: BinanceEnvelope = serde_json::from_str(payload)?;
        if envelope.stream.ends_with("@bookTicker") {
            self.decode_book(envelope.data)
        } else if envelope.stream.ends_with("@aggTrade") {
            self.decode_trade(envelope.data)
        } else {
            Err(ExchangeError::parse(format!("unexpected stream {}", envelope.stream)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchanges::types::Side;

    fn connector(market: BinanceMarket) -> BinanceConnector {
        BinanceConnector::new(market, &[Symbol::new("BTCUSDT"), Symbol::new("ETHUSDT")])
    }

    #[test]
    fn test_combined_stream_url() {
        let endpoint = connector(BinanceMarket::Futures).endpoint();
        assert_eq!(
            endpoint.url,
            "wss://fstream.binance.com/stream?streams=btcusdt@bookTicker/btcusdt@aggTrade/ethusdt@bookTicker/ethusdt@aggTrade"
        );
        assert!(connector(BinanceMarket::Spot)
            .endpoint()
            .url
            .starts_with("wss://stream.binance.com:9443/stream?streams="));
    }

    #[test]
    fn test_parse_book_ticker() {
        let payload = r#"{"stream":"ethusdt@bookTicker","data":{"u":400900217,"s":"ETHUSDT","b":"2500.10","B":"31.2","a":"2500.30","A":"40.6"}}"#;
        let events = connector(BinanceMarket::Spot).decode(payload).unwrap();
        match &events[..] {
            [MarketEvent::Book(book)] => {
                assert_eq!(book.source, Source::BinanceSpot);
                assert_eq!(book.symbol, Symbol::new("ETHUSDT"));
                assert!((book.mid() - 2500.2).abs() < 1e-9);
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_parse_agg_trade_buyer_maker_is_sell() {
        let payload = r#"{"stream":"btcusdt@aggTrade","data":{"e":"aggTrade","E":1672515782136,"s":"BTCUSDT","a":5933014,"p":"16569.01","q":"0.014","f":100,"l":105,"T":1672515782134,"m":true}}"#;
        let events = connector(BinanceMarket::Futures).decode(payload).unwrap();
        match &events[..] {
            [MarketEvent::Trade(trade)] => {
                assert_eq!(trade.side, Side::Sell);
                assert_eq!(trade.quantity, "0.014");
                assert_eq!(trade.price, 16569.01);
                assert_eq!(trade.timestamp, 1672515782134);
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_unmapped_symbol_is_dropped() {
        let payload = r#"{"stream":"dogeusdt@bookTicker","data":{"s":"DOGEUSDT","b":"0.1","a":"0.2"}}"#;
        assert!(connector(BinanceMarket::Spot).decode(payload).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        assert!(connector(BinanceMarket::Spot).decode("{\"result\":null,\"id\":1}").is_err());
        let bad_price = r#"{"stream":"btcusdt@bookTicker","data":{"s":"BTCUSDT","b":"x","a":"1"}}"#;
        assert!(connector(BinanceMarket::Spot).decode(bad_price).is_err());
    }
}
