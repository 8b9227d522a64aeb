//! Source connectivity: canonical types, venue connectors, transports and
//! the reconnect runner

pub mod binance;
pub mod bybit;
pub mod connector;
pub mod deribit;
pub mod errors;
pub mod gate;
pub mod hyperliquid;
pub mod kraken;
pub mod okx;
pub mod paradex;
pub mod pyth;
pub mod runner;
pub mod status;
pub mod types;
pub mod websocket;

pub use connector::{Endpoint, SourceConnector, Subscription, TransportKind};
pub use errors::{ErrorKind, ExchangeError, ExchangeResult};
pub use runner::{BackoffPolicy, ConnectorRunner, ReconnectPolicy};
pub use status::{ConnectionStatus, SourceReport, SourceStatusBoard, StreamMetrics};
pub use types::{now_ms, BookTop, MarketEvent, Side, Source, Symbol, Tick, Trade, UnknownSource};
pub use websocket::{Dialer, NetworkDialer, Transport};

use std::sync::Arc;

use binance::{BinanceConnector, BinanceMarket};
use bybit::{BybitConnector, BybitMarket};

/// Build the connector for `source` over the configured canonical symbols
pub fn connector_for(source: Source, symbols: &[Symbol]) -> Arc<dyn SourceConnector> {
    match source {
        Source::BinanceFutures => Arc::new(BinanceConnector::new(BinanceMarket::Futures, symbols)),
        Source::BinanceSpot => Arc::new(BinanceConnector::new(BinanceMarket::Spot, symbols)),
        Source::BybitFutures => Arc::new(BybitConnector::new(BybitMarket::Linear, symbols)),
        Source::BybitSpot => Arc::new(BybitConnector::new(BybitMarket::Spot, symbols)),
        Source::OkxFutures => Arc::new(okx::OkxConnector::new(symbols)),
        Source::GateFutures => Arc::new(gate::GateConnector::new(symbols)),
        Source::KrakenFutures => Arc::new(kraken::KrakenConnector::new(symbols)),
        Source::DeribitFutures => Arc::new(deribit::DeribitConnector::new(symbols)),
        Source::HyperliquidFutures => Arc::new(hyperliquid::HyperliquidConnector::new(symbols)),
        Source::ParadexFutures => Arc::new(paradex::ParadexConnector::new(symbols)),
        Source::Pyth => Arc::new(pyth::PythConnector::new(symbols)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_source_has_a_connector() {
        let symbols = [Symbol::new("BTCUSDT")];
        for source in Source::ALL {
            let connector = connector_for(source, &symbols);
            assert_eq!(connector.source(), source);
            assert!(!connector.endpoint().url.is_empty());
        }
    }
}
