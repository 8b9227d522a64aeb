//! Ingestion queues, the shared price store and the update pipeline

pub mod pipeline;
pub mod router;
pub mod store;

pub use pipeline::{PriceAggregator, UpdateOutcome};
pub use router::{
    ingestion_channel, EventSink, IngestionQueues, QueueClosed, RouterConfig, TradeSink, TradeTally,
};
pub use store::{PriceMap, PriceStore};
