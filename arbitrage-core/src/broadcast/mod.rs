//! Observer registry and fan-out of price, spread and opportunity messages

pub mod broadcaster;
pub mod messages;
pub mod registry;

pub use broadcaster::{BroadcastConfig, Broadcaster};
pub use messages::ObserverMessage;
pub use registry::{ObserverId, ObserverRegistry};
