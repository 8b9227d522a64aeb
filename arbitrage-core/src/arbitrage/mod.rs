//! Cross-source divergence: alerting detector and spread matrix

pub mod detector;
pub mod spread;

pub use detector::{ArbitrageDetector, DetectorConfig, Opportunity};
pub use spread::SpreadMatrix;

/// Relative change from `from` to `to`, in percent of `from`
pub fn percentage_change(from: f64, to: f64) -> f64 {
    (to - from) / from * 100.0
}
