//! Connector state and stream health, shared between runners and the API

use dashmap::DashMap;
use serde::Serialize;

use super::types::Source;

/// Reconnect state machine position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Subscribing,
    Streaming,
    Backoff,
}

/// Stream health metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamMetrics {
    pub messages_received: u64,
    pub events_emitted: u64,
    pub payloads_skipped: u64,
    pub connection_failures: u64,
    pub reconnects: u64,
    /// Local receive time of the last payload, ms epoch
    pub last_message_time: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: Source,
    pub status: ConnectionStatus,
    pub metrics: StreamMetrics,
}

#[derive(Debug, Clone)]
struct SourceState {
    status: ConnectionStatus,
    metrics: StreamMetrics,
}

impl Default for SourceState {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            metrics: StreamMetrics::default(),
        }
    }
}

/// Latest status and metrics for every running connector
#[derive(Debug, Default)]
pub struct SourceStatusBoard {
    sources: DashMap<Source, SourceState>,
}

impl SourceStatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, source: Source) {
        self.sources.entry(source).or_default();
    }

    pub fn set_status(&self, source: Source, status: ConnectionStatus) {
        self.sources.entry(source).or_default().status = status;
    }

    pub fn record(&self, source: Source, update: impl FnOnce(&mut StreamMetrics)) {
        update(&mut self.sources.entry(source).or_default().metrics);
    }

    pub fn status(&self, source: Source) -> ConnectionStatus {
        self.sources
            .get(&source)
            .map(|state| state.status)
            .unwrap_or(ConnectionStatus::Disconnected)
    }

    pub fn metrics(&self, source: Source) -> StreamMetrics {
        self.sources
            .get(&source)
            .map(|state| state.metrics.clone())
            .unwrap_or_default()
    }

    /// All sources, ordered by id
    pub fn snapshot(&self) -> Vec<SourceReport> {
        let mut reports: Vec<SourceReport> = self
            .sources
            .iter()
            .map(|entry| SourceReport {
                source: *entry.key(),
                status: entry.status,
                metrics: entry.metrics.clone(),
            })
            .collect();
        reports.sort_by_key(|report| report.source);
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_tracks_status_and_metrics_per_source() {
        let board = SourceStatusBoard::new();
        board.register(Source::OkxFutures);
        board.set_status(Source::BinanceSpot, ConnectionStatus::Streaming);
        board.record(Source::BinanceSpot, |m| m.messages_received += 3);

        assert_eq!(board.status(Source::OkxFutures), ConnectionStatus::Disconnected);
        assert_eq!(board.status(Source::BinanceSpot), ConnectionStatus::Streaming);
        assert_eq!(board.metrics(Source::BinanceSpot).messages_received, 3);
        assert_eq!(board.status(Source::Pyth), ConnectionStatus::Disconnected);

        let reports = board.snapshot();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].source, Source::BinanceSpot);
    }
}
