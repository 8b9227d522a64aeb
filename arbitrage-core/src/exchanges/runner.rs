//! Supervised reconnect loop driving one source connector

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::aggregation::EventSink;

use super::connector::SourceConnector;
use super::errors::ExchangeError;
use super::status::{ConnectionStatus, SourceStatusBoard};
use super::types::now_ms;
use super::websocket::{Dialer, Transport};

/// Delay schedule between reconnect attempts
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffPolicy {
    Fixed(Duration),
    Exponential {
        initial: Duration,
        max: Duration,
        multiplier: f64,
    },
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (0-based) of a failure streak
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            BackoffPolicy::Fixed(delay) => *delay,
            BackoffPolicy::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let secs = initial.as_secs_f64() * multiplier.powi(exponent);
                if !secs.is_finite() || secs >= max.as_secs_f64() {
                    *max
                } else {
                    Duration::from_secs_f64(secs.max(0.0))
                }
            }
        }
    }
}

/// Reconnect configuration
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Applied after a stream that was up drops
    pub after_stream_failure: BackoffPolicy,
    /// Applied when the dial itself fails
    pub after_dial_failure: BackoffPolicy,
    pub keepalive_interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            after_stream_failure: BackoffPolicy::Fixed(Duration::from_secs(2)),
            after_dial_failure: BackoffPolicy::Fixed(Duration::from_secs(5)),
            keepalive_interval: Duration::from_secs(20),
        }
    }
}

enum Step {
    Frame(Result<Option<String>, ExchangeError>),
    Keepalive,
}

/// Owns one source's connection for the life of the process.
///
/// `Disconnected -> Connecting -> Subscribing -> Streaming`, and on any
/// transport failure `Backoff -> Connecting` again, forever.
pub struct ConnectorRunner {
    connector: Arc<dyn SourceConnector>,
    dialer: Arc<dyn Dialer>,
    sink: EventSink,
    policy: ReconnectPolicy,
    board: Arc<SourceStatusBoard>,
}

impl ConnectorRunner {
    pub fn new(
        connector: Arc<dyn SourceConnector>,
        dialer: Arc<dyn Dialer>,
        sink: EventSink,
        policy: ReconnectPolicy,
        board: Arc<SourceStatusBoard>,
    ) -> Self {
        board.register(connector.source());
        Self {
            connector,
            dialer,
            sink,
            policy,
            board,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        let source = self.connector.source();
        let mut failures: u32 = 0;

        loop {
            self.board.set_status(source, ConnectionStatus::Connecting);
            let endpoint = self.connector.endpoint();

            let mut transport = match self.dialer.dial(&endpoint).await {
                Ok(transport) => transport,
                Err(e) => {
                    error!("{} connection error: {}", source, e);
                    self.board.record(source, |m| m.connection_failures += 1);
                    let delay = self.policy.after_dial_failure.delay(failures);
                    failures = failures.saturating_add(1);
                    self.back_off(delay).await;
                    continue;
                }
            };
            info!("Connected to {} ({})", source, endpoint.url);

            self.board.set_status(source, ConnectionStatus::Subscribing);
            self.subscribe(transport.as_mut()).await;

            self.board.set_status(source, ConnectionStatus::Streaming);
            failures = 0;

            let reason = self.stream(transport.as_mut()).await;
            transport.close().await;
            warn!("{} stream ended: {}", source, reason);
            self.board.record(source, |m| {
                m.connection_failures += 1;
                m.reconnects += 1;
            });

            let delay = self.policy.after_stream_failure.delay(failures);
            failures = failures.saturating_add(1);
            self.back_off(delay).await;
        }
    }

    async fn back_off(&self, delay: Duration) {
        let source = self.connector.source();
        self.board.set_status(source, ConnectionStatus::Backoff);
        debug!("{} reconnecting in {:?}", source, delay);
        tokio::time::sleep(delay).await;
    }

    /// Send every subscribe request; one failing target never stops the rest
    async fn subscribe(&self, transport: &mut dyn Transport) {
        let source = self.connector.source();
        let subscriptions = self.connector.subscriptions();
        let total = subscriptions.len();
        let mut sent = 0usize;

        for subscription in subscriptions {
            match transport.send_text(subscription.payload).await {
                Ok(()) => {
                    sent += 1;
                    debug!("{} subscribed to {}", source, subscription.target);
                }
                Err(e) => {
                    let err = ExchangeError::Subscription {
                        target: subscription.target,
                        reason: e.to_string(),
                    };
                    warn!("{} {}", source, err);
                }
            }
        }

        if total > 0 {
            info!("{} sent {}/{} subscriptions", source, sent, total);
        }
    }

    /// Read until the transport fails, returning why it stopped.
    ///
    /// Frame errors that only spoil the frame itself are counted and skipped.
    async fn stream(&self, transport: &mut dyn Transport) -> ExchangeError {
        let heartbeat = self.connector.heartbeat();
        let period = self.policy.keepalive_interval;
        let mut keepalive = interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let step = tokio::select! {
                frame = transport.next_text() => Step::Frame(frame),
                _ = keepalive.tick() => Step::Keepalive,
            };

            match step {
                Step::Frame(Ok(Some(payload))) => self.handle_payload(&payload).await,
                Step::Frame(Ok(None)) => return ExchangeError::Closed,
                Step::Frame(Err(e)) if !e.should_retry() => {
                    debug!("{} skipped frame: {}", self.connector.source(), e);
                    self.board
                        .record(self.connector.source(), |m| m.payloads_skipped += 1);
                }
                Step::Frame(Err(e)) => return e,
                Step::Keepalive => {
                    if let Err(e) = transport.keepalive(heartbeat.as_deref()).await {
                        return e;
                    }
                }
            }
        }
    }

    async fn handle_payload(&self, payload: &str) {
        let source = self.connector.source();
        self.board.record(source, |m| {
            m.messages_received += 1;
            m.last_message_time = Some(now_ms());
        });

        match self.connector.decode(payload) {
            Ok(events) => {
                let count = events.len() as u64;
                for event in events {
                    if let Err(e) = self.sink.send(event).await {
                        warn!("{} dropped event: {}", source, e);
                    }
                }
                if count > 0 {
                    self.board.record(source, |m| m.events_emitted += count);
                }
            }
            Err(e) => {
                debug!("{} skipped payload: {}", source, e);
                self.board.record(source, |m| m.payloads_skipped += 1);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    use crate::exchanges::connector::Endpoint;
    use crate::exchanges::errors::{ExchangeError, ExchangeResult};
    use crate::exchanges::websocket::{Dialer, Transport};

    /// One scripted connection: frames are served in order, then the
    /// transport idles until the runner drops it.
    pub type Script = Vec<ExchangeResult<Option<String>>>;

    pub struct ScriptedTransport {
        frames: VecDeque<ExchangeResult<Option<String>>>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send_text(&mut self, text: String) -> ExchangeResult<()> {
            self.sent.lock().push(text);
            Ok(())
        }

        async fn next_text(&mut self) -> ExchangeResult<Option<String>> {
            match self.frames.pop_front() {
                Some(frame) => frame,
                None => std::future::pending().await,
            }
        }

        async fn keepalive(&mut self, _heartbeat: Option<&str>) -> ExchangeResult<()> {
            Ok(())
        }

        async fn close(&mut self) {}
    }

    #[derive(Default)]
    pub struct ScriptedDialer {
        scripts: Mutex<VecDeque<Script>>,
        pub sent: Arc<Mutex<Vec<String>>>,
        pub dials: Mutex<u32>,
    }

    impl ScriptedDialer {
        pub fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.into_iter().collect()),
                ..Default::default()
            })
        }
    }

    #[async_trait]
    impl Dialer for ScriptedDialer {
        async fn dial(&self, _endpoint: &Endpoint) -> ExchangeResult<Box<dyn Transport>> {
            *self.dials.lock() += 1;
            let script = self
                .scripts
                .lock()
                .pop_front()
                .ok_or_else(|| ExchangeError::Connection("no script left".into()))?;
            Ok(Box::new(ScriptedTransport {
                frames: script.into_iter().collect(),
                sent: self.sent.clone(),
            }))
        }
    }
}
