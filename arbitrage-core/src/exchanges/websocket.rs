//! Stream transports: WebSocket and server-sent events behind one interface

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};
use url::Url;

use super::connector::{Endpoint, TransportKind};
use super::errors::{ExchangeError, ExchangeResult};

/// An open, text-oriented stream to a source
#[async_trait]
pub trait Transport: Send {
    async fn send_text(&mut self, text: String) -> ExchangeResult<()>;

    /// Next application payload; `Ok(None)` means the peer closed the stream
    async fn next_text(&mut self) -> ExchangeResult<Option<String>>;

    /// Keep the connection alive, with the venue's heartbeat text if it has one
    async fn keepalive(&mut self, heartbeat: Option<&str>) -> ExchangeResult<()>;

    async fn close(&mut self);
}

/// Opens transports; swapped for a scripted dialer in tests
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, endpoint: &Endpoint) -> ExchangeResult<Box<dyn Transport>>;
}

pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WebSocketTransport {
    pub async fn connect(url: &str) -> ExchangeResult<Self> {
        let url = Url::parse(url)?;
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| ExchangeError::Connection(format!("WebSocket connection failed: {}", e)))?;
        Ok(Self { stream })
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send_text(&mut self, text: String) -> ExchangeResult<()> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn next_text(&mut self) -> ExchangeResult<Option<String>> {
        while let Some(frame) = self.stream.next().await {
            match frame? {
                Message::Text(text) => return Ok(Some(text)),
                Message::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => return Ok(Some(text)),
                    Err(e) => return Err(ExchangeError::parse(format!("non-UTF-8 binary frame: {}", e))),
                },
                Message::Close(frame) => {
                    debug!("Close frame received: {:?}", frame);
                    return Ok(None);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                    trace!("Control frame");
                }
            }
        }
        Ok(None)
    }

    async fn keepalive(&mut self, heartbeat: Option<&str>) -> ExchangeResult<()> {
        let message = match heartbeat {
            Some(text) => Message::Text(text.to_string()),
            None => Message::Ping(Vec::new()),
        };
        self.stream.send(message).await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("WebSocket close failed: {}", e);
        }
    }
}

/// Longest partial line held while waiting for its newline
const MAX_SSE_LINE: usize = 1 << 20;

/// Line-buffered reader over an HTTP `text/event-stream` body.
///
/// Only `data:` lines are surfaced. Empty data lines and the literal
/// `heartbeat` keep-alive are swallowed. A line growing past
/// `MAX_SSE_LINE` without a newline fails the stream.
pub struct SseTransport {
    body: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    buffer: Vec<u8>,
}

impl SseTransport {
    pub async fn connect(client: &reqwest::Client, url: &str) -> ExchangeResult<Self> {
        let url = Url::parse(url)?;
        let response = client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?
            .error_for_status()?;
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Ok(Self::from_stream(body))
    }

    pub fn from_stream(body: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>) -> Self {
        Self {
            body,
            buffer: Vec::new(),
        }
    }

    fn next_buffered_event(&mut self) -> Option<String> {
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(&['\n', '\r'][..]);
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if data.is_empty() || data == "heartbeat" {
                    continue;
                }
                return Some(data.to_string());
            }
        }
        None
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn send_text(&mut self, _text: String) -> ExchangeResult<()> {
        Err(ExchangeError::Connection(
            "server-sent event streams are read-only".to_string(),
        ))
    }

    async fn next_text(&mut self) -> ExchangeResult<Option<String>> {
        loop {
            if let Some(event) = self.next_buffered_event() {
                return Ok(Some(event));
            }
            if self.buffer.len() > MAX_SSE_LINE {
                let held = self.buffer.len();
                self.buffer.clear();
                return Err(ExchangeError::Connection(format!(
                    "event stream line exceeds {} bytes ({} buffered)",
                    MAX_SSE_LINE, held
                )));
            }
            match self.body.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }

    async fn keepalive(&mut self, _heartbeat: Option<&str>) -> ExchangeResult<()> {
        Ok(())
    }

    async fn close(&mut self) {
        self.buffer.clear();
    }
}

/// Dials real network endpoints
pub struct NetworkDialer {
    http: reqwest::Client,
}

impl NetworkDialer {
    pub fn new() -> ExchangeResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Dialer for NetworkDialer {
    async fn dial(&self, endpoint: &Endpoint) -> ExchangeResult<Box<dyn Transport>> {
        match endpoint.kind {
            TransportKind::WebSocket => {
                let transport = WebSocketTransport::connect(&endpoint.url).await?;
                Ok(Box::new(transport))
            }
            TransportKind::ServerSentEvents => {
                let transport = SseTransport::connect(&self.http, &endpoint.url).await?;
                Ok(Box::new(transport))
            }
        }
    }
}
