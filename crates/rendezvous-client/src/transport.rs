//! Transport seam: message-framed operation exchange plus the connector
//! abstraction the reconnect loop re-enters after every disconnect.

use std::future::Future;
use std::io;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::warn;

use rendezvous_wire::{self as wire, Operation};

/// A bidirectional, message-framed connection to the signaling server.
///
/// One operation per frame. `recv` returns `Ok(None)` on clean close and
/// `Err` on transport failure; malformed frames are dropped inside `recv`
/// and never end the connection.
pub trait SignalTransport: Send + Sync {
    /// Send one operation.
    fn send(&self, op: &Operation) -> impl Future<Output = io::Result<()>> + Send;

    /// Receive the next operation.
    ///
    /// Only the client's reaction loop calls this; concurrent callers would
    /// compete for inbound frames.
    fn recv(&self) -> impl Future<Output = io::Result<Option<Operation>>> + Send;

    /// Forcibly terminate the connection.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// A factory that creates new connections on demand.
///
/// Called on initial connect and after each disconnect.
pub trait Connector: Send + Sync + 'static {
    /// The transport type produced by this connector.
    type Transport: SignalTransport;

    /// Establish a new connection.
    fn connect(&self) -> impl Future<Output = io::Result<Self::Transport>> + Send;
}

/// WebSocket transport carrying one JSON-encoded operation per text frame.
pub struct WsTransport<S> {
    /// Write half (async mutex for holding across awaits).
    sink: AsyncMutex<SplitSink<WebSocketStream<S>, WsMessage>>,
    /// Read half (async mutex for holding across awaits).
    stream: AsyncMutex<SplitStream<WebSocketStream<S>>>,
}

impl<S> WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an established WebSocket stream.
    pub fn new(ws: WebSocketStream<S>) -> Self {
        let (sink, stream) = ws.split();
        Self {
            sink: AsyncMutex::new(sink),
            stream: AsyncMutex::new(stream),
        }
    }
}

impl<S> SignalTransport for WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + Sync,
{
    async fn send(&self, op: &Operation) -> io::Result<()> {
        let text = wire::encode(op).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let mut sink = self.sink.lock().await;
        sink.send(WsMessage::Text(text.into()))
            .await
            .map_err(|e| io::Error::other(format!("websocket send: {e}")))
    }

    async fn recv(&self) -> io::Result<Option<Operation>> {
        let mut stream = self.stream.lock().await;

        loop {
            let msg = match stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => return Err(io::Error::other(format!("websocket recv: {e}"))),
                None => return Ok(None),
            };

            match msg {
                WsMessage::Text(text) => match wire::decode(&text) {
                    Ok(op) => return Ok(Some(op)),
                    Err(error) => {
                        // Malformed frame: drop it, connection stays open.
                        warn!(%error, len = text.len(), "dropping undecodable frame");
                        continue;
                    }
                },
                WsMessage::Binary(data) => {
                    warn!(len = data.len(), "dropping unexpected binary frame");
                    continue;
                }
                WsMessage::Close(_) => return Ok(None),
                WsMessage::Ping(data) => {
                    let mut sink = self.sink.lock().await;
                    let _ = sink.send(WsMessage::Pong(data)).await;
                    continue;
                }
                WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
            }
        }
    }

    async fn close(&self) {
        let mut sink = self.sink.lock().await;
        let _ = sink.send(WsMessage::Close(None)).await;
    }
}

/// Connector for a `ws://`/`wss://` signaling-server address.
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The server address this connector dials.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connector for WsConnector {
    type Transport = WsTransport<MaybeTlsStream<TcpStream>>;

    async fn connect(&self) -> io::Result<Self::Transport> {
        let (ws, _response) = connect_async(&self.url)
            .await
            .map_err(|e| io::Error::other(format!("connect {}: {e}", self.url)))?;
        Ok(WsTransport::new(ws))
    }
}
