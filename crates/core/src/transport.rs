//! The socket seam between `SessionConnection` and a concrete WebSocket client.
//!
//! A [`Connector`] yields the two halves of an ordered, reliable message
//! channel. [`MemoryConnector`] is an in-process loopback implementation used
//! to drive sessions without a network.

use crate::error::TransportError;
use crate::protocol::Endpoint;
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;

/// Outbound half: accepts serialized text messages.
pub type OutboundSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;
/// Inbound half: yields frames in network order. Ends when the socket is gone.
pub type InboundStream = Pin<Box<dyn Stream<Item = Result<TransportFrame, TransportError>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFrame {
    Text(String),
    Binary(Vec<u8>),
    Close(Option<CloseInfo>),
}

/// Opens transports to provider endpoints.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        endpoint: Endpoint,
    ) -> Result<(OutboundSink, InboundStream), TransportError>;
}

/// In-process connector. Every successful `connect` hands a [`MemoryPeer`] to
/// the paired [`MemoryServer`].
pub struct MemoryConnector {
    accept_tx: Option<mpsc::UnboundedSender<MemoryPeer>>,
}

impl MemoryConnector {
    pub fn new() -> (Self, MemoryServer) {
        let (accept_tx, accept_rx) = mpsc::unbounded();
        (
            Self {
                accept_tx: Some(accept_tx),
            },
            MemoryServer { accept_rx },
        )
    }

    /// A connector whose every connection attempt is refused.
    pub fn unreachable() -> Self {
        Self { accept_tx: None }
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(
        &self,
        endpoint: Endpoint,
    ) -> Result<(OutboundSink, InboundStream), TransportError> {
        let accept_tx = self
            .accept_tx
            .as_ref()
            .ok_or_else(|| TransportError::Connect("connection refused".to_string()))?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded();
        let (inbound_tx, inbound_rx) = mpsc::unbounded();
        accept_tx
            .unbounded_send(MemoryPeer {
                endpoint,
                from_client: outbound_rx,
                to_client: inbound_tx,
            })
            .map_err(|_| TransportError::Connect("server is gone".to_string()))?;

        let sink = outbound_tx.sink_map_err(|e| TransportError::Socket(e.to_string()));
        Ok((Box::pin(sink), Box::pin(inbound_rx)))
    }
}

pub struct MemoryServer {
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryServer {
    /// Waits for the next client connection.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.next().await
    }
}

/// The server side of one in-memory connection.
pub struct MemoryPeer {
    pub endpoint: Endpoint,
    from_client: mpsc::UnboundedReceiver<String>,
    to_client: mpsc::UnboundedSender<Result<TransportFrame, TransportError>>,
}

impl MemoryPeer {
    /// Returns `false` once the client has dropped its inbound half.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.push(Ok(TransportFrame::Text(text.into())))
    }

    pub fn send_binary(&self, bytes: impl Into<Vec<u8>>) -> bool {
        self.push(Ok(TransportFrame::Binary(bytes.into())))
    }

    /// Sends a close frame and ends the inbound stream.
    pub fn close(&self, code: u16, reason: impl Into<String>) {
        self.push(Ok(TransportFrame::Close(Some(CloseInfo {
            code,
            reason: reason.into(),
        }))));
        self.to_client.close_channel();
    }

    /// Delivers a socket failure to the client.
    pub fn fail(&self, error: TransportError) -> bool {
        self.push(Err(error))
    }

    fn push(&self, frame: Result<TransportFrame, TransportError>) -> bool {
        self.to_client.unbounded_send(frame).is_ok()
    }

    /// Next message sent by the client; `None` once the client closed its sink.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.next().await
    }

    /// Non-blocking variant of [`recv`](Self::recv). `None` if nothing is pending.
    pub fn try_recv(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }

    /// True once the client closed or dropped its outbound sink. Discards any
    /// messages still pending.
    pub fn is_client_closed(&mut self) -> bool {
        loop {
            match self.from_client.try_recv() {
                Ok(_) => continue,
                Err(mpsc::TryRecvError::Closed) => return true,
                Err(mpsc::TryRecvError::Empty) => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn endpoint() -> Endpoint {
        Endpoint::new(Url::parse("wss://example.test/socket").unwrap())
    }

    #[tokio::test]
    async fn test_memory_connector_round_trip() {
        let (connector, mut server) = MemoryConnector::new();
        let (mut sink, mut stream) = connector.connect(endpoint()).await.unwrap();
        let mut peer = server.accept().await.unwrap();
        assert_eq!(peer.endpoint.url.host_str(), Some("example.test"));

        sink.send("hello".to_string()).await.unwrap();
        assert_eq!(peer.recv().await.as_deref(), Some("hello"));

        assert!(peer.send_text("world"));
        assert_eq!(
            stream.next().await,
            Some(Ok(TransportFrame::Text("world".to_string())))
        );

        peer.close(1000, "bye");
        assert!(matches!(
            stream.next().await,
            Some(Ok(TransportFrame::Close(Some(CloseInfo { code: 1000, .. }))))
        ));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_unreachable_connector_refuses() {
        let connector = MemoryConnector::unreachable();
        let result = connector.connect(endpoint()).await;
        assert!(matches!(result, Err(TransportError::Connect(_))));
    }

    #[tokio::test]
    async fn test_peer_sees_client_close() {
        let (connector, mut server) = MemoryConnector::new();
        let (mut sink, _stream) = connector.connect(endpoint()).await.unwrap();
        let mut peer = server.accept().await.unwrap();
        assert!(!peer.is_client_closed());
        sink.close().await.unwrap();
        assert!(peer.is_client_closed());
    }
}
