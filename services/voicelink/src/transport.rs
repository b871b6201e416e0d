//! WebSocket transport backed by `tokio-tungstenite`.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt, future};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::HeaderValue,
        protocol::{CloseFrame, Message as WsMessage},
        Error as WsError,
    },
};
use tracing::{debug, info};
use voicelink_core::{Endpoint, TransportError};
use voicelink_core::transport::{CloseInfo, Connector, InboundStream, OutboundSink, TransportFrame};

#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        endpoint: Endpoint,
    ) -> Result<(OutboundSink, InboundStream), TransportError> {
        let mut request = endpoint
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        if !endpoint.subprotocols.is_empty() {
            let protocols = HeaderValue::from_str(&endpoint.subprotocols.join(", "))
                .map_err(|e| TransportError::Connect(e.to_string()))?;
            request.headers_mut().insert("Sec-WebSocket-Protocol", protocols);
        }

        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        info!(host = ?endpoint.url.host_str(), "WebSocket connected");

        let (ws_tx, ws_rx) = ws_stream.split();
        let sink = ws_tx
            .with(|text: String| future::ready(Ok::<_, WsError>(WsMessage::Text(text.into()))))
            .sink_map_err(|e| TransportError::Socket(e.to_string()));
        let stream = ws_rx.filter_map(|message| future::ready(frame_from_message(message)));

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

/// Maps a socket message to a session frame. Control frames are absorbed by
/// tungstenite and yield `None`.
fn frame_from_message(
    message: Result<WsMessage, WsError>,
) -> Option<Result<TransportFrame, TransportError>> {
    match message {
        Ok(WsMessage::Text(text)) => Some(Ok(TransportFrame::Text(text.as_str().to_owned()))),
        Ok(WsMessage::Binary(bytes)) => Some(Ok(TransportFrame::Binary(bytes.to_vec()))),
        Ok(WsMessage::Close(frame)) => Some(Ok(TransportFrame::Close(frame.map(close_info)))),
        Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_)) => None,
        Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {
            debug!("Socket already closed");
            None
        }
        Err(e) => Some(Err(TransportError::Socket(e.to_string()))),
    }
}

fn close_info(frame: CloseFrame) -> CloseInfo {
    CloseInfo {
        code: u16::from(frame.code),
        reason: frame.reason.as_str().to_owned(),
    }
}
