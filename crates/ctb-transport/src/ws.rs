//! Self-framed JSON messages over a TLS WebSocket.

use async_trait::async_trait;
use ctb_wire::{decode_text, encode_text, ProtoMessage};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};
use tracing::debug;

use crate::transport::{connect_error, Endpoint, FrameSink, FrameSource, Link, TransportError};

/// TCP connect, TLS handshake and WebSocket upgrade, then wrap.
pub async fn open_wss(endpoint: &Endpoint) -> Result<Link, TransportError> {
    let url = format!("wss://{}:{}", endpoint.host, endpoint.port);
    let (ws, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| connect_error(endpoint, e))?;

    debug!(%endpoint, "websocket established");
    Ok(self_framed(ws))
}

/// Wrap an established WebSocket in the self-framed codec.
pub fn self_framed<S>(ws: WebSocketStream<S>) -> Link
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sink, stream) = ws.split();
    Link {
        sink: Box::new(SelfFramedSink { sink }),
        source: Box::new(SelfFramedSource { stream }),
    }
}

struct SelfFramedSink<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
}

#[async_trait]
impl<S> FrameSink for SelfFramedSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&mut self, msg: &ProtoMessage) -> Result<(), TransportError> {
        let text = encode_text(msg)?;
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.sink.close().await {
            debug!(error = %e, "websocket close failed");
        }
    }
}

struct SelfFramedSource<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

#[async_trait]
impl<S> FrameSource for SelfFramedSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn recv(&mut self) -> Option<ProtoMessage> {
        while let Some(frame) = self.stream.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    if let Some(m) = decode_text(&text) {
                        return Some(m);
                    }
                }
                Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                    Ok(text) => {
                        if let Some(m) = decode_text(text) {
                            return Some(m);
                        }
                    }
                    Err(_) => debug!(len = bytes.len(), "dropping non-utf8 binary message"),
                },
                Ok(Message::Close(_)) => return None,
                // Ping/pong are answered by tungstenite itself.
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, "websocket read failed; treating stream as closed");
                    return None;
                }
            }
        }
        None
    }
}
