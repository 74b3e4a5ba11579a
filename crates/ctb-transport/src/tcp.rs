//! Length-prefixed framing over a TLS TCP stream.

use std::collections::VecDeque;

use async_trait::async_trait;
use ctb_wire::{encode_length_prefixed, LengthPrefixedDecoder, ProtoMessage};
use rustls::pki_types::ServerName;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf},
    net::TcpStream,
};
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::{
    tls,
    transport::{connect_error, Endpoint, FrameSink, FrameSource, Link, TransportError},
};

const READ_CHUNK: usize = 16 * 1024;

/// TCP connect + TLS handshake, then wrap in the length-prefixed codec.
pub async fn open_tls(endpoint: &Endpoint) -> Result<Link, TransportError> {
    let tcp = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
        .await
        .map_err(|e| connect_error(endpoint, e))?;
    if let Err(e) = tcp.set_nodelay(true) {
        debug!(error = %e, "set_nodelay failed");
    }

    let server_name =
        ServerName::try_from(endpoint.host.clone()).map_err(|e| connect_error(endpoint, e))?;
    let stream = TlsConnector::from(tls::client_config())
        .connect(server_name, tcp)
        .await
        .map_err(|e| connect_error(endpoint, e))?;

    debug!(%endpoint, "tls stream established");
    Ok(length_prefixed(stream))
}

/// Wrap any byte stream in the length-prefixed codec.
pub fn length_prefixed<S>(stream: S) -> Link
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (rd, wr) = tokio::io::split(stream);
    Link {
        sink: Box::new(LengthPrefixedSink { wr }),
        source: Box::new(LengthPrefixedSource {
            rd,
            decoder: LengthPrefixedDecoder::new(),
            ready: VecDeque::new(),
            buf: vec![0u8; READ_CHUNK].into_boxed_slice(),
        }),
    }
}

struct LengthPrefixedSink<S> {
    wr: WriteHalf<S>,
}

#[async_trait]
impl<S> FrameSink for LengthPrefixedSink<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn send(&mut self, msg: &ProtoMessage) -> Result<(), TransportError> {
        let bytes = encode_length_prefixed(msg)?;
        self.wr
            .write_all(&bytes)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;
        self.wr
            .flush()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.wr.shutdown().await {
            debug!(error = %e, "shutdown failed");
        }
    }
}

struct LengthPrefixedSource<S> {
    rd: ReadHalf<S>,
    decoder: LengthPrefixedDecoder,
    ready: VecDeque<ProtoMessage>,
    buf: Box<[u8]>,
}

#[async_trait]
impl<S> FrameSource for LengthPrefixedSource<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn recv(&mut self) -> Option<ProtoMessage> {
        loop {
            if let Some(m) = self.ready.pop_front() {
                return Some(m);
            }
            let n = match self.rd.read(&mut self.buf).await {
                Ok(0) => return None,
                Ok(n) => n,
                Err(e) => {
                    debug!(error = %e, "read failed; treating stream as closed");
                    return None;
                }
            };
            self.ready.extend(self.decoder.push(&self.buf[..n]));
        }
    }
}
