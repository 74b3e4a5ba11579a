//! In-memory connectors and a scripted fake upstream for tests.
//!
//! The fake speaks the real codecs over a `tokio::io::duplex` pipe, so tests
//! exercise framing, reassembly and correlation exactly as production does.
//! Only compiled with the `testkit` feature.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use async_trait::async_trait;
use ctb_wire::{Framing, PayloadType, ProtoMessage};
use serde_json::Value;
use tokio::io::{duplex, DuplexStream};

use crate::{
    tcp, ws,
    transport::{Connector, Endpoint, Link, TransportError},
};

const PIPE_CAPACITY: usize = 256 * 1024;

/// Create a connector that hands out one end of a pipe and the fake server
/// holding the other end.
pub fn fake_upstream(framing: Framing) -> (DuplexConnector, FakeServer) {
    let (client, server) = duplex(PIPE_CAPACITY);
    (
        DuplexConnector {
            framing,
            stream: Mutex::new(Some(client)),
            opens: AtomicUsize::new(0),
        },
        FakeServer {
            framing,
            pending: Some(server),
            link: None,
        },
    )
}

pub fn test_endpoint(framing: Framing) -> Endpoint {
    Endpoint::new("fake.upstream", framing)
}

// ---------------------------------------------------------------------------
// Connectors
// ---------------------------------------------------------------------------

/// Connects once to the paired [`FakeServer`].
pub struct DuplexConnector {
    framing: Framing,
    stream: Mutex<Option<DuplexStream>>,
    opens: AtomicUsize,
}

impl DuplexConnector {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for DuplexConnector {
    async fn open(&self, endpoint: &Endpoint) -> Result<Link, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let io = self
            .stream
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| TransportError::Connect {
                endpoint: endpoint.to_string(),
                message: "fake upstream already used".to_string(),
            })?;
        match self.framing {
            Framing::LengthPrefixed => Ok(tcp::length_prefixed(io)),
            Framing::SelfFramed => {
                let (ws, _) = tokio_tungstenite::client_async("ws://fake.upstream/", io)
                    .await
                    .map_err(|e| TransportError::Connect {
                        endpoint: endpoint.to_string(),
                        message: e.to_string(),
                    })?;
                Ok(ws::self_framed(ws))
            }
        }
    }
}

/// Never finishes connecting.
#[derive(Default)]
pub struct HangingConnector;

#[async_trait]
impl Connector for HangingConnector {
    async fn open(&self, _endpoint: &Endpoint) -> Result<Link, TransportError> {
        std::future::pending().await
    }
}

/// Always refuses, counting attempts.
#[derive(Default)]
pub struct RefusingConnector {
    opens: AtomicUsize,
}

impl RefusingConnector {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for RefusingConnector {
    async fn open(&self, endpoint: &Endpoint) -> Result<Link, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::Connect {
            endpoint: endpoint.to_string(),
            message: "connection refused".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// FakeServer
// ---------------------------------------------------------------------------

/// Server end of a [`fake_upstream`] pipe.
///
/// The WebSocket handshake is answered lazily on first use, so a test must
/// drive the server (typically from a spawned task) while the client
/// connects.
pub struct FakeServer {
    framing: Framing,
    pending: Option<DuplexStream>,
    link: Option<Link>,
}

impl FakeServer {
    async fn link(&mut self) -> &mut Link {
        if self.link.is_none() {
            let io = self.pending.take().expect("fake server stream already consumed");
            let link = match self.framing {
                Framing::LengthPrefixed => tcp::length_prefixed(io),
                Framing::SelfFramed => {
                    let ws = tokio_tungstenite::accept_async(io)
                        .await
                        .expect("fake server websocket accept");
                    ws::self_framed(ws)
                }
            };
            self.link = Some(link);
        }
        self.link.as_mut().expect("link initialised above")
    }

    /// Next client message, `None` once the client has closed.
    pub async fn recv(&mut self) -> Option<ProtoMessage> {
        self.link().await.source.recv().await
    }

    /// Next client message, asserting its type.
    pub async fn expect(&mut self, want: PayloadType) -> ProtoMessage {
        let msg = self
            .recv()
            .await
            .unwrap_or_else(|| panic!("client closed while server expected {want}"));
        assert_eq!(
            msg.payload_type,
            want.code(),
            "server expected {want}, got {}",
            PayloadType::describe(msg.payload_type)
        );
        msg
    }

    pub async fn send_message(&mut self, msg: ProtoMessage) {
        self.link()
            .await
            .sink
            .send(&msg)
            .await
            .expect("fake server send");
    }

    /// Send an unsolicited message of type `code`.
    pub async fn push(&mut self, code: u32, payload: Value) {
        self.send_message(ProtoMessage {
            payload_type: code,
            client_msg_id: None,
            payload,
        })
        .await;
    }

    /// Answer `request`, echoing its client message id.
    pub async fn reply(&mut self, request: &ProtoMessage, payload_type: PayloadType, payload: Value) {
        self.send_message(ProtoMessage {
            payload_type: payload_type.code(),
            client_msg_id: request.client_msg_id.clone(),
            payload,
        })
        .await;
    }

    /// Read until the client closes; returns any messages it still sent.
    pub async fn drain_until_closed(&mut self) -> Vec<ProtoMessage> {
        let mut rest = Vec::new();
        while let Some(m) = self.recv().await {
            rest.push(m);
        }
        rest
    }

    /// Close the server side of the pipe.
    pub async fn hang_up(&mut self) {
        self.link().await.sink.close().await;
    }
}
