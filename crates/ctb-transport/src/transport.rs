//! Transport boundary.
//!
//! A live connection is split into a write capability ([`FrameSink`]) and a
//! read capability ([`FrameSource`]). Both framing variants implement the
//! pair, so everything above this module is framing-agnostic.

use std::fmt;

use async_trait::async_trait;
use ctb_wire::{FrameError, Framing, PayloadType, ProtoMessage};

use crate::{tcp, ws};

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// Where to connect and which framing to speak there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub framing: Framing,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, framing: Framing) -> Self {
        Self {
            host: host.into(),
            port: framing.default_port(),
            framing,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.host, self.port, self.framing.as_str())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("connect to {endpoint} timed out after {after_ms}ms")]
    ConnectTimeout { endpoint: String, after_ms: u64 },

    #[error("connect to {endpoint} failed: {message}")]
    Connect { endpoint: String, message: String },

    #[error("timed out after {after_ms}ms waiting for {}", PayloadType::describe(.awaited))]
    Timeout { awaited: u32, after_ms: u64 },

    #[error("remote error: {detail}")]
    Remote { code: Option<String>, detail: String },

    #[error("connection closed")]
    ConnectionClosed,

    #[error("a wait for {} is already pending", PayloadType::describe(.0))]
    DuplicateWait(u32),

    #[error("send failed: {0}")]
    Send(String),
}

impl From<FrameError> for TransportError {
    fn from(e: FrameError) -> Self {
        TransportError::Send(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Capability pair
// ---------------------------------------------------------------------------

/// Write half of a connection.
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, msg: &ProtoMessage) -> Result<(), TransportError>;

    /// Flush and shut down the write direction. Errors are not interesting
    /// at that point, so implementations swallow them.
    async fn close(&mut self);
}

/// Read half of a connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Next decoded message, or `None` once the stream has ended.
    async fn recv(&mut self) -> Option<ProtoMessage>;
}

/// A freshly opened connection, not yet wrapped by a correlator.
pub struct Link {
    pub sink: Box<dyn FrameSink>,
    pub source: Box<dyn FrameSource>,
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Opens links. Production uses [`RemoteConnector`]; tests substitute
/// in-memory connectors.
///
/// Implementations do not apply a timeout themselves; [`crate::connect`]
/// bounds the whole attempt and drops it on expiry.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, endpoint: &Endpoint) -> Result<Link, TransportError>;
}

/// Opens TLS connections to the real API, dispatching on the endpoint's
/// framing.
#[derive(Debug, Clone, Default)]
pub struct RemoteConnector;

#[async_trait]
impl Connector for RemoteConnector {
    async fn open(&self, endpoint: &Endpoint) -> Result<Link, TransportError> {
        match endpoint.framing {
            Framing::LengthPrefixed => tcp::open_tls(endpoint).await,
            Framing::SelfFramed => ws::open_wss(endpoint).await,
        }
    }
}

pub(crate) fn connect_error(endpoint: &Endpoint, e: impl fmt::Display) -> TransportError {
    TransportError::Connect {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_port_follows_framing() {
        let e = Endpoint::new("demo.example", Framing::SelfFramed);
        assert_eq!(e.port, 5036);
        assert_eq!(e.clone().with_port(9000).port, 9000);
        assert_eq!(e.to_string(), "demo.example:5036 (self_framed)");
    }

    #[test]
    fn timeout_error_names_the_awaited_type() {
        let e = TransportError::Timeout {
            awaited: PayloadType::DealListRes.code(),
            after_ms: 20_000,
        };
        assert_eq!(
            e.to_string(),
            "timed out after 20000ms waiting for DEAL_LIST_RES(2134)"
        );
    }
}
