//! ctb-transport: encrypted connections to the remote API and the
//! request/response correlator that runs on top of them.
//!
//! Layering:
//! - [`transport`]: the `FrameSink` / `FrameSource` capability pair, the
//!   [`Connector`] seam, endpoints and errors.
//! - [`tcp`] / [`ws`]: the two framing variants over TLS.
//! - [`correlator`]: [`Connection`], which owns one link and resolves
//!   pending waits by payload type.

pub mod correlator;
pub mod tcp;
pub mod tls;
pub mod transport;
pub mod ws;

#[cfg(feature = "testkit")]
pub mod testkit;

pub use correlator::{connect, Connection, PendingWait};
pub use transport::{Connector, Endpoint, FrameSink, FrameSource, Link, RemoteConnector, TransportError};
