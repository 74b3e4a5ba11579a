//! Request/response correlation over one link.
//!
//! A [`Connection`] owns a reader task that decodes inbound messages and
//! dispatches them to pending waits. Each wait is a oneshot slot keyed by the
//! payload type it wants:
//! - a message of the wanted type resolves the slot;
//! - an error-type message rejects every pending slot;
//! - anything else (heartbeats, unrelated responses) is ignored.
//!
//! Slots are registered with [`Connection::expect`] **before** the triggering
//! send, and a drop guard on [`PendingWait`] deregisters them exactly once,
//! whether the wait resolved, failed, timed out, or was cancelled.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use ctb_wire::{fields, PayloadType, ProtoMessage};
use serde_json::Value;
use tokio::{
    sync::{oneshot, Mutex as AsyncMutex},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, info, trace, warn};

use crate::transport::{Connector, Endpoint, FrameSink, FrameSource, Link, TransportError};

/// Bound on a plain [`Connection::send`]. Requests use their own budget.
const SEND_TIMEOUT: Duration = Duration::from_secs(15);
/// Grace for the sink's shutdown in [`Connection::close`].
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type Slot = oneshot::Sender<Result<ProtoMessage, TransportError>>;

#[derive(Default)]
struct Waits {
    by_type: HashMap<u32, (u64, Slot)>,
    /// Set once the inbound stream has ended; later waits fail immediately.
    closed: bool,
}

#[derive(Default)]
struct Shared {
    waits: Mutex<Waits>,
    next_id: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Waits> {
        self.waits.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// connect
// ---------------------------------------------------------------------------

/// Open a connection through `connector`, bounded by `timeout`.
///
/// On expiry the in-flight attempt is dropped, which aborts the TCP/TLS
/// handshake, and [`TransportError::ConnectTimeout`] is returned.
pub async fn connect(
    connector: &dyn Connector,
    endpoint: &Endpoint,
    timeout: Duration,
) -> Result<Connection, TransportError> {
    debug!(%endpoint, timeout_ms = timeout.as_millis() as u64, "connecting");
    match tokio::time::timeout(timeout, connector.open(endpoint)).await {
        Ok(Ok(link)) => {
            info!(%endpoint, "connected");
            Ok(Connection::new(link, endpoint.clone()))
        }
        Ok(Err(e)) => Err(e),
        Err(_) => Err(TransportError::ConnectTimeout {
            endpoint: endpoint.to_string(),
            after_ms: timeout.as_millis() as u64,
        }),
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// One open link plus its correlator state. Owned by exactly one sync.
pub struct Connection {
    endpoint: Endpoint,
    sink: AsyncMutex<Box<dyn FrameSink>>,
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Connection {
    pub fn new(link: Link, endpoint: Endpoint) -> Self {
        let shared = Arc::new(Shared::default());
        let reader = tokio::spawn(read_loop(link.source, Arc::clone(&shared)));
        Self {
            endpoint,
            sink: AsyncMutex::new(link.sink),
            shared,
            reader: Mutex::new(Some(reader)),
            closed: AtomicBool::new(false),
        }
    }

    /// Write one message. Does not wait for any response. A peer that stops
    /// reading fails the write after [`SEND_TIMEOUT`].
    pub async fn send(&self, payload_type: PayloadType, payload: Value) -> Result<(), TransportError> {
        match tokio::time::timeout(SEND_TIMEOUT, self.write(payload_type, payload)).await {
            Ok(sent) => sent,
            Err(_) => {
                warn!(payload_type = %payload_type, timeout_ms = SEND_TIMEOUT.as_millis() as u64, "write timed out");
                Err(TransportError::Send(format!(
                    "write of {payload_type} timed out after {}ms",
                    SEND_TIMEOUT.as_millis()
                )))
            }
        }
    }

    async fn write(&self, payload_type: PayloadType, payload: Value) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed);
        }
        let msg = ProtoMessage::outbound(payload_type, payload);
        trace!(payload_type = %payload_type, client_msg_id = ?msg.client_msg_id, "send");
        self.sink.lock().await.send(&msg).await
    }

    /// Register a wait for the next message of `want`.
    pub fn expect(&self, want: PayloadType) -> Result<PendingWait, TransportError> {
        let code = want.code();
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        let mut waits = self.shared.lock();
        if waits.closed {
            return Err(TransportError::ConnectionClosed);
        }
        if waits.by_type.contains_key(&code) {
            return Err(TransportError::DuplicateWait(code));
        }
        waits.by_type.insert(code, (id, tx));
        drop(waits);

        Ok(PendingWait {
            rx: Some(rx),
            guard: WaitGuard {
                shared: Arc::clone(&self.shared),
                code,
                id,
            },
        })
    }

    /// Register for `want`, send the request, and wait for the answer. The
    /// write and the wait share one `timeout`.
    pub async fn request(
        &self,
        payload_type: PayloadType,
        payload: Value,
        want: PayloadType,
        timeout: Duration,
    ) -> Result<ProtoMessage, TransportError> {
        let deadline = Instant::now() + timeout;
        let wait = self.expect(want)?;
        match tokio::time::timeout_at(deadline, self.write(payload_type, payload)).await {
            Ok(sent) => sent?,
            Err(_) => return Err(wait.expired(timeout)),
        }
        wait.wait_until(deadline, timeout).await
    }

    /// Number of waits currently registered.
    pub fn pending_waits(&self) -> usize {
        self.shared.lock().by_type.len()
    }

    /// Shut the link down. Idempotent; later calls are no-ops.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let shutdown = async { self.sink.lock().await.close().await };
        if tokio::time::timeout(CLOSE_TIMEOUT, shutdown).await.is_err() {
            debug!(endpoint = %self.endpoint, "sink shutdown timed out");
        }
        self.stop_reader();
        fail_all(&self.shared, TransportError::ConnectionClosed);
        debug!(endpoint = %self.endpoint, "connection closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn stop_reader(&self) {
        let handle = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(h) = handle {
            h.abort();
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // close() is async; dropping without it still stops the reader and
        // releases the read half. The write half goes with `sink`.
        self.stop_reader();
    }
}

// ---------------------------------------------------------------------------
// PendingWait
// ---------------------------------------------------------------------------

/// A registered wait. Consumed by [`PendingWait::wait`]; dropping it
/// unregisters the slot.
pub struct PendingWait {
    rx: Option<oneshot::Receiver<Result<ProtoMessage, TransportError>>>,
    guard: WaitGuard,
}

impl PendingWait {
    pub async fn wait(self, timeout: Duration) -> Result<ProtoMessage, TransportError> {
        self.wait_until(Instant::now() + timeout, timeout).await
    }

    /// `budget` is what the caller asked for; it is reported on expiry.
    async fn wait_until(
        mut self,
        deadline: Instant,
        budget: Duration,
    ) -> Result<ProtoMessage, TransportError> {
        let Some(rx) = self.rx.take() else {
            return Err(TransportError::ConnectionClosed);
        };
        match tokio::time::timeout_at(deadline, rx).await {
            Ok(Ok(outcome)) => outcome,
            // Sender dropped without an answer: the reader task is gone.
            Ok(Err(_)) => Err(TransportError::ConnectionClosed),
            Err(_) => Err(self.expired(budget)),
        }
    }

    fn expired(&self, budget: Duration) -> TransportError {
        debug!(
            awaited = %PayloadType::describe(self.guard.code),
            timeout_ms = budget.as_millis() as u64,
            "wait timed out"
        );
        TransportError::Timeout {
            awaited: self.guard.code,
            after_ms: budget.as_millis() as u64,
        }
    }
}

struct WaitGuard {
    shared: Arc<Shared>,
    code: u32,
    id: u64,
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        let mut waits = self.shared.lock();
        // Only remove our own registration; the slot may already have been
        // taken by the reader, and a newer wait may now own this type.
        if waits
            .by_type
            .get(&self.code)
            .is_some_and(|(id, _)| *id == self.id)
        {
            waits.by_type.remove(&self.code);
        }
    }
}

// ---------------------------------------------------------------------------
// Reader task
// ---------------------------------------------------------------------------

async fn read_loop(mut source: Box<dyn FrameSource>, shared: Arc<Shared>) {
    while let Some(msg) = source.recv().await {
        dispatch(&shared, msg);
    }
    debug!("inbound stream ended");
    fail_all(&shared, TransportError::ConnectionClosed);
}

fn dispatch(shared: &Shared, msg: ProtoMessage) {
    let code = msg.payload_type;

    if PayloadType::is_heartbeat_code(code) {
        trace!("heartbeat");
        return;
    }

    if PayloadType::is_error_code(code) {
        let (error_code, detail) = remote_error_detail(&msg.payload);
        let mut waits = shared.lock();
        if waits.by_type.is_empty() {
            warn!(detail = %detail, "remote error with no pending wait");
            return;
        }
        for (want, (_, slot)) in waits.by_type.drain() {
            debug!(awaited = %PayloadType::describe(want), detail = %detail, "wait rejected by remote error");
            let _ = slot.send(Err(TransportError::Remote {
                code: error_code.clone(),
                detail: detail.clone(),
            }));
        }
        return;
    }

    let slot = shared.lock().by_type.remove(&code);
    match slot {
        Some((_, slot)) => {
            let _ = slot.send(Ok(msg));
        }
        None => debug!(payload_type = %PayloadType::describe(code), "ignoring message with no pending wait"),
    }
}

fn fail_all(shared: &Shared, err: TransportError) {
    let mut waits = shared.lock();
    waits.closed = true;
    for (_, (_, slot)) in waits.by_type.drain() {
        let _ = slot.send(Err(err.clone()));
    }
}

/// Error code and the most useful description in an error payload.
///
/// Prefers `description`, then `errorCode`, then the raw payload.
pub fn remote_error_detail(payload: &Value) -> (Option<String>, String) {
    let code = fields::text_field(payload, &["errorCode", "error_code"]);
    let detail = fields::text_field(payload, &["description", "message"])
        .or_else(|| code.clone())
        .unwrap_or_else(|| payload.to_string());
    (code, detail)
}
