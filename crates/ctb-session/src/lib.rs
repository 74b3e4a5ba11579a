//! ctb-session: the sync exchange and its service boundary.
//!
//! [`Bridge::sync`] is the single operation callers use: it validates a raw
//! request, runs the fixed exchange (app auth, account auth, symbol list,
//! paginated deals, symbol detail) over one connection, and maps the outcome
//! to a [`SyncResponse`] that never carries a panic or an unhandled error.

pub mod boundary;
pub mod error;
pub mod metadata;
pub mod options;
pub mod pagination;
pub mod request;
pub mod result;
pub mod sequencer;

pub use boundary::{Bridge, FailureKind, SyncResponse};
pub use error::{Step, SyncError};
pub use options::SessionOptions;
pub use request::{RawSyncRequest, SyncRequest};
pub use result::SyncResult;
pub use sequencer::run_sync;
