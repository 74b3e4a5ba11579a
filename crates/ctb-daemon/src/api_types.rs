//! Response types for the daemon's own endpoints.
//!
//! `/v1/sync` answers with `ctb_session::SyncResponse` directly.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    /// Hash of the layered configuration the daemon booted with.
    pub config_hash: String,
}

// ---------------------------------------------------------------------------
// Refusals
// ---------------------------------------------------------------------------

/// Body for requests refused before a sync is attempted (bad secret,
/// unreadable body).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefusedResponse {
    pub ok: bool,
    pub error: String,
}

impl RefusedResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}
