//! Shared daemon state.

use ctb_config::ResolvedSecret;
use ctb_session::Bridge;
use serde::Serialize;

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            service: "ctb-daemon",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Everything handlers need. Immutable after boot; shared as `Arc<AppState>`.
pub struct AppState {
    pub build: BuildInfo,
    pub bridge: Bridge,
    /// Callers must present this on `/v1/sync`.
    pub secret: ResolvedSecret,
    pub config_hash: String,
}

impl AppState {
    pub fn new(bridge: Bridge, secret: ResolvedSecret, config_hash: impl Into<String>) -> Self {
        Self {
            build: BuildInfo::default(),
            bridge,
            secret,
            config_hash: config_hash.into(),
        }
    }
}
