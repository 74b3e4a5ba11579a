//! Service boundary: raw request in, [`SyncResponse`] out.

use std::sync::Arc;

use ctb_config::BridgeConfig;
use ctb_transport::{Connector, Endpoint};
use serde::Serialize;
use tracing::{error, warn};

use crate::{
    error::SyncError, options::SessionOptions, request::RawSyncRequest, result::SyncResult,
    sequencer::run_sync,
};

/// Why a sync did not succeed. Not serialized; front ends use it to pick a
/// status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Validation,
    Upstream,
}

/// `{ ok:true, deals, symbols, lotSizes, pages, total }` or
/// `{ ok:false, error }`.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub result: Option<SyncResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub failure: Option<FailureKind>,
}

impl SyncResponse {
    pub fn success(result: SyncResult) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
            failure: None,
        }
    }

    pub fn failed(kind: FailureKind, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(error.into()),
            failure: Some(kind),
        }
    }
}

impl From<SyncError> for SyncResponse {
    fn from(e: SyncError) -> Self {
        let kind = match e {
            SyncError::Validation(_) => FailureKind::Validation,
            SyncError::Step { .. } => FailureKind::Upstream,
        };
        SyncResponse::failed(kind, e.to_string())
    }
}

/// Shared entry point for every front end. Cheap to clone; holds only
/// immutable configuration and the connector.
#[derive(Clone)]
pub struct Bridge {
    connector: Arc<dyn Connector>,
    config: Arc<BridgeConfig>,
    options: SessionOptions,
}

impl Bridge {
    pub fn new(connector: Arc<dyn Connector>, config: Arc<BridgeConfig>) -> Self {
        let options = SessionOptions::from(config.as_ref());
        Self {
            connector,
            config,
            options,
        }
    }

    /// Override the session tuning derived from the config.
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Endpoint for a request `host` (alias or literal hostname).
    pub fn endpoint_for(&self, host: &str) -> Endpoint {
        Endpoint::new(self.config.resolve_host(host), self.config.framing)
            .with_port(self.config.port())
    }

    /// Validate and run one sync. Validation failures never open a
    /// connection. The exchange runs on its own task so a panic inside it
    /// surfaces as a failed response.
    pub async fn sync(&self, raw: &RawSyncRequest) -> SyncResponse {
        let req = match raw.validate() {
            Ok(req) => req,
            Err(e) => {
                warn!(error = %e, "sync request rejected");
                return e.into();
            }
        };

        let endpoint = self.endpoint_for(&req.host);
        let connector = Arc::clone(&self.connector);
        let options = self.options.clone();
        let task = tokio::spawn(async move {
            run_sync(connector.as_ref(), &endpoint, &req, &options).await
        });

        match task.await {
            Ok(Ok(result)) => SyncResponse::success(result),
            Ok(Err(e)) => e.into(),
            Err(join) => {
                error!(error = %join, "sync task did not complete");
                SyncResponse::failed(FailureKind::Upstream, format!("sync aborted: {join}"))
            }
        }
    }
}
