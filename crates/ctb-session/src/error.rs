use std::fmt;

use ctb_transport::TransportError;

/// Exchange step a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Connect,
    ApplicationAuth,
    AccountAuth,
    SymbolList,
    Deals { page: usize },
    SymbolDetail,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Connect => f.write_str("connect"),
            Step::ApplicationAuth => f.write_str("application auth"),
            Step::AccountAuth => f.write_str("account auth"),
            Step::SymbolList => f.write_str("symbol list"),
            Step::Deals { page } => write!(f, "deal page {page}"),
            Step::SymbolDetail => f.write_str("symbol detail"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Required request fields absent or empty. Detected before connecting.
    #[error("missing required fields: {}", .0.join(", "))]
    Validation(Vec<&'static str>),

    #[error("{step} failed: {source}")]
    Step {
        step: Step,
        #[source]
        source: TransportError,
    },
}

impl SyncError {
    pub fn at(step: Step) -> impl FnOnce(TransportError) -> SyncError {
        move |source| SyncError::Step { step, source }
    }

    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            SyncError::Step { source, .. } => Some(source),
            SyncError::Validation(_) => None,
        }
    }
}
