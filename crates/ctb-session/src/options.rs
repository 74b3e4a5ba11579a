use std::time::Duration;

use ctb_config::BridgeConfig;

/// Per-sync limits and timeouts.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub connect_timeout: Duration,
    pub auth_timeout: Duration,
    pub symbols_timeout: Duration,
    pub deals_timeout: Duration,
    pub detail_timeout: Duration,
    pub max_rows: usize,
    pub max_pages: usize,
    pub detail_chunk: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&BridgeConfig::default())
    }
}

impl From<&BridgeConfig> for SessionOptions {
    fn from(cfg: &BridgeConfig) -> Self {
        Self {
            connect_timeout: cfg.timeouts.connect(),
            auth_timeout: cfg.timeouts.auth(),
            symbols_timeout: cfg.timeouts.symbols(),
            deals_timeout: cfg.timeouts.deals(),
            detail_timeout: cfg.timeouts.symbol_detail(),
            max_rows: cfg.paging.max_rows,
            max_pages: cfg.paging.max_pages,
            detail_chunk: cfg.paging.detail_chunk,
        }
    }
}
