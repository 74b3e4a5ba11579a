use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::metadata::{LotSizeTable, SymbolTable};

/// Aggregate returned by a successful sync. Deals are passed through as the
/// upstream sent them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub deals: Vec<Value>,
    pub symbols: SymbolTable,
    pub lot_sizes: LotSizeTable,
    pub pages: u32,
    pub total: usize,
}
