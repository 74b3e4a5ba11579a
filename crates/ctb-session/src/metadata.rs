//! Symbol names and lot sizes.
//!
//! Names come from the symbol list; lot sizes only from symbol detail, and
//! only for symbols that actually appear in the retrieved deals. Both steps
//! are best-effort: failures are logged and whatever was collected is kept.
//! Tables are write-once per key, so a detail name never replaces a listed
//! one.

use std::collections::{BTreeMap, HashSet};

use ctb_transport::Connection;
use ctb_wire::{fields, PayloadType};
use serde_json::{json, Number, Value};
use tracing::{debug, info, warn};

use crate::{
    error::{Step, SyncError},
    options::SessionOptions,
    request::SyncRequest,
};

pub type SymbolTable = BTreeMap<i64, String>;
pub type LotSizeTable = BTreeMap<i64, Number>;

const SYMBOL_LIST_KEYS: &[&str] = &["symbol", "symbols"];
const SYMBOL_ID_KEYS: &[&str] = &["symbolId", "id", "symbol_id"];
const SYMBOL_NAME_KEYS: &[&str] = &["symbolName", "name", "symbol_name"];
const LOT_SIZE_KEYS: &[&str] = &["lotSize", "lot_size"];
/// Deals carry their own `id`-like fields, so only explicit spellings count.
const DEAL_SYMBOL_KEYS: &[&str] = &["symbolId", "symbol_id"];

/// Add names from a symbol-list payload. Returns how many were new.
pub fn merge_symbol_list(symbols: &mut SymbolTable, payload: &Value) -> usize {
    let mut added = 0;
    for entry in fields::entries(payload, SYMBOL_LIST_KEYS) {
        let (Some(id), Some(name)) = (
            fields::i64_field(entry, SYMBOL_ID_KEYS),
            fields::text_field(entry, SYMBOL_NAME_KEYS),
        ) else {
            continue;
        };
        if let std::collections::btree_map::Entry::Vacant(slot) = symbols.entry(id) {
            slot.insert(name);
            added += 1;
        }
    }
    added
}

/// Record lot sizes from a symbol-detail payload and backfill names the
/// symbol table does not have yet. Returns how many lot sizes were new.
pub fn merge_symbol_details(
    symbols: &mut SymbolTable,
    lot_sizes: &mut LotSizeTable,
    payload: &Value,
) -> usize {
    let mut added = 0;
    for entry in fields::entries(payload, SYMBOL_LIST_KEYS) {
        let Some(id) = fields::i64_field(entry, SYMBOL_ID_KEYS) else {
            continue;
        };
        if let Some(lot) = fields::field(entry, LOT_SIZE_KEYS).and_then(fields::as_number) {
            if !lot_sizes.contains_key(&id) {
                lot_sizes.insert(id, lot);
                added += 1;
            }
        }
        if let Some(name) = fields::text_field(entry, SYMBOL_NAME_KEYS) {
            symbols.entry(id).or_insert(name);
        }
    }
    added
}

/// Distinct symbol ids referenced by `deals`, in first-seen order.
pub fn distinct_symbol_ids(deals: &[Value]) -> Vec<i64> {
    let mut seen = HashSet::new();
    deals
        .iter()
        .filter_map(|d| fields::i64_field(d, DEAL_SYMBOL_KEYS))
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Fetch the full symbol list. Never fails the sync.
pub async fn load_symbol_list(
    conn: &Connection,
    req: &SyncRequest,
    opts: &SessionOptions,
) -> SymbolTable {
    let mut symbols = SymbolTable::new();
    let res = conn
        .request(
            PayloadType::SymbolsListReq,
            json!({
                "ctidTraderAccountId": req.ctid_account_id,
                "includeArchivedSymbols": false,
            }),
            PayloadType::SymbolsListRes,
            opts.symbols_timeout,
        )
        .await
        .map_err(SyncError::at(Step::SymbolList));

    match res {
        Ok(msg) => {
            let added = merge_symbol_list(&mut symbols, &msg.payload);
            info!(symbols = added, "symbol list loaded");
        }
        Err(e) => warn!(error = %e, "symbol list unavailable; continuing without names"),
    }
    symbols
}

/// Fetch symbol detail for every symbol seen in `deals`, in chunks. A failed
/// chunk is logged and skipped; later chunks are still requested.
pub async fn load_symbol_details(
    conn: &Connection,
    req: &SyncRequest,
    opts: &SessionOptions,
    deals: &[Value],
    symbols: &mut SymbolTable,
    lot_sizes: &mut LotSizeTable,
) {
    let ids = distinct_symbol_ids(deals);
    if ids.is_empty() {
        debug!("no symbols referenced by deals; skipping symbol detail");
        return;
    }

    for (n, chunk) in ids.chunks(opts.detail_chunk.max(1)).enumerate() {
        let res = conn
            .request(
                PayloadType::SymbolByIdReq,
                json!({
                    "ctidTraderAccountId": req.ctid_account_id,
                    "symbolId": chunk,
                }),
                PayloadType::SymbolByIdRes,
                opts.detail_timeout,
            )
            .await
            .map_err(SyncError::at(Step::SymbolDetail));

        match res {
            Ok(msg) => {
                let added = merge_symbol_details(symbols, lot_sizes, &msg.payload);
                debug!(chunk = n, requested = chunk.len(), lot_sizes = added, "symbol detail chunk");
            }
            Err(e) => warn!(chunk = n, error = %e, "symbol detail chunk failed; keeping what we have"),
        }
    }
    info!(symbols = ids.len(), lot_sizes = lot_sizes.len(), "symbol detail loaded");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_backfills_names_without_overwriting() {
        let mut symbols = SymbolTable::from([(7, "EURUSD".to_string())]);
        let mut lots = LotSizeTable::new();
        let payload = json!({
            "symbol": [
                { "symbolId": 7, "name": "EURUSD_X", "lotSize": 100000 },
                { "symbolId": 9, "name": "GBPUSD", "lotSize": 100000 }
            ]
        });

        assert_eq!(merge_symbol_details(&mut symbols, &mut lots, &payload), 2);
        assert_eq!(
            symbols,
            SymbolTable::from([(7, "EURUSD".to_string()), (9, "GBPUSD".to_string())])
        );
        assert_eq!(
            lots,
            LotSizeTable::from([(7, Number::from(100000)), (9, Number::from(100000))])
        );
    }

    #[test]
    fn symbol_list_accepts_alternate_spellings() {
        let mut symbols = SymbolTable::new();
        let payload = json!({
            "symbols": [
                { "symbolId": "1", "symbolName": "EURUSD" },
                { "id": 2, "name": "GBPUSD" },
                { "symbol_id": 3, "symbol_name": "USDJPY" },
                { "symbolId": 4 },
                { "symbolName": "ORPHAN" }
            ]
        });
        assert_eq!(merge_symbol_list(&mut symbols, &payload), 3);
        assert_eq!(symbols.get(&1).map(String::as_str), Some("EURUSD"));
        assert_eq!(symbols.get(&2).map(String::as_str), Some("GBPUSD"));
        assert_eq!(symbols.get(&3).map(String::as_str), Some("USDJPY"));
    }

    #[test]
    fn symbol_list_is_write_once() {
        let mut symbols = SymbolTable::new();
        merge_symbol_list(&mut symbols, &json!({ "symbol": [{ "symbolId": 1, "symbolName": "A" }] }));
        let added =
            merge_symbol_list(&mut symbols, &json!({ "symbol": [{ "symbolId": 1, "symbolName": "B" }] }));
        assert_eq!(added, 0);
        assert_eq!(symbols[&1], "A");
    }

    #[test]
    fn lot_sizes_accept_strings_and_keep_first() {
        let mut symbols = SymbolTable::new();
        let mut lots = LotSizeTable::new();
        merge_symbol_details(
            &mut symbols,
            &mut lots,
            &json!({ "symbol": [{ "symbolId": "5", "lot_size": "10000" }] }),
        );
        merge_symbol_details(
            &mut symbols,
            &mut lots,
            &json!({ "symbol": [{ "symbolId": 5, "lotSize": 1 }] }),
        );
        assert_eq!(lots[&5], Number::from(10000));
        assert!(symbols.is_empty());
    }

    #[test]
    fn distinct_ids_keep_first_seen_order_and_skip_missing() {
        let deals = vec![
            json!({ "symbolId": 9 }),
            json!({ "symbolId": "7" }),
            json!({ "dealId": 3 }),
            json!({ "symbolId": 9 }),
        ];
        assert_eq!(distinct_symbol_ids(&deals), vec![9, 7]);
    }
}
