//! Deal history pagination.
//!
//! Pages are requested with a moving `fromTimestamp` cursor. A full page
//! (exactly `max_rows` deals) means there may be more; the next cursor is one
//! past the latest execution timestamp seen on that page.

use ctb_transport::Connection;
use ctb_wire::{fields, PayloadType};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::{
    error::{Step, SyncError},
    options::SessionOptions,
    request::SyncRequest,
};

const DEAL_KEYS: &[&str] = &["deal", "deals"];
const TIMESTAMP_KEYS: &[&str] = &["executionTimestamp", "execution_timestamp", "createTimestamp"];

/// Deals gathered across all pages, in retrieval order.
#[derive(Debug, Default)]
pub struct DealPages {
    pub deals: Vec<Value>,
    /// Non-empty pages appended.
    pub pages: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Empty,
    Short,
    NoTimestamps,
    PastRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStep {
    Stop(StopReason),
    Continue { cursor: i64 },
}

/// Latest execution timestamp on a page.
pub fn max_timestamp(page: &[Value]) -> Option<i64> {
    page.iter().filter_map(|d| fields::i64_field(d, TIMESTAMP_KEYS)).max()
}

/// Decide what follows a full or partial page. A full page always moves the
/// cursor to one past its latest timestamp, even when that does not advance;
/// the page ceiling bounds a server that keeps repeating itself.
pub fn after_page(page: &[Value], max_rows: usize, to_ts: i64) -> PageStep {
    if page.is_empty() {
        return PageStep::Stop(StopReason::Empty);
    }
    if page.len() < max_rows {
        return PageStep::Stop(StopReason::Short);
    }
    let Some(latest) = max_timestamp(page) else {
        return PageStep::Stop(StopReason::NoTimestamps);
    };
    let next = latest.saturating_add(1);
    if next >= to_ts {
        return PageStep::Stop(StopReason::PastRange);
    }
    PageStep::Continue { cursor: next }
}

/// Fetch every deal in the request's range. Any page failure is fatal.
pub async fn fetch_deals(
    conn: &Connection,
    req: &SyncRequest,
    opts: &SessionOptions,
) -> Result<DealPages, SyncError> {
    let mut out = DealPages::default();
    let mut cursor = req.from_timestamp;

    for page_no in 1..=opts.max_pages {
        let msg = conn
            .request(
                PayloadType::DealListReq,
                json!({
                    "ctidTraderAccountId": req.ctid_account_id,
                    "fromTimestamp": cursor,
                    "toTimestamp": req.to_timestamp,
                    "maxRows": opts.max_rows,
                }),
                PayloadType::DealListRes,
                opts.deals_timeout,
            )
            .await
            .map_err(SyncError::at(Step::Deals { page: page_no }))?;

        let page = fields::entries(&msg.payload, DEAL_KEYS);
        debug!(page = page_no, cursor, rows = page.len(), "deal page");

        let step = after_page(page, opts.max_rows, req.to_timestamp);
        if !page.is_empty() {
            out.deals.extend_from_slice(page);
            out.pages += 1;
        }

        match step {
            PageStep::Continue { cursor: next } => {
                if next <= cursor {
                    debug!(page = page_no, cursor, "full deal page did not move the cursor");
                }
                cursor = next;
            }
            PageStep::Stop(reason) => {
                if reason == StopReason::NoTimestamps {
                    warn!(page = page_no, cursor, ?reason, "full deal page without a usable cursor; stopping");
                }
                info!(pages = out.pages, deals = out.deals.len(), ?reason, "deal history loaded");
                return Ok(out);
            }
        }
    }

    warn!(
        max_pages = opts.max_pages,
        cursor,
        deals = out.deals.len(),
        "deal page ceiling reached; history may be incomplete"
    );
    Ok(out)
}
