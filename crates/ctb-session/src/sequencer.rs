//! The fixed sync exchange over one connection.

use chrono::{DateTime, Utc};
use ctb_transport::{connect, Connection, Connector, Endpoint};
use ctb_wire::PayloadType;
use serde_json::json;
use tracing::info;

use crate::{
    error::{Step, SyncError},
    metadata,
    options::SessionOptions,
    pagination,
    request::SyncRequest,
    result::SyncResult,
};

/// Run one sync: connect, exchange, close. The connection is closed before
/// this returns, whatever the outcome.
pub async fn run_sync(
    connector: &dyn Connector,
    endpoint: &Endpoint,
    req: &SyncRequest,
    opts: &SessionOptions,
) -> Result<SyncResult, SyncError> {
    info!(
        endpoint = %endpoint,
        account = req.ctid_account_id,
        from = %rfc3339(req.from_timestamp),
        to = %rfc3339(req.to_timestamp),
        "sync starting"
    );

    let conn = connect(connector, endpoint, opts.connect_timeout)
        .await
        .map_err(SyncError::at(Step::Connect))?;

    let outcome = exchange(&conn, req, opts).await;
    conn.close().await;

    match &outcome {
        Ok(r) => info!(deals = r.total, pages = r.pages, symbols = r.symbols.len(), "sync complete"),
        Err(e) => info!(error = %e, "sync failed"),
    }
    outcome
}

async fn exchange(
    conn: &Connection,
    req: &SyncRequest,
    opts: &SessionOptions,
) -> Result<SyncResult, SyncError> {
    conn.request(
        PayloadType::ApplicationAuthReq,
        json!({
            "clientId": req.client_id,
            "clientSecret": req.client_secret,
        }),
        PayloadType::ApplicationAuthRes,
        opts.auth_timeout,
    )
    .await
    .map_err(SyncError::at(Step::ApplicationAuth))?;

    conn.request(
        PayloadType::AccountAuthReq,
        json!({
            "ctidTraderAccountId": req.ctid_account_id,
            "accessToken": req.access_token,
        }),
        PayloadType::AccountAuthRes,
        opts.auth_timeout,
    )
    .await
    .map_err(SyncError::at(Step::AccountAuth))?;
    info!("authenticated");

    let mut symbols = metadata::load_symbol_list(conn, req, opts).await;
    let history = pagination::fetch_deals(conn, req, opts).await?;

    let mut lot_sizes = metadata::LotSizeTable::new();
    metadata::load_symbol_details(conn, req, opts, &history.deals, &mut symbols, &mut lot_sizes)
        .await;

    let total = history.deals.len();
    Ok(SyncResult {
        deals: history.deals,
        symbols,
        lot_sizes,
        pages: history.pages,
        total,
    })
}

fn rfc3339(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| format!("{ms}ms"))
}
