//! Sync request: raw (as received) and validated.

use ctb_wire::fields;
use serde::Deserialize;
use serde_json::Value;

use crate::error::SyncError;

/// Request as it arrives from a caller. Every field is optional JSON so that
/// validation can report exactly which ones are missing, and numeric fields
/// may be numbers or numeric strings.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSyncRequest {
    pub host: Option<Value>,
    pub client_id: Option<Value>,
    pub client_secret: Option<Value>,
    pub access_token: Option<Value>,
    pub ctid_account_id: Option<Value>,
    pub from_timestamp: Option<Value>,
    pub to_timestamp: Option<Value>,
}

impl std::fmt::Debug for RawSyncRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawSyncRequest")
            .field("host", &self.host)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<REDACTED>"))
            .field("access_token", &self.access_token.as_ref().map(|_| "<REDACTED>"))
            .field("ctid_account_id", &self.ctid_account_id)
            .field("from_timestamp", &self.from_timestamp)
            .field("to_timestamp", &self.to_timestamp)
            .finish()
    }
}

/// A request with every required field present and typed.
#[derive(Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub host: String,
    pub client_id: String,
    pub client_secret: String,
    pub access_token: String,
    pub ctid_account_id: i64,
    /// Epoch milliseconds, inclusive lower bound for the first page.
    pub from_timestamp: i64,
    /// Epoch milliseconds, upper bound for every page.
    pub to_timestamp: i64,
}

impl std::fmt::Debug for SyncRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncRequest")
            .field("host", &self.host)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<REDACTED>")
            .field("access_token", &"<REDACTED>")
            .field("ctid_account_id", &self.ctid_account_id)
            .field("from_timestamp", &self.from_timestamp)
            .field("to_timestamp", &self.to_timestamp)
            .finish()
    }
}

impl RawSyncRequest {
    /// Check every required field; on failure the error lists all missing
    /// field names in declaration order.
    pub fn validate(&self) -> Result<SyncRequest, SyncError> {
        let mut missing = Vec::new();

        let host = text(&self.host, "host", &mut missing);
        let client_id = text(&self.client_id, "clientId", &mut missing);
        let client_secret = text(&self.client_secret, "clientSecret", &mut missing);
        let access_token = text(&self.access_token, "accessToken", &mut missing);
        let ctid_account_id = integer(&self.ctid_account_id, "ctidAccountId", &mut missing);
        let from_timestamp = integer(&self.from_timestamp, "fromTimestamp", &mut missing);
        let to_timestamp = integer(&self.to_timestamp, "toTimestamp", &mut missing);

        match (
            host,
            client_id,
            client_secret,
            access_token,
            ctid_account_id,
            from_timestamp,
            to_timestamp,
        ) {
            (
                Some(host),
                Some(client_id),
                Some(client_secret),
                Some(access_token),
                Some(ctid_account_id),
                Some(from_timestamp),
                Some(to_timestamp),
            ) => Ok(SyncRequest {
                host,
                client_id,
                client_secret,
                access_token,
                ctid_account_id,
                from_timestamp,
                to_timestamp,
            }),
            _ => Err(SyncError::Validation(missing)),
        }
    }
}

fn text(v: &Option<Value>, name: &'static str, missing: &mut Vec<&'static str>) -> Option<String> {
    let out = match v {
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(other) => fields::as_text(other),
        None => None,
    };
    if out.is_none() {
        missing.push(name);
    }
    out
}

fn integer(v: &Option<Value>, name: &'static str, missing: &mut Vec<&'static str>) -> Option<i64> {
    let out = v.as_ref().and_then(fields::as_i64);
    if out.is_none() {
        missing.push(name);
    }
    out
}
