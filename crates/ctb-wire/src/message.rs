//! The protocol message envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::payload::PayloadType;

/// One protocol message as carried inside a frame.
///
/// `payload_type` stays a raw integer so messages with codes outside the
/// known catalogue still decode and can be ignored downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtoMessage {
    pub payload_type: u32,
    /// Absent on server-initiated messages such as heartbeats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_msg_id: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

impl ProtoMessage {
    /// Build an outbound message with a fresh client message id.
    pub fn outbound(payload_type: PayloadType, payload: Value) -> Self {
        Self {
            payload_type: payload_type.code(),
            client_msg_id: Some(Uuid::new_v4().to_string()),
            payload,
        }
    }

    pub fn kind(&self) -> Option<PayloadType> {
        PayloadType::from_code(self.payload_type)
    }

    pub fn is(&self, payload_type: PayloadType) -> bool {
        self.payload_type == payload_type.code()
    }
}
