//! Payload-type catalogue.
//!
//! The remote API dispatches on an integer `payloadType`. Only the codes the
//! bridge sends or reacts to are listed; anything else decodes fine and is
//! simply ignored by pending waits.

use std::borrow::Borrow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PayloadType {
    CommonErrorRes = 50,
    HeartbeatEvent = 51,
    ApplicationAuthReq = 2100,
    ApplicationAuthRes = 2101,
    AccountAuthReq = 2102,
    AccountAuthRes = 2103,
    SymbolsListReq = 2114,
    SymbolsListRes = 2115,
    SymbolByIdReq = 2116,
    SymbolByIdRes = 2117,
    DealListReq = 2133,
    DealListRes = 2134,
    ErrorRes = 2142,
}

impl PayloadType {
    pub const ALL: [PayloadType; 13] = [
        PayloadType::CommonErrorRes,
        PayloadType::HeartbeatEvent,
        PayloadType::ApplicationAuthReq,
        PayloadType::ApplicationAuthRes,
        PayloadType::AccountAuthReq,
        PayloadType::AccountAuthRes,
        PayloadType::SymbolsListReq,
        PayloadType::SymbolsListRes,
        PayloadType::SymbolByIdReq,
        PayloadType::SymbolByIdRes,
        PayloadType::DealListReq,
        PayloadType::DealListRes,
        PayloadType::ErrorRes,
    ];

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.code() == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PayloadType::CommonErrorRes => "COMMON_ERROR_RES",
            PayloadType::HeartbeatEvent => "HEARTBEAT_EVENT",
            PayloadType::ApplicationAuthReq => "APPLICATION_AUTH_REQ",
            PayloadType::ApplicationAuthRes => "APPLICATION_AUTH_RES",
            PayloadType::AccountAuthReq => "ACCOUNT_AUTH_REQ",
            PayloadType::AccountAuthRes => "ACCOUNT_AUTH_RES",
            PayloadType::SymbolsListReq => "SYMBOLS_LIST_REQ",
            PayloadType::SymbolsListRes => "SYMBOLS_LIST_RES",
            PayloadType::SymbolByIdReq => "SYMBOL_BY_ID_REQ",
            PayloadType::SymbolByIdRes => "SYMBOL_BY_ID_RES",
            PayloadType::DealListReq => "DEAL_LIST_REQ",
            PayloadType::DealListRes => "DEAL_LIST_RES",
            PayloadType::ErrorRes => "ERROR_RES",
        }
    }

    /// Error-type codes reject whatever wait is pending.
    pub fn is_error_code(code: u32) -> bool {
        code == PayloadType::ErrorRes.code() || code == PayloadType::CommonErrorRes.code()
    }

    pub fn is_heartbeat_code(code: u32) -> bool {
        code == PayloadType::HeartbeatEvent.code()
    }

    /// Human-readable label for any code, known or not. Used in logs and
    /// timeout messages.
    pub fn describe(code: impl Borrow<u32>) -> String {
        let code = *code.borrow();
        match Self::from_code(code) {
            Some(p) => format!("{}({})", p.as_str(), code),
            None => format!("UNKNOWN({code})"),
        }
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.as_str(), self.code())
    }
}
