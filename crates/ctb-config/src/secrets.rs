//! Shared-secret resolution.
//!
//! # Contract
//! - Config YAML stores only the env var NAME (`secret_env`).
//! - The daemon calls [`resolve_shared_secret`] once at startup and passes
//!   the returned [`ResolvedSecret`] into its state. No other code reads the
//!   environment for it.
//! - `Debug` redacts the value; errors mention the NAME only.

use anyhow::{bail, Result};

use crate::BridgeConfig;

/// The shared secret gating every daemon route except liveness.
#[derive(Clone)]
pub struct ResolvedSecret {
    value: String,
}

impl std::fmt::Debug for ResolvedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecret")
            .field("value", &"<REDACTED>")
            .finish()
    }
}

impl ResolvedSecret {
    /// Wrap a known value. Blank values are refused.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            bail!("SECRETS_MISSING: shared secret is empty");
        }
        Ok(Self { value })
    }

    /// Constant-time comparison against a presented credential.
    pub fn matches(&self, presented: &str) -> bool {
        let a = self.value.as_bytes();
        let b = presented.as_bytes();
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

/// Read the secret from the env var named by `config.secret_env`.
///
/// # Errors
/// Returns `Err` naming the env var when it is unset or blank.
pub fn resolve_shared_secret(config: &BridgeConfig) -> Result<ResolvedSecret> {
    match std::env::var(&config.secret_env) {
        Ok(v) if !v.trim().is_empty() => ResolvedSecret::new(v),
        _ => bail!(
            "SECRETS_MISSING: required env var '{}' (shared secret) is not set or empty",
            config.secret_env
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_value() {
        let s = ResolvedSecret::new("hunter2-super-secret").unwrap();
        let dbg = format!("{s:?}");
        assert!(dbg.contains("<REDACTED>"));
        assert!(!dbg.contains("hunter2"));
    }

    #[test]
    fn matches_exact_value_only() {
        let s = ResolvedSecret::new("abc123").unwrap();
        assert!(s.matches("abc123"));
        assert!(!s.matches("abc124"));
        assert!(!s.matches("abc12"));
        assert!(!s.matches(""));
    }

    #[test]
    fn blank_secret_is_refused() {
        assert!(ResolvedSecret::new("   ").is_err());
    }
}
