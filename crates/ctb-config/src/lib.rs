//! Bridge configuration.
//!
//! Configuration is layered YAML: documents are merged in order (later
//! layers override earlier ones), checked for literal secrets, hashed, and
//! deserialized into an immutable [`BridgeConfig`]. The shared secret itself
//! never lives in YAML; the config names the environment variable that holds
//! it (see [`secrets`]).

use std::fs;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use ctb_wire::Framing;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub mod secrets;

pub use secrets::{resolve_shared_secret, ResolvedSecret};

/// Known secret-like prefixes. A leaf string value starting with one of these
/// aborts loading with CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",
    "sk_live",
    "sk_test",
    "AKIA",
    "-----BEGIN",
    "ghp_",
    "gho_",
    "glpat-",
    "xoxb-",
    "xoxp-",
];

// ---------------------------------------------------------------------------
// Typed config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Address the daemon binds. `CTB_DAEMON_ADDR` overrides at startup.
    pub listen_addr: String,
    /// Wire variant spoken to the remote API.
    pub framing: Framing,
    pub endpoints: EndpointConfig,
    pub timeouts: TimeoutConfig,
    pub paging: PagingConfig,
    /// NAME of the env var holding the shared secret. Never the value.
    pub secret_env: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8787".to_string(),
            framing: Framing::default(),
            endpoints: EndpointConfig::default(),
            timeouts: TimeoutConfig::default(),
            paging: PagingConfig::default(),
            secret_env: "CTB_SHARED_SECRET".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointConfig {
    pub live_host: String,
    pub demo_host: String,
    /// Overrides the framing's default port when set.
    pub port: Option<u16>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            live_host: "live.ctraderapi.com".to_string(),
            demo_host: "demo.ctraderapi.com".to_string(),
            port: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    pub connect_ms: u64,
    pub auth_ms: u64,
    pub symbols_ms: u64,
    pub deals_ms: u64,
    pub symbol_detail_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 12_000,
            auth_ms: 15_000,
            symbols_ms: 20_000,
            deals_ms: 20_000,
            symbol_detail_ms: 15_000,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }
    pub fn auth(&self) -> Duration {
        Duration::from_millis(self.auth_ms)
    }
    pub fn symbols(&self) -> Duration {
        Duration::from_millis(self.symbols_ms)
    }
    pub fn deals(&self) -> Duration {
        Duration::from_millis(self.deals_ms)
    }
    pub fn symbol_detail(&self) -> Duration {
        Duration::from_millis(self.symbol_detail_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PagingConfig {
    /// Page-size cap sent as `maxRows`.
    pub max_rows: usize,
    /// Safety ceiling on deal-page requests per sync.
    pub max_pages: usize,
    /// Symbol ids per symbol-detail request.
    pub detail_chunk: usize,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            max_rows: 500,
            max_pages: 40,
            detail_chunk: 50,
        }
    }
}

impl BridgeConfig {
    /// Map a request `host` to a hostname: `live` / `demo` are aliases for
    /// the configured hosts, anything else is used verbatim.
    pub fn resolve_host(&self, host: &str) -> String {
        let h = host.trim();
        if h.eq_ignore_ascii_case("live") {
            self.endpoints.live_host.clone()
        } else if h.eq_ignore_ascii_case("demo") {
            self.endpoints.demo_host.clone()
        } else {
            h.to_string()
        }
    }

    pub fn port(&self) -> u16 {
        self.endpoints
            .port
            .unwrap_or_else(|| self.framing.default_port())
    }

    fn validate(&self) -> Result<()> {
        if self.paging.max_rows == 0 || self.paging.max_pages == 0 || self.paging.detail_chunk == 0
        {
            bail!("CONFIG_INVALID: paging.max_rows, paging.max_pages and paging.detail_chunk must be > 0");
        }
        if !is_env_var_name(&self.secret_env) {
            bail!("CONFIG_INVALID: secret_env must be an environment variable NAME (A-Z, 0-9, _)");
        }
        Ok(())
    }
}

fn is_env_var_name(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with(|c: char| c.is_ascii_digit())
        && s.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

// ---------------------------------------------------------------------------
// Layered loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config: BridgeConfig,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }
    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        // An empty document is an empty layer.
        if v_json.is_null() {
            continue;
        }
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let config: BridgeConfig =
        serde_json::from_value(merged.clone()).context("CONFIG_INVALID: schema mismatch")?;
    config.validate()?;

    let canonical_json = serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_string_leaves(v, "", &mut leaves);
    for (ptr, s) in leaves {
        if looks_like_secret(s) {
            bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
        }
    }
    Ok(())
}

fn collect_string_leaves<'a>(v: &'a Value, prefix: &str, out: &mut Vec<(String, &'a str)>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map {
                let next = format!("{}/{}", prefix, k.replace('~', "~0").replace('/', "~1"));
                collect_string_leaves(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                collect_string_leaves(vv, &format!("{prefix}/{i}"), out);
            }
        }
        Value::String(s) => out.push((prefix.to_string(), s)),
        _ => {}
    }
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    t.len() >= 8 && SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_layers_yields_defaults() {
        let loaded = load_layered_yaml_from_strings(&[]).unwrap();
        assert_eq!(loaded.config, BridgeConfig::default());
        assert_eq!(loaded.config.port(), 5035);
        assert_eq!(loaded.config.timeouts.connect(), Duration::from_secs(12));
    }

    #[test]
    fn host_aliases_resolve_case_insensitively() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.resolve_host("LIVE"), "live.ctraderapi.com");
        assert_eq!(cfg.resolve_host(" demo "), "demo.ctraderapi.com");
        assert_eq!(cfg.resolve_host("proxy.internal"), "proxy.internal");
    }

    #[test]
    fn env_var_names_are_checked() {
        assert!(is_env_var_name("CTB_SHARED_SECRET"));
        assert!(!is_env_var_name("ctb_secret"));
        assert!(!is_env_var_name("1ABC"));
        assert!(!is_env_var_name(""));
    }
}
