//! Configuration schema, TOML loading, and dotted-path CLI/env override
//! application for `qec-indexerd`.
//!
//! The override algorithm (`apply_override_inner` walking a
//! `toml::value::Table` one path segment at a time) mirrors the teacher
//! binary's own config loader rather than reaching for a config-merging
//! crate — the override set here is tiny (a handful of top-level keys) and
//! the teacher's own approach already fits it.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Enumerated configuration (spec §6): `rpcUrl`, `clickhouseConnectionString`,
/// `labelBundleUrl`, optional VAPID key pair, `vapidSubject`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub rpc_url: String,
    pub clickhouse_connection_string: String,
    pub label_bundle_url: String,
    #[serde(default)]
    pub vapid_public_key: Option<String>,
    #[serde(default)]
    pub vapid_private_key: Option<String>,
    pub vapid_subject: String,

    /// The pass-through multicast contract's address (spec §4.6 `Q`). Not
    /// part of spec.md's enumerated config keys, but no other external
    /// interface names it, so it is resolved here — see DESIGN.md.
    pub multicast_contract_address: String,

    /// [AMBIENT] Structured-logging verbosity, `tracing_subscriber::EnvFilter`
    /// syntax. Not part of the distilled spec's enumerated config keys, but
    /// every teacher binary exposes one.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// [AMBIENT] Directory for transient downloads (snapshot archives)
    /// before they're parsed and discarded.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_scratch_dir() -> String {
    "/tmp/qec-indexerd".to_string()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid override `{key}={value}`: {reason}")]
    InvalidOverride {
        key: String,
        value: String,
        reason: String,
    },
    #[error("config validation failed: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn is_recoverable(&self) -> bool {
        false
    }

    pub fn is_fatal(&self) -> bool {
        true
    }
}

/// Loads `Config` from a TOML file, then applies `key=value` dotted-path
/// overrides (as supplied on the CLI or via environment parsing upstream)
/// in order, and validates the result.
pub fn load_config_from_path(
    path: impl AsRef<Path>,
    overrides: &[String],
) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let mut table: toml::value::Table = toml::from_str(&raw)?;
    for entry in overrides {
        apply_override(&mut table, entry)?;
    }

    let value = toml::Value::Table(table);
    let config: Config = value.try_into().map_err(ConfigError::Parse)?;
    validate_config(&config)?;
    Ok(config)
}

/// Parses one `dotted.path=value` override string and applies it.
pub fn apply_override(table: &mut toml::value::Table, entry: &str) -> Result<(), ConfigError> {
    let (key, value) = entry.split_once('=').ok_or_else(|| ConfigError::InvalidOverride {
        key: entry.to_string(),
        value: String::new(),
        reason: "expected `key=value`".to_string(),
    })?;
    let path: Vec<&str> = key.split('.').collect();
    apply_override_inner(table, &path, value)
        .map_err(|reason| ConfigError::InvalidOverride {
            key: key.to_string(),
            value: value.to_string(),
            reason,
        })
}

fn apply_override_inner(
    table: &mut toml::value::Table,
    path: &[&str],
    raw_value: &str,
) -> Result<(), String> {
    match path {
        [] => Err("empty override path".to_string()),
        [last] => {
            table.insert(last.to_string(), parse_value(raw_value));
            Ok(())
        }
        [head, rest @ ..] => {
            let entry = table
                .entry(head.to_string())
                .or_insert_with(|| toml::Value::Table(toml::value::Table::new()));
            let nested = entry
                .as_table_mut()
                .ok_or_else(|| format!("`{head}` is not a table"))?;
            apply_override_inner(nested, rest, raw_value)
        }
    }
}

/// Best-effort scalar parse: tries integer, then bool, then falls back to a
/// bare string — the same order the teacher's `parse_value` uses.
fn parse_value(raw: &str) -> toml::Value {
    if let Ok(i) = raw.parse::<i64>() {
        return toml::Value::Integer(i);
    }
    if let Ok(b) = raw.parse::<bool>() {
        return toml::Value::Boolean(b);
    }
    toml::Value::String(raw.to_string())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.rpc_url.is_empty() {
        return Err(ConfigError::Invalid("rpcUrl must not be empty".to_string()));
    }
    if config.clickhouse_connection_string.is_empty() {
        return Err(ConfigError::Invalid(
            "clickhouseConnectionString must not be empty".to_string(),
        ));
    }
    if config.label_bundle_url.is_empty() {
        return Err(ConfigError::Invalid(
            "labelBundleUrl must not be empty".to_string(),
        ));
    }
    if config.multicast_contract_address.parse::<qec_primitives::Address>().is_err() {
        return Err(ConfigError::Invalid(
            "multicastContractAddress must be a 60-letter identity".to_string(),
        ));
    }
    if config.vapid_public_key.is_some() != config.vapid_private_key.is_some() {
        return Err(ConfigError::Invalid(
            "vapidPublicKey and vapidPrivateKey must be set together or not at all".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_table() -> toml::value::Table {
        toml::toml! {
            rpc_url = "ws://bob:1234"
            clickhouse_connection_string = "http://localhost:8123"
            label_bundle_url = "https://example.com/labels.json"
            vapid_subject = "mailto:ops@example.com"
            multicast_contract_address = "QUTILABCDEFGHIJKLMNOPQRSTUVWXYZABCDEFGHIJKLMNOPQRSTUVWXYZABC"
        }
    }

    #[test]
    fn top_level_override_replaces_scalar() {
        let mut table = base_table();
        apply_override(&mut table, "rpc_url=ws://other:9999").unwrap();
        assert_eq!(
            table.get("rpc_url").unwrap().as_str(),
            Some("ws://other:9999")
        );
    }

    #[test]
    fn nested_path_creates_intermediate_tables() {
        let mut table = toml::value::Table::new();
        apply_override(&mut table, "a.b.c=42").unwrap();
        let a = table.get("a").unwrap().as_table().unwrap();
        let b = a.get("b").unwrap().as_table().unwrap();
        assert_eq!(b.get("c").unwrap().as_integer(), Some(42));
    }

    #[test]
    fn malformed_override_without_equals_errors() {
        let mut table = base_table();
        assert!(apply_override(&mut table, "rpc_url").is_err());
    }

    #[test]
    fn vapid_keys_must_be_paired() {
        let mut table = base_table();
        table.insert("vapid_public_key".to_string(), toml::Value::String("pub".into()));
        let value = toml::Value::Table(table);
        let config: Config = value.try_into().unwrap();
        assert!(validate_config(&config).is_err());
    }
}
