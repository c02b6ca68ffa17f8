//! Process configuration from `EVENTWIRE_*` environment variables.
//!
//! | Variable                            | Default        |
//! |-------------------------------------|----------------|
//! | `EVENTWIRE_BIND_ADDR`               | `0.0.0.0:8080` |
//! | `EVENTWIRE_MAX_BODY_BYTES`          | `2097152`      |
//! | `EVENTWIRE_SEPARATE_SERVER_FAULTS`  | `false`        |
//! | `EVENTWIRE_STRICT_AGGREGATE_ID`     | `false`        |
//! | `EVENTWIRE_LOG_FORMAT`              | `json`         |
//!
//! Unset or empty variables take their default; malformed values are errors.

use std::net::SocketAddr;

use thiserror::Error;

use eventwire_observability::LogFormat;

use crate::ingress::{DEFAULT_MAX_BODY_BYTES, IngressOptions};

pub const BIND_ADDR: &str = "EVENTWIRE_BIND_ADDR";
pub const MAX_BODY_BYTES: &str = "EVENTWIRE_MAX_BODY_BYTES";
pub const SEPARATE_SERVER_FAULTS: &str = "EVENTWIRE_SEPARATE_SERVER_FAULTS";
pub const STRICT_AGGREGATE_ID: &str = "EVENTWIRE_STRICT_AGGREGATE_ID";
pub const LOG_FORMAT: &str = "EVENTWIRE_LOG_FORMAT";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid {var}={value:?}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub max_body_bytes: usize,
    pub separate_server_faults: bool,
    pub strict_aggregate_id: bool,
    pub log_format: LogFormat,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            separate_server_faults: false,
            strict_aggregate_id: false,
            log_format: LogFormat::default(),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            bind_addr: parse(&lookup, BIND_ADDR, defaults.bind_addr, |v| {
                v.parse().map_err(|e: std::net::AddrParseError| e.to_string())
            })?,
            max_body_bytes: parse(&lookup, MAX_BODY_BYTES, defaults.max_body_bytes, |v| {
                match v.parse::<usize>() {
                    Ok(0) => Err("must be greater than zero".to_string()),
                    Ok(n) => Ok(n),
                    Err(e) => Err(e.to_string()),
                }
            })?,
            separate_server_faults: parse(
                &lookup,
                SEPARATE_SERVER_FAULTS,
                defaults.separate_server_faults,
                parse_bool,
            )?,
            strict_aggregate_id: parse(
                &lookup,
                STRICT_AGGREGATE_ID,
                defaults.strict_aggregate_id,
                parse_bool,
            )?,
            log_format: parse(&lookup, LOG_FORMAT, defaults.log_format, |v| {
                v.parse().map_err(|e: eventwire_observability::UnknownLogFormat| e.to_string())
            })?,
        })
    }

    pub fn ingress_options(&self) -> IngressOptions {
        IngressOptions {
            max_body_bytes: self.max_body_bytes,
            separate_server_faults: self.separate_server_faults,
        }
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
    convert: impl FnOnce(&str) -> Result<T, String>,
) -> Result<T, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };
    let value = raw.trim();
    if value.is_empty() {
        return Ok(default);
    }
    convert(value).map_err(|reason| ConfigError {
        var,
        value: raw.clone(),
        reason,
    })
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err("expected a boolean".to_string()),
    }
}
