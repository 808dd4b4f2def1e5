//! Server configuration, read from `CIPHERSCORE_*` environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Errors for malformed configuration values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Where formatted logs go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub allowed_origins: Vec<String>,
    pub request_timeout: Duration,
    /// Upper bound on request bodies. Evaluation keys run to tens of MiB.
    pub max_body_bytes: usize,
    pub log_target: LogTarget,
}

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_BODY_BYTES: usize = 256 * 1024 * 1024;
const DEFAULT_LOG_FILE: &str = "cipherscore.log";

fn invalid(var: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl ServerConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Errors
    /// Returns `ConfigError` for any variable that is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`, falling back to defaults for
    /// unset or empty variables.
    ///
    /// # Errors
    /// Returns `ConfigError` for any variable that is set but malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        const BIND: &str = "CIPHERSCORE_BIND_ADDR";
        let raw = get(BIND).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw.trim().parse().map_err(|e| invalid(BIND, &raw, e))?;

        const ORIGINS: &str = "CIPHERSCORE_ALLOWED_ORIGINS";
        let raw = get(ORIGINS).unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string());
        let allowed_origins: Vec<String> = raw
            .split(',')
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if let Some(bad) = allowed_origins
            .iter()
            .find(|o| !(o.starts_with("http://") || o.starts_with("https://")))
        {
            return Err(invalid(ORIGINS, &raw, format!("origin {bad:?} needs an http(s) scheme")));
        }

        const TIMEOUT: &str = "CIPHERSCORE_REQUEST_TIMEOUT_SECS";
        let request_timeout = match get(TIMEOUT) {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|e| invalid(TIMEOUT, &raw, e))?;
                if secs == 0 {
                    return Err(invalid(TIMEOUT, &raw, "must be at least 1"));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        const BODY: &str = "CIPHERSCORE_MAX_BODY_BYTES";
        let max_body_bytes = match get(BODY) {
            Some(raw) => {
                let bytes: usize = raw.trim().parse().map_err(|e| invalid(BODY, &raw, e))?;
                if bytes == 0 {
                    return Err(invalid(BODY, &raw, "must be positive"));
                }
                bytes
            }
            None => DEFAULT_MAX_BODY_BYTES,
        };

        const LOG_MODE: &str = "CIPHERSCORE_LOG_MODE";
        let log_target = match get(LOG_MODE).as_deref().map(str::trim) {
            None | Some("stdout") => LogTarget::Stdout,
            Some("file") => LogTarget::File(
                get("CIPHERSCORE_LOG_FILE")
                    .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string())
                    .into(),
            ),
            Some(other) => return Err(invalid(LOG_MODE, other, "expected `stdout` or `file`")),
        };

        Ok(Self {
            bind_addr,
            allowed_origins,
            request_timeout,
            max_body_bytes,
            log_target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).expect("defaults");
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8000");
        assert_eq!(config.allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert_eq!(config.max_body_bytes, 268_435_456);
        assert_eq!(config.log_target, LogTarget::Stdout);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("CIPHERSCORE_BIND_ADDR", "0.0.0.0:9000"),
            (
                "CIPHERSCORE_ALLOWED_ORIGINS",
                "https://app.example.com/, http://localhost:5173",
            ),
            ("CIPHERSCORE_REQUEST_TIMEOUT_SECS", "30"),
            ("CIPHERSCORE_MAX_BODY_BYTES", "1024"),
            ("CIPHERSCORE_LOG_MODE", "file"),
            ("CIPHERSCORE_LOG_FILE", "/tmp/cs.log"),
        ]))
        .expect("config");

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(
            config.allowed_origins,
            vec!["https://app.example.com", "http://localhost:5173"]
        );
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.max_body_bytes, 1024);
        assert_eq!(config.log_target, LogTarget::File("/tmp/cs.log".into()));
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[("CIPHERSCORE_BIND_ADDR", "  ")]))
            .expect("config");
        assert_eq!(config.bind_addr.port(), 8000);
    }

    #[test]
    fn test_rejects_malformed_values() {
        for (var, value) in [
            ("CIPHERSCORE_BIND_ADDR", "localhost"),
            ("CIPHERSCORE_ALLOWED_ORIGINS", "example.com"),
            ("CIPHERSCORE_REQUEST_TIMEOUT_SECS", "0"),
            ("CIPHERSCORE_REQUEST_TIMEOUT_SECS", "soon"),
            ("CIPHERSCORE_MAX_BODY_BYTES", "-1"),
            ("CIPHERSCORE_LOG_MODE", "syslog"),
        ] {
            let err = ServerConfig::from_lookup(lookup(&[(var, value)])).expect_err(var);
            assert!(err.to_string().starts_with(var), "{err}");
        }
    }
}
