//! Server configuration from the environment

use crate::executor::{HistoryMode, DEFAULT_TIMEOUT};
use crate::llm::LlmConfig;
use crate::runtime::{RuntimeSettings, DEFAULT_IDLE_TTL};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub llm: LlmConfig,
    pub runtime: RuntimeSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            llm: LlmConfig::default(),
            runtime: RuntimeSettings::default(),
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok()).with_llm(LlmConfig::from_env())
    }

    fn with_llm(mut self, llm: LlmConfig) -> Self {
        self.llm = llm;
        self
    }

    /// Everything except the LLM provider settings, from an arbitrary lookup.
    /// Unparseable values fall back to defaults with a warning.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let port = parse_or(&lookup, "PERSONA_CHAT_PORT", defaults.port);
        let bind = parse_or(&lookup, "PERSONA_CHAT_BIND", defaults.bind);

        let timeout = parse_secs(&lookup, "LLM_TIMEOUT_SECS", DEFAULT_TIMEOUT);

        let max_tokens = lookup("LLM_MAX_TOKENS").and_then(|v| match v.trim().parse::<u32>() {
            Ok(n) => Some(n),
            Err(e) => {
                tracing::warn!(error = %e, "Invalid LLM_MAX_TOKENS, ignoring");
                None
            }
        });

        let history_mode = parse_or(&lookup, "HISTORY_MODE", HistoryMode::default());

        let idle_ttl = parse_secs(&lookup, "SESSION_IDLE_TTL_SECS", DEFAULT_IDLE_TTL);

        Self {
            bind,
            port,
            llm: defaults.llm,
            runtime: RuntimeSettings {
                timeout,
                history_mode,
                max_tokens,
                idle_ttl,
            },
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            tracing::warn!(key, value = %raw, error = %e, "Invalid setting, using default");
            default
        }),
        None => default,
    }
}

/// Whole seconds; 0 disables the limit
fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Option<Duration> {
    match parse_or(lookup, key, default.as_secs()) {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config(&[]);
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8000");
        assert_eq!(config.runtime.timeout, Some(DEFAULT_TIMEOUT));
        assert_eq!(config.runtime.history_mode, HistoryMode::LatestOnly);
        assert_eq!(config.runtime.max_tokens, None);
        assert_eq!(config.runtime.idle_ttl, Some(DEFAULT_IDLE_TTL));
    }

    #[test]
    fn reads_overrides() {
        let config = config(&[
            ("PERSONA_CHAT_PORT", "9001"),
            ("PERSONA_CHAT_BIND", "127.0.0.1"),
            ("LLM_TIMEOUT_SECS", "30"),
            ("LLM_MAX_TOKENS", "256"),
            ("HISTORY_MODE", "replay"),
            ("SESSION_IDLE_TTL_SECS", "600"),
        ]);
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9001");
        assert_eq!(config.runtime.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.runtime.max_tokens, Some(256));
        assert_eq!(config.runtime.history_mode, HistoryMode::Replay);
        assert_eq!(config.runtime.idle_ttl, Some(Duration::from_secs(600)));
    }

    #[test]
    fn zero_disables_limits() {
        let config = config(&[("LLM_TIMEOUT_SECS", "0"), ("SESSION_IDLE_TTL_SECS", "0")]);
        assert_eq!(config.runtime.timeout, None);
        assert_eq!(config.runtime.idle_ttl, None);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = config(&[
            ("PERSONA_CHAT_PORT", "eighty"),
            ("LLM_TIMEOUT_SECS", "soon"),
            ("LLM_MAX_TOKENS", "-5"),
            ("HISTORY_MODE", "sometimes"),
            ("SESSION_IDLE_TTL_SECS", "forever"),
        ]);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.runtime.timeout, Some(DEFAULT_TIMEOUT));
        assert_eq!(config.runtime.max_tokens, None);
        assert_eq!(config.runtime.history_mode, HistoryMode::LatestOnly);
        assert_eq!(config.runtime.idle_ttl, Some(DEFAULT_IDLE_TTL));
    }
}
