//! Server connection configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use bookwire_core::DEFAULT_DESTINATION_PREFIX;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where and how to reach the notification broker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// WebSocket endpoint of the broker (ws:// or wss://)
    pub url: String,

    /// Bearer token sent with the CONNECT frame
    pub token: Option<String>,

    /// Per-user destination prefix the topics live under
    pub destination_prefix: String,

    /// Virtual host for the CONNECT frame; defaults to the URL host
    pub virtual_host: Option<String>,

    /// Outgoing heart-beat interval we offer, in milliseconds (0 disables)
    pub heartbeat_outgoing_ms: u64,

    /// Incoming heart-beat interval we ask for, in milliseconds (0 disables)
    pub heartbeat_incoming_ms: u64,

    /// Bound on establishing the transport plus the CONNECT handshake
    pub connect_timeout_secs: u64,
}

impl ServerConfig {
    /// Connect timeout as a [`Duration`]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Host part of the URL, used when no virtual host is configured
    pub fn host(&self) -> String {
        if let Some(host) = self.virtual_host.as_ref().filter(|h| !h.trim().is_empty()) {
            return host.clone();
        }
        let without_scheme = self
            .url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.url);
        let authority = without_scheme.split('/').next().unwrap_or_default();
        let authority = authority.rsplit('@').next().unwrap_or(authority);
        match authority.rsplit_once(':') {
            Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host.to_string(),
            _ => authority.to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:6060/ws".to_string(),
            token: None,
            destination_prefix: DEFAULT_DESTINATION_PREFIX.to_string(),
            virtual_host: None,
            heartbeat_outgoing_ms: 20_000,
            heartbeat_incoming_ms: 0,
            connect_timeout_secs: 10,
        }
    }
}

impl ConfigSection for ServerConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let results = vec![
            Validator::ws_url(&self.url, "server.url"),
            Validator::destination_prefix(&self.destination_prefix, "server.destination_prefix"),
            Validator::token(self.token.as_deref(), "server.token"),
            Validator::in_range(self.connect_timeout_secs, 1, 300, "server.connect_timeout_secs"),
            Validator::in_range(
                self.heartbeat_outgoing_ms,
                0,
                300_000,
                "server.heartbeat_outgoing_ms",
            ),
            Validator::in_range(
                self.heartbeat_incoming_ms,
                0,
                300_000,
                "server.heartbeat_incoming_ms",
            ),
        ];

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.url = other.url;
        if other.token.is_some() {
            self.token = other.token;
        }
        self.destination_prefix = other.destination_prefix;
        self.virtual_host = other.virtual_host;
        self.heartbeat_outgoing_ms = other.heartbeat_outgoing_ms;
        self.heartbeat_incoming_ms = other.heartbeat_incoming_ms;
        self.connect_timeout_secs = other.connect_timeout_secs;
    }

    fn section_name(&self) -> &'static str {
        "server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_http_url() {
        let config = ServerConfig {
            url: "http://localhost:6060/ws".to_string(),
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "server.url");
    }

    #[test]
    fn test_rejects_relative_prefix() {
        let config = ServerConfig {
            destination_prefix: "user/queue".to_string(),
            connect_timeout_secs: 0,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_token_problems_hide_the_token() {
        let config = ServerConfig {
            token: Some("s3cret value".to_string()),
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "server.token");
        assert!(!errors[0].to_string().contains("s3cret"));
    }

    #[test]
    fn test_rejects_url_without_host() {
        let config = ServerConfig {
            url: "wss:///ws".to_string(),
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors[0].message, "has no host");
    }

    #[test]
    fn test_host_from_url() {
        let mut config = ServerConfig::default();
        assert_eq!(config.host(), "localhost");

        config.url = "wss://user@books.example.org/ws".to_string();
        assert_eq!(config.host(), "books.example.org");

        config.virtual_host = Some("vhost".to_string());
        assert_eq!(config.host(), "vhost");
    }

    #[test]
    fn test_merge_keeps_token_when_other_has_none() {
        let mut base = ServerConfig {
            token: Some("secret".to_string()),
            ..Default::default()
        };
        let other = ServerConfig {
            url: "wss://example.org/ws".to_string(),
            ..Default::default()
        };

        base.merge(other);
        assert_eq!(base.url, "wss://example.org/ws");
        assert_eq!(base.token.as_deref(), Some("secret"));
    }
}
