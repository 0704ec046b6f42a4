use std::fs;
use std::path::Path;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config/nexus.json";

pub const ENV_API_URL: &str = "NEXUS_API_URL";
pub const ENV_BROKER_URL: &str = "NEXUS_BROKER_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Backend origin, e.g. `http://localhost:8080`.
    pub api_base_url: String,
    pub api_prefix: String,
    /// Explicit STOMP endpoint. Derived from `api_base_url` + `broker_path` when unset.
    pub broker_url: Option<String>,
    /// Raw WebSocket route of the SockJS endpoint.
    pub broker_path: String,
    pub history_page_size: u32,
    pub connect_timeout_secs: u64,
    /// Heart-beat offer sent in CONNECT (ms); 0 disables heart-beating.
    pub heartbeat_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            api_prefix: "/api/v1".to_string(),
            broker_url: None,
            broker_path: "/chat/websocket".to_string(),
            history_page_size: 50,
            connect_timeout_secs: 10,
            heartbeat_ms: 10_000,
        }
    }
}

impl AppConfig {
    /// Applies `NEXUS_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_API_URL).filter(|value| !value.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(url) = lookup(ENV_BROKER_URL).filter(|value| !value.trim().is_empty()) {
            self.broker_url = Some(url);
        }
        self
    }

    /// Base URL for REST calls: origin plus API prefix.
    pub fn api_root(&self) -> Result<Url> {
        let mut url = parse_url(&self.api_base_url)?;
        let path = join_path(url.path(), &self.api_prefix);
        url.set_path(&path);
        Ok(url)
    }

    /// WebSocket URL of the STOMP broker.
    pub fn broker_endpoint(&self) -> Result<Url> {
        if let Some(explicit) = &self.broker_url {
            return parse_url(explicit);
        }

        let mut url = parse_url(&self.api_base_url)?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(ChatError::Url {
                    url: self.api_base_url.clone(),
                    reason: format!("unsupported scheme `{other}`"),
                });
            }
        };
        url.set_scheme(scheme).map_err(|()| ChatError::Url {
            url: self.api_base_url.clone(),
            reason: format!("cannot switch scheme to {scheme}"),
        })?;
        let path = join_path(url.path(), &self.broker_path);
        url.set_path(&path);
        Ok(url)
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|err| ChatError::Url {
        url: raw.to_string(),
        reason: err.to_string(),
    })
}

fn join_path(base: &str, suffix: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        suffix.trim_start_matches('/')
    )
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config("does/not/exist.json");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"api_base_url": "https://chat.example.com", "history_page_size": 20}}"#
        )
        .unwrap();

        let config = load_config(file.path().to_str().unwrap());
        assert_eq!(config.api_base_url, "https://chat.example.com");
        assert_eq!(config.history_page_size, 20);
        assert_eq!(config.broker_path, "/chat/websocket");
    }

    #[test]
    fn invalid_json_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let config = load_config(file.path().to_str().unwrap());
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn env_overrides_replace_urls() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_URL, "http://10.0.0.5:9000"),
            (ENV_BROKER_URL, "ws://10.0.0.5:9000/ws"),
        ]);
        let config = AppConfig::default()
            .with_overrides_from(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(config.api_base_url, "http://10.0.0.5:9000");
        assert_eq!(config.broker_url.as_deref(), Some("ws://10.0.0.5:9000/ws"));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let config = AppConfig::default().with_overrides_from(|_| Some("  ".to_string()));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn broker_endpoint_is_derived_from_api_origin() {
        let config = AppConfig::default();
        assert_eq!(
            config.broker_endpoint().unwrap().as_str(),
            "ws://localhost:8080/chat/websocket"
        );

        let secure = AppConfig {
            api_base_url: "https://chat.example.com/nexus/".into(),
            ..AppConfig::default()
        };
        assert_eq!(
            secure.broker_endpoint().unwrap().as_str(),
            "wss://chat.example.com/nexus/chat/websocket"
        );
    }

    #[test]
    fn explicit_broker_url_wins() {
        let config = AppConfig {
            broker_url: Some("ws://127.0.0.1:61613/stomp".into()),
            ..AppConfig::default()
        };
        assert_eq!(
            config.broker_endpoint().unwrap().as_str(),
            "ws://127.0.0.1:61613/stomp"
        );
    }

    #[test]
    fn api_root_appends_prefix() {
        assert_eq!(
            AppConfig::default().api_root().unwrap().as_str(),
            "http://localhost:8080/api/v1"
        );
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let config = AppConfig {
            api_base_url: "ftp://example.com".into(),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.broker_endpoint(),
            Err(ChatError::Url { .. })
        ));
    }
}
