use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::error::{ChatStreamError, CoreResult};

fn default_path() -> String {
    "/v1/chat/completions".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct EndpointCfg {
    /// Scheme and authority, e.g. http://127.0.0.1:8080
    pub base_url: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Name of the environment variable that contains the API key, if any.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl EndpointCfg {
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.path)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct DefaultsCfg {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HttpCfg {
    /// TCP connect timeout in milliseconds (default 5000ms)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Optional per-host idle connection pool cap (None = reqwest default)
    #[serde(default)]
    pub pool_max_idle_per_host: Option<usize>,
}

impl Default for HttpCfg {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            pool_max_idle_per_host: None,
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    pub endpoint: EndpointCfg,
    #[serde(default)]
    pub defaults: DefaultsCfg,
    /// HTTP client configuration. Missing → defaults.
    #[serde(default)]
    pub http: HttpCfg,
}

impl Config {
    /// Default configuration pointing at `base_url`.
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            endpoint: EndpointCfg {
                base_url: base_url.into(),
                path: default_path(),
                api_key_env: None,
            },
            defaults: DefaultsCfg::default(),
            http: HttpCfg::default(),
        }
    }

    /// Load a Config from a file path (JSON or TOML by extension). If the
    /// extension is missing or unrecognized, try JSON first, then TOML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(ChatStreamError::from)?;
        let s = std::str::from_utf8(&bytes).map_err(|e| ChatStreamError::Other(e.into()))?;
        let cfg: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => {
                serde_json::from_str::<Self>(s).map_err(|e| ChatStreamError::Other(e.into()))?
            }
            Some("toml") => toml::from_str::<Self>(s).map_err(|e| ChatStreamError::Other(e.into()))?,
            _ => serde_json::from_str::<Self>(s)
                .map_err(|e| ChatStreamError::Other(e.into()))
                .or_else(|_| toml::from_str::<Self>(s).map_err(|e| ChatStreamError::Other(e.into())))?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> CoreResult<()> {
        let base = &self.endpoint.base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ChatStreamError::Validation(format!(
                "endpoint.base_url must start with http:// or https://, got {base:?}"
            )));
        }
        if !self.endpoint.path.starts_with('/') {
            return Err(ChatStreamError::Validation(format!(
                "endpoint.path must start with '/', got {:?}",
                self.endpoint.path
            )));
        }
        if let Some(t) = self.defaults.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(ChatStreamError::Validation(format!(
                "defaults.temperature must be within 0..=2, got {t}"
            )));
        }
        Ok(())
    }
}
