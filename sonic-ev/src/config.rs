//! Configuration resolution for sonic-ev
//!
//! Multi-tier resolution with ENV > TOML > default priority. The whole config
//! is resolved once at startup and injected through `AppState`; nothing reads
//! configuration ambiently from call sites.

use serde::Deserialize;
use sonic_common::config::{default_data_folder, load_toml, resolve_config_path};
use sonic_common::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

fn default_port() -> u16 {
    5000
}

fn default_record_ttl() -> u64 {
    86_400
}

fn default_summary_ttl() -> u64 {
    86_400
}

fn default_top_count() -> usize {
    3
}

fn default_worst_count() -> usize {
    2
}

fn default_llm_timeout() -> u64 {
    30
}

fn default_llm_api_version() -> String {
    "2025-01-01-preview".to_string()
}

fn default_llm_deployment() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_temperature() -> f64 {
    0.7
}

fn default_llm_max_tokens() -> u32 {
    300
}

/// LLM refinement channel settings (Azure-style chat completions endpoint)
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    #[serde(default = "default_llm_deployment")]
    pub deployment: String,
    #[serde(default = "default_llm_api_version")]
    pub api_version: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_temperature")]
    pub temperature: f64,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            deployment: default_llm_deployment(),
            api_version: default_llm_api_version(),
            timeout_secs: default_llm_timeout(),
            temperature: default_llm_temperature(),
            max_tokens: default_llm_max_tokens(),
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// sonic-ev service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EvConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite database path; defaults to `<data folder>/sonic-ev.db`
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// TTL applied to per-segment and bulk evaluation records
    #[serde(default = "default_record_ttl")]
    pub record_ttl_secs: u64,

    /// Independent TTL for cached aggregate summaries
    #[serde(default = "default_summary_ttl")]
    pub summary_ttl_secs: u64,

    #[serde(default = "default_top_count")]
    pub top_segment_count: usize,

    #[serde(default = "default_worst_count")]
    pub worst_segment_count: usize,

    /// Transcription collaborator endpoint (POST, audio bytes in, segments out)
    #[serde(default)]
    pub transcriber_endpoint: Option<String>,

    /// Classification collaborator endpoint (POST, text in, topic/tone out)
    #[serde(default)]
    pub classifier_endpoint: Option<String>,

    #[serde(default)]
    pub llm: LlmConfig,
}

impl Default for EvConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            database_path: None,
            record_ttl_secs: default_record_ttl(),
            summary_ttl_secs: default_summary_ttl(),
            top_segment_count: default_top_count(),
            worst_segment_count: default_worst_count(),
            transcriber_endpoint: None,
            classifier_endpoint: None,
            llm: LlmConfig::default(),
        }
    }
}

impl EvConfig {
    /// Load config: TOML file (if present) with ENV overrides on top
    pub fn load() -> Result<Self> {
        let mut config = match resolve_config_path("sonic-ev") {
            Some(path) => {
                info!("Loading config from {}", path.display());
                load_toml(&path)?
            }
            None => {
                info!("No config file found, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("SONIC_EV_PORT") {
            match port.parse() {
                Ok(p) => self.port = p,
                Err(_) => warn!("Ignoring invalid SONIC_EV_PORT: {}", port),
            }
        }
        if let Ok(path) = std::env::var("SONIC_EV_DATABASE") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Ok(endpoint) = std::env::var("SONIC_EV_TRANSCRIBER_ENDPOINT") {
            self.transcriber_endpoint = Some(endpoint);
        }
        if let Ok(endpoint) = std::env::var("SONIC_EV_CLASSIFIER_ENDPOINT") {
            self.classifier_endpoint = Some(endpoint);
        }
        if let Ok(endpoint) = std::env::var("SONIC_EV_LLM_ENDPOINT") {
            self.llm.endpoint = Some(endpoint);
        }
        if let Ok(key) = std::env::var("SONIC_EV_LLM_API_KEY") {
            self.llm.api_key = Some(key);
        }
    }

    /// Resolved database path, falling back to the platform data folder
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| default_data_folder().join("sonic-ev.db"))
    }

    pub fn record_ttl(&self) -> Duration {
        Duration::from_secs(self.record_ttl_secs)
    }

    pub fn summary_ttl(&self) -> Duration {
        Duration::from_secs(self.summary_ttl_secs)
    }

    /// LLM channel is enabled only with both endpoint and non-empty key
    pub fn llm_enabled(&self) -> bool {
        self.llm.endpoint.as_deref().is_some_and(|e| !e.trim().is_empty())
            && self.llm.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EvConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.record_ttl_secs, 86_400);
        assert_eq!(config.top_segment_count, 3);
        assert_eq!(config.worst_segment_count, 2);
        assert!(!config.llm_enabled());
    }

    #[test]
    fn test_llm_enabled_requires_endpoint_and_key() {
        let mut config = EvConfig::default();
        config.llm.endpoint = Some("https://example.test".to_string());
        assert!(!config.llm_enabled());
        config.llm.api_key = Some("   ".to_string());
        assert!(!config.llm_enabled());
        config.llm.api_key = Some("secret".to_string());
        assert!(config.llm_enabled());
    }

    #[test]
    fn test_toml_round_trip() {
        let toml_src = r#"
            port = 6100
            record_ttl_secs = 600

            [llm]
            endpoint = "https://llm.test"
            api_key = "k"
            timeout_secs = 5
        "#;
        let config: EvConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.port, 6100);
        assert_eq!(config.record_ttl_secs, 600);
        assert_eq!(config.llm.timeout_secs, 5);
        assert!(config.llm_enabled());
    }
}
