pub mod validation;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use self::validation::validate_config;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Policy applied to `<details>` wrapper markup in thinking output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThinkTagsMode {
    /// Rewrite `<details ...>`/`</details>` to `<think>`/`</think>`.
    #[default]
    Think,
    /// Delete the wrapper markup entirely.
    Strip,
    /// Leave the markup untouched.
    Keep,
}

impl fmt::Display for ThinkTagsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThinkTagsMode::Think => write!(f, "think"),
            ThinkTagsMode::Strip => write!(f, "strip"),
            ThinkTagsMode::Keep => write!(f, "keep"),
        }
    }
}

/// How a model alias decides its upstream feature set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelMode {
    /// No thinking, no search.
    #[default]
    Basic,
    /// Thinking always on.
    Thinking,
    /// Web search (and thinking) always on.
    Search,
    /// Per-request intent classification decides.
    Auto,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    /// Upstream request timeout, seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_http_pool_max_idle_per_host")]
    pub http_pool_max_idle_per_host: usize,
    #[serde(default = "default_http_pool_idle_timeout_secs")]
    pub http_pool_idle_timeout_secs: u64,
    #[serde(default = "default_models_cache_ttl_secs")]
    pub models_cache_ttl_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_worker_threads: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_max_blocking_threads: Option<usize>,
}

fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_timeout() -> u64 {
    180
}
fn default_http_pool_max_idle_per_host() -> usize {
    16
}
fn default_http_pool_idle_timeout_secs() -> u64 {
    15
}
fn default_models_cache_ttl_secs() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            timeout: default_timeout(),
            http_pool_max_idle_per_host: default_http_pool_max_idle_per_host(),
            http_pool_idle_timeout_secs: default_http_pool_idle_timeout_secs(),
            models_cache_ttl_secs: default_models_cache_ttl_secs(),
            runtime_worker_threads: None,
            runtime_max_blocking_threads: Some(8),
        }
    }
}

/// z.ai upstream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Fallback credential used when anonymous token acquisition fails.
    #[serde(default)]
    pub static_token: String,
    #[serde(default = "default_token_cache_minutes")]
    pub token_cache_minutes: u64,
}

fn default_base_url() -> String {
    "https://chat.z.ai".to_string()
}
fn default_token_cache_minutes() -> u64 {
    10
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            static_token: String::new(),
            token_cache_minutes: default_token_cache_minutes(),
        }
    }
}

/// Client authentication configuration: a single static bearer key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientAuthConfig {
    pub api_key: String,
}

/// Feature flags and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub think_tags_mode: ThinkTagsMode,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            think_tags_mode: ThinkTagsMode::default(),
        }
    }
}

/// One exposed model alias, mapped to an upstream model identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub alias: String,
    pub upstream_id: String,
    #[serde(default)]
    pub mode: ModelMode,
}

/// Intent-classifier tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_search_threshold")]
    pub search_threshold: f64,
    #[serde(default = "default_thinking_threshold")]
    pub thinking_threshold: f64,
    #[serde(default = "default_combined_threshold")]
    pub combined_threshold: f64,
    /// How many trailing messages the context bonus inspects.
    #[serde(default = "default_context_depth")]
    pub context_depth: usize,
    #[serde(default = "default_intent_cache_ttl_secs")]
    pub intent_cache_ttl_secs: u64,
    #[serde(default = "default_search_keywords")]
    pub search_keywords: Vec<String>,
    #[serde(default = "default_thinking_keywords")]
    pub thinking_keywords: Vec<String>,
    /// Extra per-keyword weight added on top of the base hit count.
    #[serde(default)]
    pub keyword_weights: BTreeMap<String, f64>,
    /// Regexes that force Search, bypassing all scoring.
    #[serde(default)]
    pub force_search_patterns: Vec<String>,
    /// Regexes that force Thinking, bypassing all scoring.
    #[serde(default)]
    pub force_thinking_patterns: Vec<String>,
}

fn default_search_threshold() -> f64 {
    2.0
}
fn default_thinking_threshold() -> f64 {
    3.0
}
fn default_combined_threshold() -> f64 {
    6.0
}
fn default_context_depth() -> usize {
    3
}
fn default_intent_cache_ttl_secs() -> u64 {
    60
}

fn default_search_keywords() -> Vec<String> {
    [
        "latest", "news", "today", "current", "recent", "price", "weather", "stock", "score",
        "release", "update", "最新", "新闻", "今天", "现在", "价格", "天气",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

fn default_thinking_keywords() -> Vec<String> {
    [
        "why", "how", "explain", "analyze", "compare", "prove", "design", "derive", "step by step",
        "reason", "为什么", "怎么", "解释", "分析", "比较", "证明",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            search_threshold: default_search_threshold(),
            thinking_threshold: default_thinking_threshold(),
            combined_threshold: default_combined_threshold(),
            context_depth: default_context_depth(),
            intent_cache_ttl_secs: default_intent_cache_ttl_secs(),
            search_keywords: default_search_keywords(),
            thinking_keywords: default_thinking_keywords(),
            keyword_weights: BTreeMap::new(),
            force_search_patterns: Vec::new(),
            force_thinking_patterns: Vec::new(),
        }
    }
}

fn default_models() -> Vec<ModelConfig> {
    vec![
        ModelConfig {
            alias: "glm-4.5".to_string(),
            upstream_id: "0727-360B-API".to_string(),
            mode: ModelMode::Auto,
        },
        ModelConfig {
            alias: "glm-4.5-thinking".to_string(),
            upstream_id: "0727-360B-API".to_string(),
            mode: ModelMode::Thinking,
        },
        ModelConfig {
            alias: "glm-4.5-search".to_string(),
            upstream_id: "0727-360B-API".to_string(),
            mode: ModelMode::Search,
        },
        ModelConfig {
            alias: "glm-4.5-air".to_string(),
            upstream_id: "0727-106B-API".to_string(),
            mode: ModelMode::Basic,
        },
    ]
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    pub client_authentication: ClientAuthConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_yaml::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_example_config() {
        let config = load_config("config.example.yaml");
        assert!(
            config.is_ok(),
            "Failed to load example config: {:?}",
            config.err()
        );
        let config = config.unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(config.models.len() >= 4);
        assert!(config
            .models
            .iter()
            .any(|m| m.mode == ModelMode::Auto));
        assert!(!config.client_authentication.api_key.is_empty());
    }

    #[test]
    fn test_think_tags_mode_serde() {
        let json = serde_json::to_string(&ThinkTagsMode::Strip).unwrap();
        assert_eq!(json, "\"strip\"");
        let mode: ThinkTagsMode = serde_json::from_str("\"keep\"").unwrap();
        assert_eq!(mode, ThinkTagsMode::Keep);
        assert_eq!(ThinkTagsMode::default(), ThinkTagsMode::Think);
    }

    #[test]
    fn test_classifier_defaults() {
        let c = ClassifierConfig::default();
        assert!(c.search_threshold > 0.0);
        assert!(c.combined_threshold >= c.search_threshold + c.thinking_threshold - f64::EPSILON);
        assert!(!c.search_keywords.is_empty());
        assert!(!c.thinking_keywords.is_empty());
    }

    #[test]
    fn test_default_models_cover_all_modes() {
        let models = default_models();
        for mode in [
            ModelMode::Basic,
            ModelMode::Thinking,
            ModelMode::Search,
            ModelMode::Auto,
        ] {
            assert!(models.iter().any(|m| m.mode == mode), "missing {mode:?}");
        }
    }
}
