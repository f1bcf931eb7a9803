use std::collections::HashSet;

use super::{AppConfig, ConfigError};

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_client_auth(config)?;
    validate_upstream(config)?;
    validate_models(config)?;
    validate_classifier(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.http_pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "server.http_pool_max_idle_per_host must be greater than 0",
        ));
    }
    if server.timeout == 0 {
        return Err(validation_err("server.timeout must be greater than 0"));
    }
    if let Some(worker_threads) = server.runtime_worker_threads {
        if worker_threads == 0 {
            return Err(validation_err(
                "server.runtime_worker_threads must be greater than 0 when set",
            ));
        }
    }
    if let Some(max_blocking_threads) = server.runtime_max_blocking_threads {
        if max_blocking_threads == 0 {
            return Err(validation_err(
                "server.runtime_max_blocking_threads must be greater than 0 when set",
            ));
        }
    }
    Ok(())
}

fn validate_client_auth(config: &AppConfig) -> Result<(), ConfigError> {
    if config.client_authentication.api_key.trim().is_empty() {
        return Err(validation_err("client_authentication.api_key cannot be empty"));
    }
    Ok(())
}

fn validate_upstream(config: &AppConfig) -> Result<(), ConfigError> {
    let upstream = &config.upstream;
    if url::Url::parse(&upstream.base_url).is_err()
        || !(upstream.base_url.starts_with("http://") || upstream.base_url.starts_with("https://"))
    {
        return Err(validation_err(
            "upstream.base_url must be a valid http:// or https:// URL",
        ));
    }
    if upstream.token_cache_minutes == 0 {
        return Err(validation_err(
            "upstream.token_cache_minutes must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_models(config: &AppConfig) -> Result<(), ConfigError> {
    if config.models.is_empty() {
        return Err(validation_err("models cannot be empty"));
    }

    let mut aliases = HashSet::new();
    for model in &config.models {
        if model.alias.trim().is_empty() {
            return Err(validation_err("model alias cannot be empty"));
        }
        if model.upstream_id.trim().is_empty() {
            return Err(validation_err(format!(
                "model '{}': upstream_id cannot be empty",
                model.alias
            )));
        }
        if !aliases.insert(model.alias.as_str()) {
            return Err(validation_err(format!(
                "duplicate model alias '{}'",
                model.alias
            )));
        }
    }
    Ok(())
}

fn validate_classifier(config: &AppConfig) -> Result<(), ConfigError> {
    let classifier = &config.classifier;
    for (name, value) in [
        ("search_threshold", classifier.search_threshold),
        ("thinking_threshold", classifier.thinking_threshold),
        ("combined_threshold", classifier.combined_threshold),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(validation_err(format!(
                "classifier.{name} must be a non-negative finite number"
            )));
        }
    }
    if classifier.context_depth == 0 {
        return Err(validation_err(
            "classifier.context_depth must be greater than 0",
        ));
    }

    for (field, patterns) in [
        ("force_search_patterns", &classifier.force_search_patterns),
        (
            "force_thinking_patterns",
            &classifier.force_thinking_patterns,
        ),
    ] {
        for pattern in patterns {
            if let Err(e) = regex_lite::Regex::new(pattern) {
                return Err(validation_err(format!(
                    "classifier.{field}: invalid regex '{pattern}': {e}"
                )));
            }
        }
    }

    for (keyword, weight) in &classifier.keyword_weights {
        if keyword.trim().is_empty() {
            return Err(validation_err(
                "classifier.keyword_weights contains an empty keyword",
            ));
        }
        if !weight.is_finite() {
            return Err(validation_err(format!(
                "classifier.keyword_weights['{keyword}'] must be finite"
            )));
        }
    }
    Ok(())
}

const VALID_LOG_LEVELS: &[&str] = &[
    "DEBUG", "INFO", "WARNING", "WARN", "ERROR", "CRITICAL", "DISABLED",
];

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let level = config.features.log_level.to_uppercase();
    if !VALID_LOG_LEVELS.contains(&level.as_str()) {
        return Err(validation_err(format!(
            "features.log_level must be one of: {}",
            VALID_LOG_LEVELS.join(", ")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ClassifierConfig, ClientAuthConfig, FeaturesConfig, ModelConfig, ModelMode, ServerConfig,
        UpstreamConfig,
    };

    fn base_config() -> AppConfig {
        AppConfig {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            client_authentication: ClientAuthConfig {
                api_key: "sk-test".to_string(),
            },
            features: FeaturesConfig::default(),
            models: vec![ModelConfig {
                alias: "glm-4.5".to_string(),
                upstream_id: "0727-360B-API".to_string(),
                mode: ModelMode::Auto,
            }],
            classifier: ClassifierConfig::default(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn empty_api_key_rejected() {
        let mut config = base_config();
        config.client_authentication.api_key = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn bad_base_url_rejected() {
        let mut config = base_config();
        config.upstream.base_url = "chat.z.ai".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn duplicate_alias_rejected() {
        let mut config = base_config();
        config.models.push(config.models[0].clone());
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate model alias"));
    }

    #[test]
    fn invalid_force_pattern_rejected() {
        let mut config = base_config();
        config
            .classifier
            .force_search_patterns
            .push("([unclosed".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn negative_threshold_rejected() {
        let mut config = base_config();
        config.classifier.search_threshold = -1.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn zero_token_cache_rejected() {
        let mut config = base_config();
        config.upstream.token_cache_minutes = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn unknown_log_level_rejected() {
        let mut config = base_config();
        config.features.log_level = "CHATTY".to_string();
        assert!(validate_config(&config).is_err());
    }
}
