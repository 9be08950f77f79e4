use crate::config::types::{CacheConfig, Config, OutputConfig, RendererConfig};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_renderer_config(&config.renderer)?;
    validate_output_config(&config.output)?;
    validate_cache_config(&config.cache)?;
    Ok(())
}

/// Validates renderer configuration
fn validate_renderer_config(config: &RendererConfig) -> Result<(), ConfigError> {
    if config.page_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "page_timeout_ms must be >= 100ms, got {}ms",
            config.page_timeout_ms
        )));
    }

    if config.max_concurrent_captures < 1 || config.max_concurrent_captures > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_captures must be between 1 and 64, got {}",
            config.max_concurrent_captures
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.artifact_dir.is_empty() {
        return Err(ConfigError::Validation(
            "artifact_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates cache configuration
fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.ttl_secs < 1 {
        return Err(ConfigError::Validation(
            "ttl_secs must be >= 1".to_string(),
        ));
    }

    if config.capacity < 1 {
        return Err(ConfigError::Validation(
            "capacity must be >= 1".to_string(),
        ));
    }

    Ok(())
}
