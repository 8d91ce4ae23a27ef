use crate::config::types::{Config, CrawlerConfig, OutputConfig, RenderConfig, SessionConfig};
use crate::ConfigError;
use url::Url;

/// Longest settle wait accepted, in milliseconds
const MAX_SETTLE_MS: u64 = 60_000;

/// Shortest navigation timeout accepted, in milliseconds
const MIN_TIMEOUT_MS: u64 = 1_000;

const MAX_WORKERS: usize = 8;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_session_config(&config.session)?;
    validate_render_config(&config.render)?;
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the vehicle session
fn validate_session_config(config: &SessionConfig) -> Result<(), ConfigError> {
    if config.car.trim().is_empty() {
        return Err(ConfigError::Validation("car cannot be empty".to_string()));
    }

    if config.ssd.trim().is_empty() {
        return Err(ConfigError::Validation("ssd cannot be empty".to_string()));
    }

    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation(format!(
            "base-url '{}' must use http or https",
            config.base_url
        )));
    }

    Ok(())
}

/// Validates render configuration
fn validate_render_config(config: &RenderConfig) -> Result<(), ConfigError> {
    if config.settle_ms > MAX_SETTLE_MS {
        return Err(ConfigError::Validation(format!(
            "settle-ms must be <= {}ms, got {}ms",
            MAX_SETTLE_MS, config.settle_ms
        )));
    }

    if config.timeout_ms < MIN_TIMEOUT_MS {
        return Err(ConfigError::Validation(format!(
            "timeout-ms must be >= {}ms, got {}ms",
            MIN_TIMEOUT_MS, config.timeout_ms
        )));
    }

    if let Some(user_agent) = &config.user_agent {
        if user_agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "user-agent cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.page_size < 1 {
        return Err(ConfigError::Validation(format!(
            "page-size must be >= 1, got {}",
            config.page_size
        )));
    }

    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
