use crate::config::types::{
    Config, ExtractorConfig, HarvestConfig, HttpConfig, InputConfig, MAX_BACKOFF_SECONDS,
    MAX_REQUEST_TIMEOUT_SECONDS,
};
use crate::ConfigError;
use reqwest::header::{HeaderName, HeaderValue};

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvest_config(&config.harvest)?;
    validate_http_config(&config.http)?;
    validate_input_config(&config.input)?;
    validate_output_config(&config.output)?;
    validate_extractor_config(&config.extractor)?;
    Ok(())
}

/// Validates scheduler configuration
fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    if config.max_concurrency < 1 || config.max_concurrency > 500 {
        return Err(ConfigError::Validation(format!(
            "max_concurrency must be between 1 and 500, got {}",
            config.max_concurrency
        )));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    if !config.backoff_factor.is_finite() || config.backoff_factor < 0.0 {
        return Err(ConfigError::Validation(format!(
            "backoff_factor must be a finite number >= 0, got {}",
            config.backoff_factor
        )));
    }

    // Longest sleep happens after the last retryable attempt, at the top of the jitter range
    let longest_backoff = 1.5 * config.backoff_factor * f64::from(config.max_retries);
    if longest_backoff > MAX_BACKOFF_SECONDS {
        return Err(ConfigError::Validation(format!(
            "backoff_factor {} allows a backoff of {:.0}s, more than {}s",
            config.backoff_factor, longest_backoff, MAX_BACKOFF_SECONDS
        )));
    }

    if config.batch_deadline_seconds == Some(0) {
        return Err(ConfigError::Validation(
            "batch_deadline_seconds must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates the request shape
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if !config.request_timeout_seconds.is_finite()
        || config.request_timeout_seconds <= 0.0
        || config.request_timeout_seconds > MAX_REQUEST_TIMEOUT_SECONDS
    {
        return Err(ConfigError::Validation(format!(
            "request_timeout_seconds must be in (0, {}], got {}",
            MAX_REQUEST_TIMEOUT_SECONDS,
            config.request_timeout_seconds
        )));
    }

    if config.user_agent_pool.is_empty() {
        return Err(ConfigError::Validation(
            "user_agent_pool must contain at least one user agent".to_string(),
        ));
    }

    for agent in &config.user_agent_pool {
        if agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "user_agent_pool cannot contain blank entries".to_string(),
            ));
        }
        HeaderValue::from_str(agent)
            .map_err(|_| ConfigError::InvalidHeader(format!("User-Agent '{}'", agent)))?;
    }

    for (name, value) in &config.header_template {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::InvalidHeader(format!("name '{}'", name)))?;

        // The rotating pool owns this header
        if header == reqwest::header::USER_AGENT {
            return Err(ConfigError::InvalidHeader(
                "User-Agent belongs in user_agent_pool, not header_template".to_string(),
            ));
        }

        HeaderValue::from_str(value)
            .map_err(|_| ConfigError::InvalidHeader(format!("value for '{}'", name)))?;
    }

    Ok(())
}

/// Validates input configuration
fn validate_input_config(config: &InputConfig) -> Result<(), ConfigError> {
    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be >= 1, got {}",
            config.batch_size
        )));
    }

    if config.max_urls_per_group < 1 {
        return Err(ConfigError::Validation(format!(
            "max_urls_per_group must be >= 1, got {}",
            config.max_urls_per_group
        )));
    }

    if config.files.iter().any(|f| f.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "input files cannot contain empty paths".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &crate::config::types::OutputConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates extractor configuration
fn validate_extractor_config(config: &ExtractorConfig) -> Result<(), ConfigError> {
    match config {
        ExtractorConfig::Heading { selector } => {
            scraper::Selector::parse(selector)
                .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))?;
        }
        ExtractorConfig::EmbeddedData { keys } => {
            if keys.iter().any(|k| k.is_empty()) {
                return Err(ConfigError::Validation(
                    "embedded-data keys cannot be empty strings".to_string(),
                ));
            }
        }
    }

    Ok(())
}
