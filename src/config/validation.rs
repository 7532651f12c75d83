use crate::config::types::{
    ClassifierConfig, Config, CrawlerConfig, FilterConfig, OutputConfig, TerminationConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_filter_config(&config.filter)?;
    validate_classifier_config(&config.classifier)?;
    validate_termination_config(&config.termination)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates fetch stage configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 1024 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-fetches must be between 1 and 1024, got {}",
            config.max_concurrent_fetches
        )));
    }

    if config.tries < 1 {
        return Err(ConfigError::Validation(format!(
            "tries must be >= 1, got {}",
            config.tries
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    for seed in &config.seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use the http or https scheme",
                seed
            )));
        }
    }

    Ok(())
}

/// Validates the domain filter lists
fn validate_filter_config(config: &FilterConfig) -> Result<(), ConfigError> {
    if config.allowed_suffixes.is_empty() {
        return Err(ConfigError::Validation(
            "allowed-suffixes cannot be empty".to_string(),
        ));
    }

    for suffix in &config.allowed_suffixes {
        validate_suffix(suffix)?;
    }

    for extension in &config.allowed_extensions {
        validate_extension(extension)?;
    }

    for site in &config.allowed_sites {
        validate_domain_pattern(site)?;
    }

    Ok(())
}

fn validate_classifier_config(config: &ClassifierConfig) -> Result<(), ConfigError> {
    if config.flush_batch_size < 1 {
        return Err(ConfigError::Validation(
            "flush-batch-size must be >= 1".to_string(),
        ));
    }

    if config.keywords.iter().any(|k| k.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "keywords cannot contain blank entries".to_string(),
        ));
    }

    Ok(())
}

fn validate_termination_config(config: &TerminationConfig) -> Result<(), ConfigError> {
    if config.poll_interval_ms < 1 {
        return Err(ConfigError::Validation(
            "poll-interval-ms must be >= 1".to_string(),
        ));
    }

    if config.poll_interval_ms > config.observation_interval_ms {
        return Err(ConfigError::Validation(format!(
            "poll-interval-ms ({}) cannot exceed observation-interval-ms ({})",
            config.poll_interval_ms, config.observation_interval_ms
        )));
    }

    if config.ack_timeout_ms < 1 {
        return Err(ConfigError::Validation(
            "ack-timeout-ms must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates a public suffix entry such as `pt` or `com.pt`
fn validate_suffix(suffix: &str) -> Result<(), ConfigError> {
    if suffix.is_empty() || suffix.split('.').any(|label| !is_valid_label(label)) {
        return Err(ConfigError::InvalidPattern(format!(
            "Suffix '{}' must be dot-separated labels of letters, digits and hyphens",
            suffix
        )));
    }
    Ok(())
}

/// Validates a path extension: empty, or a dot followed by one label
fn validate_extension(extension: &str) -> Result<(), ConfigError> {
    if extension.is_empty() {
        return Ok(());
    }

    match extension.strip_prefix('.') {
        Some(rest) if !rest.is_empty() && rest.chars().all(|c| c.is_alphanumeric()) => Ok(()),
        _ => Err(ConfigError::Validation(format!(
            "Extension '{}' must be empty or look like '.html'",
            extension
        ))),
    }
}

/// Validates a domain pattern (supports `*.` wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    let domain = pattern.strip_prefix("*.").unwrap_or(pattern);

    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    if domain.split('.').any(|label| !is_valid_label(label)) {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains an empty label or invalid characters",
            domain
        )));
    }

    Ok(())
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.chars().all(|c| c.is_alphanumeric() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_domain_pattern() {
        assert!(validate_domain_pattern("portal-sites.net").is_ok());
        assert!(validate_domain_pattern("*.portal-sites.net").is_ok());
        assert!(validate_domain_pattern("127.0.0.1").is_ok());

        assert!(validate_domain_pattern("").is_err());
        assert!(validate_domain_pattern("*.").is_err());
        assert!(validate_domain_pattern("example").is_err());
        assert!(validate_domain_pattern(".example.com").is_err());
        assert!(validate_domain_pattern("example..com").is_err());
    }

    #[test]
    fn test_validate_suffix() {
        assert!(validate_suffix("pt").is_ok());
        assert!(validate_suffix("com.pt").is_ok());

        assert!(validate_suffix("").is_err());
        assert!(validate_suffix(".pt").is_err());
        assert!(validate_suffix("com..pt").is_err());
    }

    #[test]
    fn test_validate_extension() {
        assert!(validate_extension("").is_ok());
        assert!(validate_extension(".html").is_ok());

        assert!(validate_extension("html").is_err());
        assert!(validate_extension(".").is_err());
        assert!(validate_extension(".tar.gz").is_err());
    }

    #[test]
    fn test_rejects_non_http_seed() {
        let mut config = Config::default();
        config.crawler.seeds = vec!["ftp://a.pt/".to_string()];
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_poll_longer_than_observation() {
        let mut config = Config::default();
        config.termination.poll_interval_ms = 20_000;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_zero_tries() {
        let mut config = Config::default();
        config.crawler.tries = 0;
        assert!(validate(&config).is_err());
    }
}
