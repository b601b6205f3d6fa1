use crate::config::types::{
    Config, CrawlerConfig, ExtractionConfig, LightweightConfig, MonitorConfig, OutputConfig,
    RenderingConfig, ScoringWeights, SelectionConfig,
};
use crate::profile::SiteProfile;
use crate::url::normalize_domain;
use crate::ConfigError;
use regex::RegexBuilder;
use scraper::Selector;
use std::collections::HashSet;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_lightweight_config(&config.lightweight)?;
    validate_rendering_config(&config.rendering)?;
    validate_extraction_config(&config.extraction)?;
    validate_selection_config(&config.selection)?;
    validate_monitor_config(&config.monitor)?;
    validate_output_config(&config.output)?;
    validate_profile(&config.default_profile, "default-profile")?;
    validate_sites(&config.sites)?;
    Ok(())
}

/// Validates orchestrator and cache settings
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.cache_capacity < 1 {
        return Err(ConfigError::Validation(
            "cache-capacity must be >= 1".to_string(),
        ));
    }

    if config.cache_ttl_secs < 1 {
        return Err(ConfigError::Validation(
            "cache-ttl-secs must be >= 1".to_string(),
        ));
    }

    if config.batch_concurrency < 1 || config.batch_concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "batch-concurrency must be between 1 and 100, got {}",
            config.batch_concurrency
        )));
    }

    Ok(())
}

/// Validates lightweight fetch settings
fn validate_lightweight_config(config: &LightweightConfig) -> Result<(), ConfigError> {
    if config.max_concurrent < 1 || config.max_concurrent > 100 {
        return Err(ConfigError::Validation(format!(
            "lightweight max-concurrent must be between 1 and 100, got {}",
            config.max_concurrent
        )));
    }

    if config.retries > 10 {
        return Err(ConfigError::Validation(format!(
            "lightweight retries must be <= 10, got {}",
            config.retries
        )));
    }

    if config.jitter_min_ms > config.jitter_max_ms {
        return Err(ConfigError::Validation(format!(
            "jitter-min-ms ({}) must not exceed jitter-max-ms ({})",
            config.jitter_min_ms, config.jitter_max_ms
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates browser session settings
fn validate_rendering_config(config: &RenderingConfig) -> Result<(), ConfigError> {
    if config.max_sessions < 1 || config.max_sessions > 16 {
        return Err(ConfigError::Validation(format!(
            "rendering max-sessions must be between 1 and 16, got {}",
            config.max_sessions
        )));
    }

    if !(0.0..=1.0).contains(&config.hybrid_min_text_ratio) {
        return Err(ConfigError::Validation(format!(
            "hybrid-min-text-ratio must be within [0, 1], got {}",
            config.hybrid_min_text_ratio
        )));
    }

    if config.session_cache_capacity < 1 {
        return Err(ConfigError::Validation(
            "session-cache-capacity must be >= 1".to_string(),
        ));
    }

    validate_selectors(&config.wait_selectors)?;
    validate_selectors(&config.modal_selectors)?;
    validate_selectors(&config.cookie_selectors)?;

    Ok(())
}

/// Validates extraction thresholds, weights and patterns
fn validate_extraction_config(config: &ExtractionConfig) -> Result<(), ConfigError> {
    if config.top_k < 1 {
        return Err(ConfigError::Validation("top-k must be >= 1".to_string()));
    }

    if config.min_fallback_chars > config.min_primary_chars {
        return Err(ConfigError::Validation(format!(
            "min-fallback-chars ({}) must not exceed min-primary-chars ({})",
            config.min_fallback_chars, config.min_primary_chars
        )));
    }

    validate_scoring_weights(&config.weights)?;
    validate_patterns(&config.boilerplate_patterns)?;
    validate_selectors(&config.noise_selectors)?;

    Ok(())
}

fn validate_scoring_weights(weights: &ScoringWeights) -> Result<(), ConfigError> {
    for (name, value) in [
        ("length", weights.length),
        ("density", weights.density),
        ("link", weights.link),
        ("position", weights.position),
        ("edge-position-weight", weights.edge_position_weight),
    ] {
        validate_unit_interval(name, value)?;
    }

    if weights.length_saturation <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "length-saturation must be > 0, got {}",
            weights.length_saturation
        )));
    }

    if weights.link_penalty_factor < 0.0 {
        return Err(ConfigError::Validation(format!(
            "link-penalty-factor must be >= 0, got {}",
            weights.link_penalty_factor
        )));
    }

    Ok(())
}

/// Validates strategy ranking settings
fn validate_selection_config(config: &SelectionConfig) -> Result<(), ConfigError> {
    validate_unit_interval("success-weight", config.success_weight)?;
    validate_unit_interval("speed-weight", config.speed_weight)?;

    if config.min_attempts < 1 {
        return Err(ConfigError::Validation(
            "selection min-attempts must be >= 1".to_string(),
        ));
    }

    if config.response_time_scale <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "response-time-scale must be > 0, got {}",
            config.response_time_scale
        )));
    }

    Ok(())
}

/// Validates monitor settings
fn validate_monitor_config(config: &MonitorConfig) -> Result<(), ConfigError> {
    if config.history_capacity < 1 || config.trend_capacity < 1 || config.trend_window < 1 {
        return Err(ConfigError::Validation(
            "history-capacity, trend-capacity and trend-window must be >= 1".to_string(),
        ));
    }

    if config.retention_days < 1 {
        return Err(ConfigError::Validation(format!(
            "retention-days must be >= 1, got {}",
            config.retention_days
        )));
    }

    if config.maintenance_interval_secs < 1 {
        return Err(ConfigError::Validation(
            "maintenance-interval-secs must be >= 1".to_string(),
        ));
    }

    validate_unit_interval("problem-success-rate", config.problem_success_rate)?;
    validate_unit_interval("problem-soft-success-rate", config.problem_soft_success_rate)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.report_path.is_empty() {
        return Err(ConfigError::Validation(
            "report-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the `[[site]]` entries
fn validate_sites(sites: &[SiteProfile]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for site in sites {
        validate_domain_string(&site.domain)?;

        let normalized = normalize_domain(&site.domain);
        if !seen.insert(normalized.clone()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate site profile for domain '{}'",
                normalized
            )));
        }

        validate_profile(site, &normalized)?;
    }

    Ok(())
}

/// Validates the selectors, filters and timings of one profile
fn validate_profile(profile: &SiteProfile, label: &str) -> Result<(), ConfigError> {
    if profile.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "Profile '{}': timeout-secs must be >= 1",
            label
        )));
    }

    if !profile.wait_time_secs.is_finite() || profile.wait_time_secs < 0.0 {
        return Err(ConfigError::Validation(format!(
            "Profile '{}': wait-time-secs must be a non-negative number",
            label
        )));
    }

    validate_selectors(&profile.content_selectors)?;
    validate_selectors(&profile.exclude_selectors)?;
    validate_selectors(&profile.wait_selectors)?;
    validate_patterns(&profile.text_filters)?;

    Ok(())
}

/// Validates a domain string
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidDomain(
            "Domain cannot be empty".to_string(),
        ));
    }

    // Check for invalid characters
    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidDomain(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidDomain(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidDomain(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidDomain(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}

fn validate_unit_interval(name: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::Validation(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_selectors(selectors: &[String]) -> Result<(), ConfigError> {
    for selector in selectors {
        Selector::parse(selector).map_err(|_| ConfigError::InvalidSelector(selector.clone()))?;
    }
    Ok(())
}

fn validate_patterns(patterns: &[String]) -> Result<(), ConfigError> {
    for pattern in patterns {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_domain_string() {
        assert!(validate_domain_string("example.com").is_ok());
        assert!(validate_domain_string("www.socialmediatoday.com").is_ok());

        assert!(validate_domain_string("").is_err());
        assert!(validate_domain_string("*.example.com").is_err());
        assert!(validate_domain_string("example").is_err());
        assert!(validate_domain_string(".example.com").is_err());
        assert!(validate_domain_string("example..com").is_err());
    }

    #[test]
    fn test_rejects_weights_outside_unit_interval() {
        let mut config = Config::default();
        config.extraction.weights.density = 1.5;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));

        let mut config = Config::default();
        config.selection.success_weight = -0.1;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_bad_concurrency_bounds() {
        let mut config = Config::default();
        config.lightweight.max_concurrent = 0;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.rendering.max_sessions = 64;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.crawler.batch_concurrency = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_inverted_jitter_range() {
        let mut config = Config::default();
        config.lightweight.jitter_min_ms = 900;
        config.lightweight.jitter_max_ms = 100;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_invalid_pattern_and_selector() {
        let mut config = Config::default();
        config.extraction.boilerplate_patterns.push("(unclosed".to_string());
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidPattern { .. })
        ));

        let mut config = Config::default();
        config.default_profile.content_selectors = vec!["div[".to_string()];
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidSelector(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_sites_after_normalization() {
        let mut config = Config::default();
        config.sites = vec![
            SiteProfile {
                domain: "medium.com".to_string(),
                ..SiteProfile::generic()
            },
            SiteProfile {
                domain: "WWW.medium.com".to_string(),
                ..SiteProfile::generic()
            },
        ];
        assert!(validate(&config).is_err());
    }
}
