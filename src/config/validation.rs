use crate::config::types::{
    Config, FetchConfig, OutputConfig, PortalConfig, SelectorConfig, UserAgentConfig,
};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_portal_config(&config.portal)?;
    validate_fetch_config(&config.fetch)?;
    validate_selector_config(&config.selectors)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates portal location and navigation steps
fn validate_portal_config(config: &PortalConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "base-url must use http or https, got '{}'",
            base.scheme()
        )));
    }

    base.join(&config.entry_path).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid entry-path '{}': {}", config.entry_path, e))
    })?;

    if let Some(param) = &config.token_param {
        if param.trim().is_empty() {
            return Err(ConfigError::Validation(
                "token-param cannot be empty when set".to_string(),
            ));
        }
    }

    if config.session_expired_marker.is_empty() {
        return Err(ConfigError::Validation(
            "session-expired-marker cannot be empty".to_string(),
        ));
    }

    if config.max_session_idle_secs == 0 {
        return Err(ConfigError::Validation(
            "max-session-idle-secs must be >= 1".to_string(),
        ));
    }

    let semester_steps = config.navigation.iter().filter(|s| s.semester).count();
    if semester_steps > 1 {
        return Err(ConfigError::Validation(format!(
            "at most one navigation step may select the semester, got {}",
            semester_steps
        )));
    }

    for step in &config.navigation {
        validate_selector(&step.selector)?;
    }

    Ok(())
}

/// Validates fetcher limits
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.retry_count > 10 {
        return Err(ConfigError::Validation(format!(
            "retry-count must be between 0 and 10, got {}",
            config.retry_count
        )));
    }

    if config.timeout_secs < 1 || config.timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be between 1 and 300, got {}",
            config.timeout_secs
        )));
    }

    if config.concurrency < 1 || config.concurrency > 32 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 32, got {}",
            config.concurrency
        )));
    }

    Ok(())
}

/// Validates that every configured selector parses
fn validate_selector_config(config: &SelectorConfig) -> Result<(), ConfigError> {
    validate_selector(&config.directory_link)?;
    validate_selector(&config.course_link)?;
    validate_selector(&config.next_page)?;
    validate_selector(&config.semester_indicator)?;

    if config.detail_marker.is_empty() {
        return Err(ConfigError::Validation(
            "detail-marker cannot be empty".to_string(),
        ));
    }

    if config.course_id_param.is_empty() {
        return Err(ConfigError::Validation(
            "course-id-param cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })?;
    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.export_dir.is_empty() {
        return Err(ConfigError::Validation(
            "export_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
