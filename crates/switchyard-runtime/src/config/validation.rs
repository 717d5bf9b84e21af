//! Configuration validation utilities.

use std::collections::HashSet;

use super::error::{ConfigError, ConfigResult};
use super::schema::{
    BotConfig, LimitConfig, LogOutput, LoggingConfig, ResilienceConfig, SwitchyardConfig,
    WebhookConfig,
};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validates the entire configuration.
pub fn validate_config(config: &SwitchyardConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_webhook_config(&config.webhook)?;
    validate_resilience_config(&config.resilience)?;
    validate_bots_config(&config.bots)?;

    if config.dispatch.handler_timeout_ms == Some(0) {
        return Err(ConfigError::validation(
            "Handler timeout must be greater than 0",
        ));
    }

    Ok(())
}

fn validate_log_level(level: &str) -> ConfigResult<()> {
    if !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        return Err(ConfigError::validation(format!(
            "Invalid log level: {level}. Valid values are: {LOG_LEVELS:?}"
        )));
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    validate_log_level(&logging.level)?;

    for (module, level) in &logging.filters {
        if module.is_empty() {
            return Err(ConfigError::validation("Log filter module cannot be empty"));
        }
        validate_log_level(level)?;
    }

    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    Ok(())
}

fn validate_webhook_config(webhook: &WebhookConfig) -> ConfigResult<()> {
    if !webhook.path.starts_with('/') {
        return Err(ConfigError::validation("Webhook path must start with '/'"));
    }

    if let Some(url) = &webhook.base_url
        && !["http://", "https://"].iter().any(|s| url.starts_with(s))
    {
        return Err(ConfigError::invalid_url(
            url,
            "URL must start with http:// or https://",
        ));
    }

    Ok(())
}

fn validate_limit(name: &str, limit: &LimitConfig) -> ConfigResult<()> {
    if limit.permits == 0 {
        return Err(ConfigError::validation(format!(
            "{name}: permits must be greater than 0"
        )));
    }
    if limit.per_ms == 0 {
        return Err(ConfigError::validation(format!(
            "{name}: window must be greater than 0"
        )));
    }
    if limit.burst < 1 {
        return Err(ConfigError::validation(format!(
            "{name}: burst must be at least 1"
        )));
    }
    Ok(())
}

fn validate_resilience_config(resilience: &ResilienceConfig) -> ConfigResult<()> {
    validate_limit("resilience.global", &resilience.global)?;
    validate_limit("resilience.chat_per_minute", &resilience.chat_per_minute)?;
    validate_limit("resilience.chat_per_second", &resilience.chat_per_second)?;

    if resilience.policy_idle_secs == 0 {
        return Err(ConfigError::validation(
            "Policy idle time must be greater than 0",
        ));
    }

    Ok(())
}

fn validate_bots_config(bots: &[BotConfig]) -> ConfigResult<()> {
    let mut seen_ids = HashSet::new();

    for bot in bots {
        if !seen_ids.insert(bot.id) {
            return Err(ConfigError::DuplicateBotId(bot.id));
        }
        if bot.id == 0 {
            return Err(ConfigError::validation("Bot id cannot be 0"));
        }
    }

    Ok(())
}
