use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let base_url = config.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://"))
        || base_url.trim_end_matches('/').ends_with(':')
        || base_url.contains(char::is_whitespace)
    {
        return Err(ConfigError::Validation {
            message: format!("base_url must be an http(s) URL: '{}'", config.base_url),
        });
    }

    if !config
        .serial_prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric())
    {
        return Err(ConfigError::Validation {
            message: format!(
                "serial_prefix may only contain ASCII letters and digits: '{}'",
                config.serial_prefix
            ),
        });
    }

    if config.serial_retry_limit == 0 {
        return Err(ConfigError::Validation {
            message: "serial_retry_limit must be at least 1".to_string(),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    if !crate::catalog::is_valid_email(&config.sender.email) {
        return Err(ConfigError::Validation {
            message: format!("Invalid sender email: '{}'", config.sender.email),
        });
    }

    if config.certificates_directory == config.outbox_directory {
        return Err(ConfigError::Validation {
            message: "certificates_directory and outbox_directory must differ".to_string(),
        });
    }

    Ok(())
}
