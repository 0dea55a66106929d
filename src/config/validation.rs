//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServiceConfig;

/// A single semantic problem with a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field}: must not be empty")]
    Empty { field: &'static str },

    #[error("listener.public_url: invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("{field}: well-known placeholder values are not accepted")]
    Placeholder { field: &'static str },
}

/// Sample passwords that must never guard a staff account.
const PLACEHOLDER_PASSWORDS: &[&str] = &["CHANGE_ME_IN_PRODUCTION", "changeme", "admin", "password"];

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if let Some(public_url) = &config.listener.public_url {
        if url::Url::parse(public_url).is_err() {
            errors.push(ValidationError::InvalidUrl(public_url.clone()));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.request_secs" });
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::Zero { field: "security.max_body_size" });
    }

    if config.auth.admin_username.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "auth.admin_username" });
    }

    if PLACEHOLDER_PASSWORDS
        .iter()
        .any(|p| p.eq_ignore_ascii_case(&config.auth.admin_password))
    {
        errors.push(ValidationError::Placeholder { field: "auth.admin_password" });
    }

    if config.auth.session_age_secs == 0 {
        errors.push(ValidationError::Zero { field: "auth.session_age_secs" });
    }

    if config.auth.session_cookie.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "auth.session_cookie" });
    }

    if config.auth.requests_per_second == 0 {
        errors.push(ValidationError::Zero { field: "auth.requests_per_second" });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServiceConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ServiceConfig::default();
        config.auth.admin_username = "  ".into();
        config.listener.public_url = Some("::nope".into());
        config.security.max_body_size = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::Empty { field: "auth.admin_username" }));
    }

    #[test]
    fn test_default_config_has_no_admin_password() {
        let config = ServiceConfig::default();
        assert!(config.auth.admin_password.is_empty());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_placeholder_admin_password_rejected() {
        for password in ["CHANGE_ME_IN_PRODUCTION", "Password"] {
            let mut config = ServiceConfig::default();
            config.auth.admin_password = password.into();
            assert_eq!(
                validate_config(&config).unwrap_err(),
                vec![ValidationError::Placeholder { field: "auth.admin_password" }]
            );
        }

        let mut config = ServiceConfig::default();
        config.auth.admin_password = "s3cret-enough".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_metrics_address_only_checked_when_enabled() {
        let mut config = ServiceConfig::default();
        config.observability.metrics_address = "bogus".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
