//! Service configuration
//!
//! Settings are layered from an optional `config/timeclock.*` file and
//! `TIMECLOCK__*` environment variables, e.g. `TIMECLOCK__AUTH__JWT_SECRET`.
//! Database settings stay in the `DATABASE_*` variables read by
//! [`common::database::DatabaseConfig`].

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::{
    jwt::{DEFAULT_COOKIE_NAME, JwtConfig},
    services::GenerationWindow,
    validation::validate_window_months,
};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub payroll: PayrollConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Take the audited client address from `x-forwarded-for`. Only enable
    /// behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            trust_forwarded_for: false,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

fn default_cookie_name() -> String {
    DEFAULT_COOKIE_NAME.to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PayrollConfig {
    /// Six-field cron expression, seconds first
    pub generation_schedule: String,
    pub scheduler_enabled: bool,
    pub months_ahead: u32,
    pub months_back: u32,
}

impl Default for PayrollConfig {
    fn default() -> Self {
        let window = GenerationWindow::default();
        Self {
            generation_schedule: "0 0 3 * * *".to_string(),
            scheduler_enabled: true,
            months_ahead: window.months_ahead,
            months_back: window.months_back,
        }
    }
}

impl AppConfig {
    /// Load from `config/timeclock` and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/timeclock").required(false))
            .add_source(
                Environment::with_prefix("TIMECLOCK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Message("auth.jwt_secret must not be empty".to_string()));
        }
        validate_window_months("payroll.months_ahead", self.payroll.months_ahead)
            .map_err(ConfigError::Message)?;
        validate_window_months("payroll.months_back", self.payroll.months_back)
            .map_err(ConfigError::Message)?;
        Ok(())
    }

    pub fn jwt(&self) -> JwtConfig {
        JwtConfig {
            secret: self.auth.jwt_secret.clone(),
            cookie_name: self.auth.cookie_name.clone(),
        }
    }

    pub fn generation_window(&self) -> GenerationWindow {
        GenerationWindow {
            months_ahead: self.payroll.months_ahead,
            months_back: self.payroll.months_back,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear_env() {
        unsafe {
            env::remove_var("TIMECLOCK__AUTH__JWT_SECRET");
            env::remove_var("TIMECLOCK__AUTH__COOKIE_NAME");
            env::remove_var("TIMECLOCK__SERVER__PORT");
            env::remove_var("TIMECLOCK__SERVER__TRUST_FORWARDED_FOR");
            env::remove_var("TIMECLOCK__PAYROLL__MONTHS_AHEAD");
        }
    }

    #[test]
    #[serial]
    fn test_defaults_with_secret() {
        clear_env();
        unsafe {
            env::set_var("TIMECLOCK__AUTH__JWT_SECRET", "s3cret");
        }

        let config = AppConfig::load().expect("Failed to load config");
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.auth.cookie_name, "token");
        assert_eq!(config.server.bind_address(), "0.0.0.0:3001");
        assert!(!config.server.trust_forwarded_for);
        assert_eq!(config.payroll.generation_schedule, "0 0 3 * * *");
        assert_eq!(config.generation_window(), GenerationWindow::default());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        clear_env();
        unsafe {
            env::set_var("TIMECLOCK__AUTH__JWT_SECRET", "s3cret");
            env::set_var("TIMECLOCK__AUTH__COOKIE_NAME", "session");
            env::set_var("TIMECLOCK__SERVER__PORT", "8080");
            env::set_var("TIMECLOCK__SERVER__TRUST_FORWARDED_FOR", "true");
            env::set_var("TIMECLOCK__PAYROLL__MONTHS_AHEAD", "6");
        }

        let config = AppConfig::load().expect("Failed to load config");
        assert_eq!(config.auth.cookie_name, "session");
        assert_eq!(config.server.port, 8080);
        assert!(config.server.trust_forwarded_for);
        assert_eq!(config.payroll.months_ahead, 6);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_missing_secret_is_an_error() {
        clear_env();
        assert!(AppConfig::load().is_err());
    }

    #[test]
    #[serial]
    fn test_window_bounds_are_checked() {
        clear_env();
        unsafe {
            env::set_var("TIMECLOCK__AUTH__JWT_SECRET", "s3cret");
            env::set_var("TIMECLOCK__PAYROLL__MONTHS_AHEAD", "48");
        }

        assert!(AppConfig::load().is_err());

        clear_env();
    }
}
