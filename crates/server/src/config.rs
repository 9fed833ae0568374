//! Server configuration, read from the environment after the profile's
//! `.env` files have been loaded.

use std::{str::FromStr, time::Duration};

use services::services::{inventory::ElevationSettings, rack_elevation::AnchorPolicy};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use utils::logging::LogFormat;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}' ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Deployment profile, selects `.env.<profile>` and the default log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AppEnv {
    #[default]
    Dev,
    Uat,
    Prod,
    Test,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub env: AppEnv,
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
    pub cors_origins: CorsOrigins,
    pub elevation: ElevationSettings,
    pub summary_cache_ttl: Duration,
    pub sentry_dsn: Option<String>,
}

fn parse<T>(var: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

impl ServerConfig {
    /// Loads `.env.<DCIM_ENV>` then `.env` (neither overrides variables that
    /// are already set) and reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let profile = std::env::var("DCIM_ENV").unwrap_or_else(|_| AppEnv::default().to_string());
        let _ = dotenvy::from_filename(format!(".env.{}", profile.to_lowercase()));
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let env = parse("DCIM_ENV", get("DCIM_ENV"), AppEnv::default())?;
        let port = match get("BACKEND_PORT") {
            Some(port) => parse("BACKEND_PORT", Some(port), 8000)?,
            None => parse("PORT", get("PORT"), 8000)?,
        };
        let log_format = parse("LOG_FORMAT", get("LOG_FORMAT"), LogFormat::default())?;
        let anchor = parse("RACK_ANCHOR", get("RACK_ANCHOR"), AnchorPolicy::default())?;
        let unit_px: u32 = parse("RACK_UNIT_PX", get("RACK_UNIT_PX"), 20)?;
        if unit_px == 0 {
            return Err(ConfigError::Invalid {
                var: "RACK_UNIT_PX",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let ttl: u64 = parse(
            "SUMMARY_CACHE_TTL_SECONDS",
            get("SUMMARY_CACHE_TTL_SECONDS"),
            30,
        )?;

        let cors_origins = match get("CORS_ORIGINS") {
            None => CorsOrigins::Any,
            Some(raw) if raw.trim() == "*" => CorsOrigins::Any,
            Some(raw) => CorsOrigins::List(
                raw.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect(),
            ),
        };

        Ok(Self {
            env,
            database_url: get("DATABASE_URL").unwrap_or_else(|| "sqlite://dcim.db".to_string()),
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            log_format,
            cors_origins,
            elevation: ElevationSettings { anchor, unit_px },
            summary_cache_ttl: Duration::from_secs(ttl),
            sentry_dsn: get("SENTRY_DSN"),
        })
    }

    pub fn default_log_level(&self) -> &'static str {
        match self.env {
            AppEnv::Prod => "info",
            _ => "debug",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.env, AppEnv::Dev);
        assert_eq!(config.database_url, "sqlite://dcim.db");
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8000);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.cors_origins, CorsOrigins::Any);
        assert_eq!(config.elevation, ElevationSettings::default());
        assert_eq!(config.summary_cache_ttl, Duration::from_secs(30));
        assert_eq!(config.sentry_dsn, None);
        assert_eq!(config.default_log_level(), "debug");
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("DCIM_ENV", "PROD"),
            ("BACKEND_PORT", "9000"),
            ("PORT", "7000"),
            ("LOG_FORMAT", "json"),
            ("CORS_ORIGINS", "http://a.example, http://b.example,"),
            ("RACK_ANCHOR", "bottom"),
            ("RACK_UNIT_PX", "24"),
            ("SUMMARY_CACHE_TTL_SECONDS", "0"),
            ("SENTRY_DSN", "https://key@sentry.example/1"),
        ])
        .unwrap();
        assert_eq!(config.env, AppEnv::Prod);
        assert_eq!(config.default_log_level(), "info");
        assert_eq!(config.port, 9000);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.cors_origins,
            CorsOrigins::List(vec![
                "http://a.example".to_string(),
                "http://b.example".to_string()
            ])
        );
        assert_eq!(config.elevation.anchor, AnchorPolicy::Bottom);
        assert_eq!(config.elevation.unit_px, 24);
        assert!(config.summary_cache_ttl.is_zero());
        assert!(config.sentry_dsn.is_some());
    }

    #[test]
    fn test_port_falls_back_to_port_var() {
        assert_eq!(config(&[("PORT", "8080")]).unwrap().port, 8080);
        assert_eq!(config(&[("BACKEND_PORT", " "), ("PORT", "8081")]).unwrap().port, 8081);
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = config(&[("BACKEND_PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "BACKEND_PORT", .. }));
        assert!(config(&[("RACK_ANCHOR", "middle")]).is_err());
        assert!(config(&[("RACK_UNIT_PX", "0")]).is_err());
        assert!(config(&[("DCIM_ENV", "staging")]).is_err());
    }
}
