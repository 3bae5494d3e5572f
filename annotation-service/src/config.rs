use annotation_flow::{AnnotationConfig, NavigationMode, SchemaVersion};
use thiserror::Error;

const DEFAULT_PORT: u16 = 3000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured logging for production
    #[default]
    Json,
    Pretty,
}

/// Settings read once from the environment at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub port: u16,
    /// PostgreSQL when set, in-memory otherwise
    pub database_url: Option<String>,
    pub log_format: LogFormat,
    pub annotation: AnnotationConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            log_format: LogFormat::default(),
            annotation: AnnotationConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let port = match read("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                name: "PORT",
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        let log_format = match read("LOG_FORMAT").as_deref() {
            Some("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        };

        let schema = match read("ANNOTATION_SCHEMA") {
            Some(raw) => raw
                .parse::<SchemaVersion>()
                .map_err(|_| ConfigError::InvalidValue {
                    name: "ANNOTATION_SCHEMA",
                    value: raw,
                })?,
            None => SchemaVersion::default(),
        };

        let mut annotation = AnnotationConfig::new(schema);
        if let Some(raw) = read("NAVIGATION_MODE") {
            let mode = raw
                .parse::<NavigationMode>()
                .map_err(|_| ConfigError::InvalidValue {
                    name: "NAVIGATION_MODE",
                    value: raw,
                })?;
            annotation = annotation.with_mode(mode);
        }

        Ok(Self {
            port,
            database_url: read("DATABASE_URL"),
            log_format,
            annotation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.annotation.mode, None);
    }

    #[test]
    fn test_reads_all_variables() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/annotations"),
            ("LOG_FORMAT", "pretty"),
            ("ANNOTATION_SCHEMA", "research_status"),
            ("NAVIGATION_MODE", "completion_flag"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/annotations")
        );
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.annotation.schema, SchemaVersion::ResearchStatus);
        assert_eq!(config.annotation.mode, Some(NavigationMode::CompletionFlag));
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = ServiceConfig::from_lookup(lookup(&[("ANNOTATION_SCHEMA", "v9")])).unwrap_err();
        assert!(err.to_string().contains("ANNOTATION_SCHEMA"));

        assert!(ServiceConfig::from_lookup(lookup(&[("PORT", "http")])).is_err());
        assert!(ServiceConfig::from_lookup(lookup(&[("NAVIGATION_MODE", "random")])).is_err());
    }

    #[test]
    fn test_blank_database_url_means_in_memory() {
        let config = ServiceConfig::from_lookup(lookup(&[("DATABASE_URL", "  ")])).unwrap();
        assert!(config.database_url.is_none());
    }
}
