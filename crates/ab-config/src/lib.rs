//! # ab-config
//!
//! Runtime settings, layered: built-in defaults, then an optional `.env`
//! file, then the process environment. Variable names are the upper-case
//! field names (`DATABASE_URL`, `PORT`, `SELF_TEST`, ...).

use std::path::PathBuf;

use config::{Config, Environment};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Store connection string; may embed credentials
    pub database_url: SecretString,
    pub listen_host: String,
    pub port: u16,
    /// Run the HTTP self-test battery once the listener is up
    pub self_test: bool,
    /// Served under `/public`
    pub public_dir: PathBuf,
    pub db_max_connections: u32,
    /// Argon2 m_cost for delete-password hashing
    pub hash_memory_kib: u32,
    /// Argon2 t_cost for delete-password hashing
    pub hash_iterations: u32,
    pub log_format: LogFormat,
    /// The `.env` file that was read, if one was found
    #[serde(skip)]
    pub env_file: Option<PathBuf>,
}

impl Settings {
    /// Reads `.env` (if any) and the process environment.
    ///
    /// Runs before logging is set up, so the `.env` path is recorded in
    /// `env_file` for the caller to report.
    pub fn load() -> Result<Self, ConfigError> {
        let env_file = dotenvy::dotenv().ok();
        let mut settings = Self::from_env(Environment::default().try_parsing(true))?;
        settings.env_file = env_file;
        Ok(settings)
    }

    /// Builds settings from an explicit environment source.
    pub fn from_env(env: Environment) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .set_default("database_url", "sqlite://anonboard.db?mode=rwc")?
            .set_default("listen_host", "0.0.0.0")?
            .set_default("port", 3000)?
            .set_default("self_test", false)?
            .set_default("public_dir", "public")?
            .set_default("db_max_connections", 5)?
            .set_default("hash_memory_kib", 19 * 1024)?
            .set_default("hash_iterations", 2)?
            .set_default("log_format", "pretty")?
            .add_source(env)
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.db_max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "db_max_connections",
                reason: "must be at least 1".into(),
            });
        }
        if self.hash_iterations == 0 {
            return Err(ConfigError::Invalid {
                key: "hash_iterations",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::default().source(Some(map)).try_parsing(true)
    }

    #[test]
    fn defaults_apply_without_environment() {
        let s = Settings::from_env(env(&[])).unwrap();
        assert_eq!(s.port, 3000);
        assert_eq!(s.listen_addr(), "0.0.0.0:3000");
        assert!(!s.self_test);
        assert!(s.env_file.is_none());
        assert_eq!(s.log_format, LogFormat::Pretty);
        assert_eq!(
            s.database_url.expose_secret(),
            "sqlite://anonboard.db?mode=rwc"
        );
    }

    #[test]
    fn environment_overrides_defaults() {
        let s = Settings::from_env(env(&[
            ("PORT", "8080"),
            ("SELF_TEST", "true"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("LOG_FORMAT", "json"),
        ]))
        .unwrap();
        assert_eq!(s.port, 8080);
        assert!(s.self_test);
        assert_eq!(s.log_format, LogFormat::Json);
        assert_eq!(s.database_url.expose_secret(), "sqlite::memory:");
    }

    #[test]
    fn database_url_is_redacted_in_debug() {
        let s = Settings::from_env(env(&[("DATABASE_URL", "sqlite://secret-path.db")])).unwrap();
        assert!(!format!("{s:?}").contains("secret-path"));
    }

    #[test]
    fn bad_port_is_a_load_error() {
        let err = Settings::from_env(env(&[("PORT", "not-a-port")])).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let err = Settings::from_env(env(&[("HASH_ITERATIONS", "0")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "hash_iterations",
                ..
            }
        ));
    }
}
