//! Startup configuration read from the environment.

use std::str::FromStr;
use std::time::Duration;

use uuid::Uuid;

use crate::error::AppError;

/// Typed server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Pool size.
    pub max_connections: u32,
    /// Lease holder id of this instance.
    pub instance_id: String,
    /// Lease lifetime.
    pub lock_wait: Duration,
    /// Events pulled per page.
    pub batch_size: usize,
    /// Instance aggregate id.
    pub iam_id: String,
}

impl ServerConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or a value does
    /// not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or a value does
    /// not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| AppError::Config("DATABASE_URL environment variable must be set".into()))?;
        let lock_wait_secs: u64 = parse_or(&lookup, "WARDEN_LOCK_WAIT_SECS", 30)?;
        if lock_wait_secs == 0 {
            return Err(AppError::Config(
                "WARDEN_LOCK_WAIT_SECS must be at least 1".into(),
            ));
        }
        let batch_size: usize = parse_or(&lookup, "WARDEN_BATCH_SIZE", 100)?;
        if batch_size == 0 {
            return Err(AppError::Config("WARDEN_BATCH_SIZE must be at least 1".into()));
        }

        Ok(Self {
            database_url,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: parse_or(&lookup, "PORT", 3000)?,
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            instance_id: lookup("WARDEN_INSTANCE_ID")
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            lock_wait: Duration::from_secs(lock_wait_secs),
            batch_size,
            iam_id: lookup("WARDEN_IAM_ID").unwrap_or_else(|| "iam".to_owned()),
        })
    }

    /// `host:port` to bind.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply_when_only_database_url_is_set() {
        let config =
            ServerConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/warden")]))
                .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.lock_wait, Duration::from_secs(30));
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.iam_id, "iam");
        assert!(Uuid::parse_str(&config.instance_id).is_ok());
    }

    #[test]
    fn test_overrides_are_read() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/warden"),
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("WARDEN_INSTANCE_ID", "node-a"),
            ("WARDEN_LOCK_WAIT_SECS", "9"),
            ("WARDEN_BATCH_SIZE", "25"),
            ("WARDEN_IAM_ID", "instance-1"),
        ]))
        .unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.instance_id, "node-a");
        assert_eq!(config.lock_wait, Duration::from_secs(9));
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.iam_id, "instance-1");
    }

    #[test]
    fn test_missing_database_url_is_a_config_error() {
        let result = ServerConfig::from_lookup(lookup(&[]));

        match result {
            Err(AppError::Config(msg)) => assert!(msg.contains("DATABASE_URL")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_port_and_zero_batch_are_rejected() {
        let bad_port = ServerConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/warden"),
            ("PORT", "http"),
        ]));
        let zero_batch = ServerConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/warden"),
            ("WARDEN_BATCH_SIZE", "0"),
        ]));

        assert!(matches!(bad_port, Err(AppError::Config(_))));
        assert!(matches!(zero_batch, Err(AppError::Config(_))));
    }
}
