use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} has an invalid value: {value}")]
    InvalidValue { key: String, value: String },

    #[error("unknown STORE_BACKEND: {0}")]
    UnknownBackend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StoreBackend::Sqlite),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub database_max_connections: u32,
    pub store_backend: StoreBackend,
    /// The school's wall clock (an IANA zone such as `America/New_York`);
    /// weekly windows are evaluated in it, daylight saving included.
    pub school_time_zone: Tz,
    pub admin_tutor_id: Option<String>,
    /// Tutors allowed to sign in with the shared passcode before they have a
    /// password of their own.
    pub roster: Vec<String>,
    pub roster_passcode: Option<String>,
    pub session_ttl: chrono::Duration,
    pub request_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database_url: "sqlite://tutoring.db".to_string(),
            database_max_connections: 5,
            store_backend: StoreBackend::Sqlite,
            school_time_zone: Tz::UTC,
            admin_tutor_id: None,
            roster: Vec::new(),
            roster_passcode: None,
            session_ttl: chrono::Duration::hours(12),
            request_timeout: Duration::from_secs(10),
        }
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

fn parse_var<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => parse_value(key, &raw).map(Some),
        _ => Ok(None),
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_roster(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            bind_addr: parse_var("BIND_ADDR")?.unwrap_or(defaults.bind_addr),
            database_url: non_empty_var("DATABASE_URL").unwrap_or(defaults.database_url),
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(defaults.database_max_connections),
            store_backend: parse_var("STORE_BACKEND")?.unwrap_or(defaults.store_backend),
            school_time_zone: parse_var("SCHOOL_TIME_ZONE")?.unwrap_or(defaults.school_time_zone),
            admin_tutor_id: non_empty_var("ADMIN_TUTOR_ID"),
            roster: non_empty_var("TUTOR_ROSTER")
                .map(|raw| parse_roster(&raw))
                .unwrap_or_default(),
            roster_passcode: non_empty_var("ROSTER_PASSCODE"),
            session_ttl: parse_var::<i64>("SESSION_TTL_HOURS")?
                .map(chrono::Duration::hours)
                .unwrap_or(defaults.session_ttl),
            request_timeout: parse_var::<u64>("REQUEST_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        })
    }

    pub fn is_admin(&self, tutor_id: &str) -> bool {
        self.admin_tutor_id.as_deref() == Some(tutor_id)
    }

    pub fn on_roster(&self, tutor_id: &str) -> bool {
        self.roster.iter().any(|name| name == tutor_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_zone() {
        let tz: Tz = parse_value("SCHOOL_TIME_ZONE", " America/New_York ").unwrap();
        assert_eq!(tz, chrono_tz::America::New_York);

        let err = parse_value::<Tz>("SCHOOL_TIME_ZONE", "Eastern-ish").unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "SCHOOL_TIME_ZONE".to_string(),
                value: "Eastern-ish".to_string(),
            }
        );
    }

    #[test]
    fn test_store_backend_and_roster() {
        assert_eq!("Memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!(
            "redis".parse::<StoreBackend>(),
            Err(ConfigError::UnknownBackend("redis".to_string()))
        );
        assert_eq!(parse_roster("Ada, Sam,,Grace "), vec!["Ada", "Sam", "Grace"]);
    }
}
