use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::crypto;

/// Application-level constants
pub const APP_NAME: &str = "Clinicore";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_AUDIT_RETENTION_DAYS: u32 = 365;
pub const MIN_HASH_ITERATIONS: u32 = 10_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is required in production")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("Cannot determine a data directory; set CLINIC_DB_PATH")]
    NoDataDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// Process-wide settings, loaded once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub bind_addr: SocketAddr,
    pub db_path: Option<PathBuf>,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub hash_iterations: u32,
    pub audit_retention_days: u32,
    pub cors_origin: Option<String>,
}

impl AppConfig {
    /// Read `CLINIC_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let environment = match get("CLINIC_ENV").as_deref() {
            None | Some("development") => Environment::Development,
            Some("production") => Environment::Production,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "CLINIC_ENV",
                    value: other.to_string(),
                })
            }
        };

        let jwt_secret = match get("CLINIC_JWT_SECRET") {
            Some(secret) => secret,
            None if environment.is_production() => {
                return Err(ConfigError::Missing("CLINIC_JWT_SECRET"))
            }
            None => {
                tracing::warn!("CLINIC_JWT_SECRET not set; using a random per-process secret");
                crypto::generate_secret()
            }
        };

        let token_ttl = match get("CLINIC_JWT_EXPIRES_IN") {
            Some(raw) => parse_duration(&raw).ok_or(ConfigError::Invalid {
                name: "CLINIC_JWT_EXPIRES_IN",
                value: raw,
            })?,
            None => DEFAULT_TOKEN_TTL,
        };

        let bind_raw = get("CLINIC_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            name: "CLINIC_BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let hash_iterations = parse_number(&get, "CLINIC_HASH_ITERATIONS")?
            .unwrap_or(crypto::DEFAULT_ITERATIONS);
        if hash_iterations < MIN_HASH_ITERATIONS {
            return Err(ConfigError::Invalid {
                name: "CLINIC_HASH_ITERATIONS",
                value: hash_iterations.to_string(),
            });
        }

        let audit_retention_days = parse_number(&get, "CLINIC_AUDIT_RETENTION_DAYS")?
            .unwrap_or(DEFAULT_AUDIT_RETENTION_DAYS);

        Ok(Self {
            environment,
            bind_addr,
            db_path: get("CLINIC_DB_PATH").map(PathBuf::from),
            jwt_secret,
            token_ttl,
            hash_iterations,
            audit_retention_days,
            cors_origin: get("CLINIC_CORS_ORIGIN"),
        })
    }

    /// Fixed secret, cheap hashing, in-memory database.
    pub fn for_tests() -> Self {
        Self {
            environment: Environment::Development,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            db_path: None,
            jwt_secret: "test-signing-secret".to_string(),
            token_ttl: DEFAULT_TOKEN_TTL,
            hash_iterations: 1_000,
            audit_retention_days: DEFAULT_AUDIT_RETENTION_DAYS,
            cors_origin: None,
        }
    }

    /// Resolved database file: `CLINIC_DB_PATH`, else `<data_dir>/Clinicore/clinic.db`.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => Ok(app_data_dir()?.join("clinic.db")),
        }
    }
}

/// Get the application data directory
pub fn app_data_dir() -> Result<PathBuf, ConfigError> {
    dirs::data_dir()
        .map(|dir| dir.join(APP_NAME))
        .ok_or(ConfigError::NoDataDir)
}

/// Filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "clinicore=info,tower_http=warn"
}

fn parse_number<G>(get: &G, name: &'static str) -> Result<Option<u32>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    get(name)
        .map(|raw| {
            raw.parse::<u32>()
                .map_err(|_| ConfigError::Invalid { name, value: raw })
        })
        .transpose()
}

/// Parse `<n>[s|m|h|d]`; a bare number is seconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => raw.split_at(idx),
        None => (raw, "s"),
    };
    let n: u64 = digits.parse().ok()?;
    let secs = match unit {
        "s" => n,
        "m" => n.checked_mul(60)?,
        "h" => n.checked_mul(60 * 60)?,
        "d" => n.checked_mul(24 * 60 * 60)?,
        _ => return None,
    };
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_outside_production() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.bind_addr.port(), 5000);
        assert_eq!(config.token_ttl, DEFAULT_TOKEN_TTL);
        assert_eq!(config.hash_iterations, crypto::DEFAULT_ITERATIONS);
        assert_eq!(config.audit_retention_days, 365);
        assert!(!config.jwt_secret.is_empty());
    }

    #[test]
    fn production_requires_secret() {
        let err = config_from(&[("CLINIC_ENV", "production")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("CLINIC_JWT_SECRET")));

        let config = config_from(&[("CLINIC_ENV", "production"), ("CLINIC_JWT_SECRET", "s3cret")]).unwrap();
        assert!(config.environment.is_production());
        assert_eq!(config.jwt_secret, "s3cret");
    }

    #[test]
    fn invalid_values_fail() {
        assert!(config_from(&[("CLINIC_ENV", "staging")]).is_err());
        assert!(config_from(&[("CLINIC_JWT_EXPIRES_IN", "7w")]).is_err());
        assert!(config_from(&[("CLINIC_BIND_ADDR", "not-an-addr")]).is_err());
        assert!(config_from(&[("CLINIC_HASH_ITERATIONS", "10")]).is_err());
        assert!(config_from(&[("CLINIC_AUDIT_RETENTION_DAYS", "-1")]).is_err());
    }

    #[test]
    fn duration_units() {
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("15m"), Some(Duration::from_secs(900)));
        assert_eq!(parse_duration("24h"), Some(Duration::from_secs(86_400)));
        assert_eq!(parse_duration("7d"), Some(Duration::from_secs(604_800)));
        assert_eq!(parse_duration("90"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("0h"), None);
        assert_eq!(parse_duration("h"), None);
    }

    #[test]
    fn explicit_db_path_wins() {
        let config = config_from(&[("CLINIC_DB_PATH", "/tmp/clinic-test.db")]).unwrap();
        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/clinic-test.db"));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
