use std::{
    env,
    error::Error,
    path::{Path, PathBuf},
    time::Duration,
};

use jiff::{tz::TimeZone, SignedDuration};
use log::info;
use thiserror::Error;

use crate::{db::wind_archive::WindArchive, interval::granularity::Granularity, source::esios};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {name}: {message}")]
    Invalid {
        name: &'static str,
        value: String,
        message: String,
    },
}

/// Everything a job needs to know, read once at startup.
#[derive(Clone)]
pub struct WindConfig {
    pub source_endpoint: String,
    pub credential: String,
    pub reference_timezone: TimeZone,
    pub granularity: Granularity,
    pub storage_location: PathBuf,
    pub http_timeout: Duration,
    /// Longest range requested from the source in one call.
    pub max_chunk: SignedDuration,
}

impl std::fmt::Debug for WindConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindConfig")
            .field("source_endpoint", &self.source_endpoint)
            .field("credential", &"***")
            .field("reference_timezone", &self.reference_timezone.iana_name())
            .field("granularity", &self.granularity)
            .field("storage_location", &self.storage_location)
            .field("http_timeout", &self.http_timeout)
            .field("max_chunk", &self.max_chunk)
            .finish()
    }
}

impl WindConfig {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.esios.ree.es/indicators/540";
    pub const DEFAULT_TIMEZONE: &'static str = "Europe/Madrid";

    /// Load `.env/{env_name}.env` if it exists, then read the process environment.
    pub fn load(env_name: &str) -> Result<WindConfig, Box<dyn Error>> {
        let path = format!(".env/{}.env", env_name);
        if Path::new(&path).exists() {
            dotenvy::from_path(Path::new(&path))?;
            info!("loaded environment from {}", path);
        }
        Ok(WindConfig::from_env()?)
    }

    pub fn from_env() -> Result<WindConfig, ConfigError> {
        WindConfig::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from any variable lookup, e.g. a map in tests.
    pub fn from_lookup<F>(lookup: F) -> Result<WindConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credential = lookup("ESIOS_API_TOKEN")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("ESIOS_API_TOKEN"))?;
        let source_endpoint =
            lookup("ESIOS_BASE_URL").unwrap_or_else(|| WindConfig::DEFAULT_ENDPOINT.to_string());

        let tz_name =
            lookup("WIND_TIMEZONE").unwrap_or_else(|| WindConfig::DEFAULT_TIMEZONE.to_string());
        let reference_timezone = TimeZone::get(&tz_name).map_err(|e| ConfigError::Invalid {
            name: "WIND_TIMEZONE",
            value: tz_name.clone(),
            message: e.to_string(),
        })?;

        let minutes = parse_number(&lookup, "WIND_GRANULARITY_MINUTES", 15)?;
        let granularity = Granularity::from_minutes(minutes).map_err(|e| ConfigError::Invalid {
            name: "WIND_GRANULARITY_MINUTES",
            value: minutes.to_string(),
            message: e.to_string(),
        })?;
        if esios::time_trunc(granularity).is_none() {
            return Err(ConfigError::Invalid {
                name: "WIND_GRANULARITY_MINUTES",
                value: minutes.to_string(),
                message: "the source only serves 5, 10, 15 or 60 minute data".to_string(),
            });
        }

        let storage_location =
            PathBuf::from(lookup("WIND_ARCHIVE_DIR").unwrap_or_else(|| ".".to_string()));

        let timeout_secs = parse_number(&lookup, "WIND_HTTP_TIMEOUT_SECS", 30)?;
        let max_chunk_days = parse_number(&lookup, "WIND_MAX_CHUNK_DAYS", 31)?;
        if timeout_secs <= 0 {
            return Err(ConfigError::Invalid {
                name: "WIND_HTTP_TIMEOUT_SECS",
                value: timeout_secs.to_string(),
                message: "must be positive".to_string(),
            });
        }
        let max_chunk = match max_chunk_days.checked_mul(86_400) {
            Some(secs) if max_chunk_days > 0 => SignedDuration::from_secs(secs),
            _ => {
                return Err(ConfigError::Invalid {
                    name: "WIND_MAX_CHUNK_DAYS",
                    value: max_chunk_days.to_string(),
                    message: "must be a positive number of days".to_string(),
                })
            }
        };

        Ok(WindConfig {
            source_endpoint,
            credential,
            reference_timezone,
            granularity,
            storage_location,
            http_timeout: Duration::from_secs(timeout_secs as u64),
            max_chunk,
        })
    }

    pub fn archive(&self) -> WindArchive {
        WindArchive::new(self.storage_location.clone(), self.reference_timezone.clone())
    }
}

fn parse_number<F>(lookup: &F, name: &'static str, default: i64) -> Result<i64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse::<i64>().map_err(|e| ConfigError::Invalid {
            name,
            value: value.clone(),
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = WindConfig::from_lookup(lookup(&[("ESIOS_API_TOKEN", "abc")])).unwrap();
        assert_eq!(config.credential, "abc");
        assert_eq!(config.source_endpoint, WindConfig::DEFAULT_ENDPOINT);
        assert_eq!(config.reference_timezone.iana_name(), Some("Europe/Madrid"));
        assert_eq!(config.granularity, Granularity::QUARTER_HOUR);
        assert_eq!(config.storage_location, PathBuf::from("."));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.max_chunk, SignedDuration::from_hours(24 * 31));
        assert!(!format!("{:?}", config).contains("abc"));
    }

    #[test]
    fn overrides() {
        let config = WindConfig::from_lookup(lookup(&[
            ("ESIOS_API_TOKEN", "abc"),
            ("ESIOS_BASE_URL", "http://localhost:8080/indicators/540"),
            ("WIND_TIMEZONE", "UTC"),
            ("WIND_GRANULARITY_MINUTES", "60"),
            ("WIND_ARCHIVE_DIR", "/tmp/wind"),
            ("WIND_MAX_CHUNK_DAYS", "7"),
        ]))
        .unwrap();
        assert_eq!(config.granularity.minutes(), 60);
        assert_eq!(config.storage_location, PathBuf::from("/tmp/wind"));
        assert_eq!(config.max_chunk, SignedDuration::from_hours(24 * 7));
        assert_eq!(config.archive().base_dir, PathBuf::from("/tmp/wind"));
    }

    #[test]
    fn invalid_values() {
        assert!(matches!(
            WindConfig::from_lookup(lookup(&[])),
            Err(ConfigError::Missing("ESIOS_API_TOKEN"))
        ));
        for (name, value) in [
            ("WIND_TIMEZONE", "Mars/Olympus_Mons"),
            ("WIND_GRANULARITY_MINUTES", "7"),
            ("WIND_GRANULARITY_MINUTES", "20"),
            ("WIND_HTTP_TIMEOUT_SECS", "soon"),
            ("WIND_MAX_CHUNK_DAYS", "0"),
            ("WIND_MAX_CHUNK_DAYS", "1000000000000000"),
            ("WIND_GRANULARITY_MINUTES", "1000000000000000000"),
            ("WIND_HTTP_TIMEOUT_SECS", "-5"),
        ] {
            let res = WindConfig::from_lookup(lookup(&[("ESIOS_API_TOKEN", "abc"), (name, value)]));
            assert!(matches!(res, Err(ConfigError::Invalid { .. })), "{name}={value}");
        }
    }
}
