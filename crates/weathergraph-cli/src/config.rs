use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Client identifier sent with every request. Nominatim rejects anonymous
/// clients, so this must stay distinctive.
pub const CLIENT_USER_AGENT: &str = "weathergraph-geocoder";

pub const DEFAULT_SETTINGS_PATH: &str = "user_settings/settings.toml";
pub const DEFAULT_DATA_FILE: &str = "data/data.xlsx";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

pub const SETTINGS_PATH_ENV: &str = "WEATHERGRAPH_SETTINGS";
pub const DATA_FILE_ENV: &str = "WEATHERGRAPH_DATA_FILE";
pub const SHEET_ENV: &str = "WEATHERGRAPH_SHEET";
pub const HTTP_TIMEOUT_SECS_ENV: &str = "WEATHERGRAPH_HTTP_TIMEOUT_SECS";
const HOME_ENV: &str = "HOME";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub settings_path: PathBuf,
    pub data_file: Option<PathBuf>,
    pub sheet: Option<String>,
    pub http_timeout_secs: u64,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self::from_pairs(std::env::vars())
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let env_map: HashMap<String, String> = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        let home = env_map.get(HOME_ENV).map(String::as_str);

        Self {
            settings_path: non_empty(&env_map, SETTINGS_PATH_ENV)
                .map(|value| PathBuf::from(expand_home_path(value, home)))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH)),
            data_file: non_empty(&env_map, DATA_FILE_ENV)
                .map(|value| PathBuf::from(expand_home_path(value, home))),
            sheet: non_empty(&env_map, SHEET_ENV).map(ToOwned::to_owned),
            http_timeout_secs: non_empty(&env_map, HTTP_TIMEOUT_SECS_ENV)
                .and_then(|value| value.parse::<u64>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Dataset location. Explicit overrides beat the environment, which beats
    /// the `[storage]` section of the preferences file.
    pub fn dataset_target(
        &self,
        storage: &StoragePreferences,
        path_override: Option<PathBuf>,
        sheet_override: Option<String>,
    ) -> DatasetTarget {
        let path = path_override
            .or_else(|| self.data_file.clone())
            .or_else(|| storage.file.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE));
        let sheet = sheet_override
            .or_else(|| self.sheet.clone())
            .or_else(|| storage.sheet.clone());

        DatasetTarget { path, sheet }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetTarget {
    pub path: PathBuf,
    pub sheet: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    pub location: LocationPreferences,
    pub storage: StoragePreferences,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationPreferences {
    pub city: String,
    pub country: String,
}

impl LocationPreferences {
    /// Free-text query handed to the geocoder, e.g. `"Asunción, Paraguay"`.
    pub fn query(&self) -> String {
        let city = self.city.trim();
        let country = self.country.trim();
        if country.is_empty() {
            city.to_string()
        } else {
            format!("{city}, {country}")
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StoragePreferences {
    pub file: Option<PathBuf>,
    pub sheet: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPreferences {
    location: Option<RawLocation>,
    #[serde(default)]
    storage: StoragePreferences,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    city: Option<String>,
    country: Option<String>,
}

impl Preferences {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|error| match error.kind() {
            io::ErrorKind::NotFound => ConfigError::Missing(path.to_path_buf()),
            _ => ConfigError::Read {
                path: path.to_path_buf(),
                message: error.to_string(),
            },
        })?;

        Self::parse(&text, path)
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let raw: RawPreferences = toml::from_str(text).map_err(|error| ConfigError::Syntax {
            path: path.to_path_buf(),
            message: error.message().to_string(),
        })?;

        let location = raw.location.ok_or_else(|| ConfigError::MissingSection {
            path: path.to_path_buf(),
            section: "location",
        })?;
        let missing_field = |field: &'static str| ConfigError::MissingField {
            path: path.to_path_buf(),
            field,
        };

        Ok(Self {
            location: LocationPreferences {
                city: location
                    .city
                    .filter(|city| !city.trim().is_empty())
                    .ok_or_else(|| missing_field("location.city"))?,
                country: location
                    .country
                    .ok_or_else(|| missing_field("location.country"))?,
            },
            storage: raw.storage,
        })
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("configuration file does not exist: {0}")]
    Missing(PathBuf),
    #[error("cannot read configuration file {path}: {message}")]
    Read { path: PathBuf, message: String },
    #[error("syntax error in {path}: {message}")]
    Syntax { path: PathBuf, message: String },
    #[error("missing '{section}' section in {path}")]
    MissingSection { path: PathBuf, section: &'static str },
    #[error("missing '{field}' in {path}")]
    MissingField { path: PathBuf, field: &'static str },
}

fn non_empty<'a>(env_map: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    env_map
        .get(key)
        .map(String::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn expand_home_path(raw: &str, home: Option<&str>) -> String {
    let trimmed = raw.trim();
    let Some(home) = home.map(str::trim).filter(|value| !value.is_empty()) else {
        return trimmed.to_string();
    };

    let home = home.trim_end_matches('/');
    let mut expanded = trimmed.replace("$HOME", home);

    if expanded == "~" {
        expanded = home.to_string();
    } else if let Some(rest) = expanded.strip_prefix("~/") {
        expanded = format!("{home}/{rest}");
    }

    expanded
}
